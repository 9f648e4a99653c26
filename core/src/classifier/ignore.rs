use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use regex::Regex;

/// A compiled ignore pattern and the string it came from.
#[derive(Debug, Clone)]
pub struct IgnorePattern {
    source: String,
    regex: Regex,
}

impl IgnorePattern {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, message: &str) -> bool {
        self.regex.is_match(message)
    }
}

type Compiled = Arc<OnceLock<Vec<IgnorePattern>>>;

/// Lazily compiled set of ignore-message patterns.
///
/// The first `matches` call compiles every source string; concurrent first
/// callers join the same build. Invalid patterns are logged and left out.
/// `invalidate` drops the compiled set so the next call rebuilds it.
#[derive(Debug)]
pub struct IgnorePatternCache {
    sources: Vec<String>,
    compiled: RwLock<Compiled>,
}

impl IgnorePatternCache {
    pub fn new(sources: Vec<String>) -> Self {
        Self {
            sources,
            compiled: RwLock::new(Arc::new(OnceLock::new())),
        }
    }

    pub fn matches(&self, message: &str) -> bool {
        self.with_patterns(|patterns| patterns.iter().any(|p| p.is_match(message)))
    }

    /// Sources of the patterns that compiled, building the set if needed.
    pub fn active_sources(&self) -> Vec<String> {
        self.with_patterns(|patterns| patterns.iter().map(|p| p.source.clone()).collect())
    }

    pub fn is_built(&self) -> bool {
        self.current().get().is_some()
    }

    pub fn invalidate(&self) {
        let mut guard = self.compiled.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(OnceLock::new());
    }

    fn with_patterns<R>(&self, f: impl FnOnce(&[IgnorePattern]) -> R) -> R {
        let cell = self.current();
        let mut rejected = Vec::new();
        let out = f(cell
            .get_or_init(|| compile_patterns(&self.sources, &mut rejected))
            .as_slice());
        // Logged after the build: a captured warning re-enters `matches`.
        for (source, error) in rejected {
            tracing::warn!(
                target: "autopilot.classifier",
                pattern = %source,
                error = %error,
                "invalid ignore message pattern, skipped"
            );
        }
        out
    }

    fn current(&self) -> Compiled {
        self.compiled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn compile_patterns(
    sources: &[String],
    rejected: &mut Vec<(String, regex::Error)>,
) -> Vec<IgnorePattern> {
    let mut out = Vec::with_capacity(sources.len());
    for source in sources {
        match Regex::new(source) {
            Ok(regex) => out.push(IgnorePattern {
                source: source.clone(),
                regex,
            }),
            Err(e) => rejected.push((source.clone(), e)),
        }
    }
    out
}
