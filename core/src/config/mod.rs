mod load;
mod types;

pub use load::{
    apply_env_overrides, load_default, load_from, resolve_output_path, split_list,
    DEFAULT_CONFIG_FILE,
};
pub use types::{AppConfig, ErrorHandlerConfig, FileLoggerConfig, JUnitConfig, SlackConfig};
