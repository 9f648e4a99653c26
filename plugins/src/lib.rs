pub mod factory;
pub mod junit;
pub mod slack;
