//! Configuration types and loading for file ingestion jobs.

mod environment;
mod load;
pub mod shared;

pub use environment::{ENVIRONMENT_VAR, Environment};
pub use load::{LoadConfigError, has_configuration_directory, load_config, load_config_from};
