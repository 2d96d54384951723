use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Default configuration directory, relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Extensions probed, in order, for every configuration file.
const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Stem of the file every environment loads first.
const BASE_STEM: &str = "base";

/// Environment variables starting with `APP_` override file values, `__` separates nested keys.
const ENV_PREFIX: &str = "APP";
const ENV_NESTING: &str = "__";

#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to read the working directory: {0}")]
    WorkingDirectory(#[source] io::Error),

    #[error("failed to determine the runtime environment: {0}")]
    Environment(#[from] io::Error),

    #[error("configuration directory `{}` does not exist", .0.display())]
    MissingDirectory(PathBuf),

    /// None of the probed file names exist.
    #[error("no `{stem}` configuration file in `{}` (tried {})", .directory.display(), EXTENSIONS.join(", "))]
    MissingFile { stem: String, directory: PathBuf },

    #[error("invalid configuration file `{}`: {source}", .path.display())]
    InvalidFile {
        path: PathBuf,
        source: config::ConfigError,
    },

    /// The merged sources do not match the expected structure.
    #[error("failed to build configuration: {0}")]
    Merge(#[source] config::ConfigError),
}

/// Loads `T` from `./configuration` using the environment named by `APP_ENVIRONMENT`.
///
/// The base file is read first, then the environment file, then `APP_` variables, each layer
/// overriding the previous one. For example `APP_BATCH__MAX_SIZE=500` sets `batch.max_size`.
pub fn load_config<T: DeserializeOwned>() -> Result<T, LoadConfigError> {
    let directory = std::env::current_dir()
        .map_err(LoadConfigError::WorkingDirectory)?
        .join(CONFIGURATION_DIR);

    load_config_from(&directory, Environment::load()?)
}

/// Returns whether `./configuration` exists.
pub fn has_configuration_directory() -> bool {
    std::env::current_dir().is_ok_and(|dir| dir.join(CONFIGURATION_DIR).is_dir())
}

/// Loads `T` from an explicit directory, with the same layering as [`load_config`].
pub fn load_config_from<T: DeserializeOwned>(
    directory: &Path,
    environment: Environment,
) -> Result<T, LoadConfigError> {
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingDirectory(directory.to_path_buf()));
    }

    let mut builder = config::Config::builder();
    for stem in [BASE_STEM, environment.as_str()] {
        let path = locate(directory, stem)?;
        check_file(&path)?;
        builder = builder.add_source(config::File::from(path));
    }

    builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator(ENV_NESTING)
                .try_parsing(true),
        )
        .build()
        .and_then(|settings| settings.try_deserialize())
        .map_err(LoadConfigError::Merge)
}

fn locate(directory: &Path, stem: &str) -> Result<PathBuf, LoadConfigError> {
    EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{stem}.{extension}")))
        .find(|path| path.is_file())
        .ok_or_else(|| LoadConfigError::MissingFile {
            stem: stem.to_owned(),
            directory: directory.to_path_buf(),
        })
}

/// Parses a single file on its own so syntax errors name the offending file.
fn check_file(path: &Path) -> Result<(), LoadConfigError> {
    config::Config::builder()
        .add_source(config::File::from(path))
        .build()
        .map(drop)
        .map_err(|source| LoadConfigError::InvalidFile {
            path: path.to_path_buf(),
            source,
        })
}
