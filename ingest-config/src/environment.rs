use std::fmt;
use std::io;
use std::str::FromStr;

/// Variable selecting the environment-specific configuration file.
pub const ENVIRONMENT_VAR: &str = "APP_ENVIRONMENT";

/// Runtime environment of a job, used to pick `configuration/{environment}.*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Dev,
    Prod,
}

impl Environment {
    /// Reads the environment from [`ENVIRONMENT_VAR`], falling back to [`Environment::Dev`].
    pub fn load() -> Result<Environment, io::Error> {
        match std::env::var(ENVIRONMENT_VAR) {
            Ok(value) => value.parse(),
            Err(_) => Ok(Environment::default()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = io::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        [Environment::Dev, Environment::Prod]
            .into_iter()
            .find(|env| env.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unknown environment `{value}` in {ENVIRONMENT_VAR}, expected `dev` or `prod`"),
                )
            })
    }
}
