use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// How records read from a file are grouped before being written.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchConfig {
    /// Upper bound of records per batch. The last batch of a file may be smaller.
    #[serde(default = "default_max_size")]
    pub max_size: usize,
}

impl BatchConfig {
    pub const DEFAULT_MAX_SIZE: usize = 1000;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "batch.max_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: Self::DEFAULT_MAX_SIZE,
        }
    }
}

fn default_max_size() -> usize {
    BatchConfig::DEFAULT_MAX_SIZE
}
