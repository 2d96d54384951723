use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// How input files are decoded into records.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    /// Field delimiter of the input files. Must be a single ASCII character.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl SourceConfig {
    /// Default field delimiter.
    pub const DEFAULT_DELIMITER: char = ',';

    /// Returns the delimiter as the byte expected by the CSV reader.
    ///
    /// Only meaningful after [`SourceConfig::validate`] succeeded.
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter as u8
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.delimiter.is_ascii() || self.delimiter == '\n' || self.delimiter == '\r' {
            return Err(ValidationError::InvalidFieldValue {
                field: "source.delimiter".to_string(),
                constraint: "must be a single ASCII character other than a line break".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
        }
    }
}

fn default_delimiter() -> char {
    SourceConfig::DEFAULT_DELIMITER
}
