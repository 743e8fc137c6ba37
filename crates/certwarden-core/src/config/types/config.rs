use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{config::Format, error::CertwardenError};

use super::{AcmeConfig, LogLevel};

/// The root configuration document
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct Config {
    /// The log level to use (default: "info")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,

    /// The certificate provider settings
    #[serde(default)]
    pub acme: AcmeConfig,
}

impl Config {
    /// Validates the configuration
    pub fn validate(&self) -> Result<(), CertwardenError> {
        self.acme.validate()
    }

    /// Writes the configuration to a file in the specified format
    pub fn write_to_file<P: AsRef<Path>>(
        &self,
        path: P,
        format: Box<dyn Format<'_> + '_>,
    ) -> Result<(), CertwardenError> {
        let config_str = format.to_format_string(self)?;

        std::fs::write(path, config_str).map_err(CertwardenError::IOError)?;

        Ok(())
    }
}
