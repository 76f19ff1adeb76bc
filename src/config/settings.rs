//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use serde::Deserialize;

use crate::error::ConfigError;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// External generator settings.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Supplier API settings.
    #[serde(default)]
    pub supplier: SupplierConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generator.program.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "generator.program must not be empty".to_string(),
            });
        }

        if self.generator.symbol_lib.trim().is_empty()
            || self.generator.symbol_lib.contains(['/', '\\'])
        {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid generator.symbol_lib '{}'. Must be a plain file stem",
                    self.generator.symbol_lib
                ),
            });
        }

        if self.supplier.timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "supplier.timeout_secs must be greater than 0".to_string(),
            });
        }

        if !self.supplier.endpoint.starts_with("http://")
            && !self.supplier.endpoint.starts_with("https://")
        {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid supplier.endpoint '{}'. Must be an http(s) URL",
                    self.supplier.endpoint
                ),
            });
        }

        Ok(())
    }
}

/// External library generator (`JLC2KiCadLib`) configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Program name or path.
    #[serde(default = "default_program")]
    pub program: String,

    /// Symbol library file stem the generator writes into.
    #[serde(default = "default_symbol_lib")]
    pub symbol_lib: String,

    /// Pass `--skip_existing` so already generated parts are not rebuilt.
    #[serde(default = "default_true")]
    pub skip_existing: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            symbol_lib: default_symbol_lib(),
            skip_existing: default_true(),
        }
    }
}

fn default_program() -> String {
    "JLC2KiCadLib".to_string()
}

fn default_symbol_lib() -> String {
    "jlc_project".to_string()
}

const fn default_true() -> bool {
    true
}

/// Supplier product API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupplierConfig {
    /// Product detail endpoint; the part is passed as `productCode`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// `User-Agent` header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SupplierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_endpoint() -> String {
    "https://wmsc.lcsc.com/ftps/wm/product/detail".to_string()
}

const fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let json = r"{}";
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.generator.program, "JLC2KiCadLib");
        assert_eq!(config.supplier.timeout_secs, 10);
    }

    #[test]
    fn parse_full_config() {
        let json = r#"{
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "_comment": "Test config",
            "generator": {
                "program": "/opt/jlc/bin/JLC2KiCadLib",
                "symbol_lib": "board_parts",
                "skip_existing": false
            },
            "supplier": {
                "endpoint": "http://127.0.0.1:8080/detail",
                "timeout_secs": 3,
                "user_agent": "jlcmgr-test"
            },
            "logging": {
                "level": "debug"
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.generator.program, "/opt/jlc/bin/JLC2KiCadLib");
        assert_eq!(config.generator.symbol_lib, "board_parts");
        assert!(!config.generator.skip_existing);
        assert_eq!(config.supplier.endpoint, "http://127.0.0.1:8080/detail");
        assert_eq!(config.supplier.timeout_secs, 3);
        assert_eq!(config.supplier.user_agent, "jlcmgr-test");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn generator_config_defaults() {
        let config = GeneratorConfig::default();
        assert_eq!(config.program, "JLC2KiCadLib");
        assert_eq!(config.symbol_lib, "jlc_project");
        assert!(config.skip_existing);
    }

    #[test]
    fn supplier_config_defaults() {
        let config = SupplierConfig::default();
        assert_eq!(config.endpoint, "https://wmsc.lcsc.com/ftps/wm/product/detail");
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.user_agent, "Mozilla/5.0");
    }

    #[test]
    fn logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "warn");
    }

    #[test]
    fn reject_zero_timeout() {
        let json = r#"{ "supplier": { "timeout_secs": 0 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_symbol_lib_with_separator() {
        let json = r#"{ "generator": { "symbol_lib": "../elsewhere" } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_non_http_endpoint() {
        let json = r#"{ "supplier": { "endpoint": "ftp://example.com" } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_unknown_fields() {
        let json = r#"{
            "unknown_field": "value"
        }"#;

        let result: Result<Config, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
