//! Session configuration.
//!
//! Locating and reading configuration files is left to the embedding
//! application; this module only parses and validates a TOML document.

use serde::Deserialize;
use thiserror::Error;
use weft_syntax::AnalysisConfig;

use crate::history::HistoryConfig;

/// Errors that can occur when parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error parsing TOML syntax or an unknown/mistyped field.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// A value parsed but cannot be used.
	#[error("invalid value for {field}: {reason}")]
	Invalid {
		/// Dotted path of the offending field.
		field: &'static str,
		/// Why the value was rejected.
		reason: &'static str,
	},
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration of one buffer session.
///
/// ```toml
/// [history]
/// coalesce_idle_ms = 500
///
/// [analysis]
/// debounce_ms = 40
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
	pub history: HistoryConfig,
	pub analysis: AnalysisConfig,
}

impl SessionConfig {
	/// Parses and validates a TOML document. Missing fields keep their
	/// defaults.
	pub fn from_toml_str(source: &str) -> Result<Self> {
		let config: SessionConfig = toml::from_str(source)?;
		config.validate()?;
		Ok(config)
	}

	/// Rejects limits that would disable history or analysis queuing.
	pub fn validate(&self) -> Result<()> {
		if self.history.max_steps == 0 {
			return Err(ConfigError::Invalid {
				field: "history.max_steps",
				reason: "must be at least 1",
			});
		}
		if self.history.delta_window == 0 {
			return Err(ConfigError::Invalid {
				field: "history.delta_window",
				reason: "must be at least 1",
			});
		}
		if self.analysis.max_pending_edits == 0 {
			return Err(ConfigError::Invalid {
				field: "analysis.max_pending_edits",
				reason: "must be at least 1",
			});
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_empty_document_yields_defaults() {
		assert_eq!(SessionConfig::from_toml_str("").unwrap(), SessionConfig::default());
	}

	#[test]
	fn test_partial_tables_override_fields() {
		let config = SessionConfig::from_toml_str(
			r#"
			[history]
			coalesce_idle_ms = 250

			[analysis]
			enabled = false
			debounce_ms = 0
			"#,
		)
		.unwrap();
		assert_eq!(config.history.coalesce_idle_ms, 250);
		assert_eq!(config.history.max_steps, crate::history::MAX_UNDO);
		assert!(!config.analysis.enabled);
		assert_eq!(config.analysis.debounce_ms, 0);
	}

	#[test]
	fn test_unknown_field_is_rejected() {
		let err = SessionConfig::from_toml_str("[history]\nmax_undo = 3\n").unwrap_err();
		assert!(matches!(err, ConfigError::Toml(_)));
	}

	#[test]
	fn test_zero_limits_are_rejected() {
		let err = SessionConfig::from_toml_str("[analysis]\nmax_pending_edits = 0\n").unwrap_err();
		assert!(matches!(
			err,
			ConfigError::Invalid {
				field: "analysis.max_pending_edits",
				..
			}
		));
	}
}
