use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::HclError;

/// Settings for [`crate::DiagnosticWriter`].
///
/// ```toml
/// width = 100
/// color = true
/// context_lines = 2
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriterConfig {
    /// Column at which detail text is wrapped and source lines are cut.
    /// Zero disables both.
    #[serde(default = "default_width")]
    pub width: usize,
    /// Emit VT100 colour sequences.
    #[serde(default)]
    pub color: bool,
    /// Source lines shown before and after the highlighted ones.
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            color: false,
            context_lines: default_context_lines(),
        }
    }
}

fn default_width() -> usize {
    78
}

fn default_context_lines() -> usize {
    1
}

impl WriterConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, HclError> {
        toml::from_str(text).map_err(|err| HclError::Config(err.to_string()))
    }

    pub fn read(path: &Path) -> Result<Self, HclError> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|err| HclError::Config(format!("failed to parse {}: {err}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_keys() {
        let config = WriterConfig::from_toml_str("color = true").unwrap();
        assert_eq!(
            config,
            WriterConfig {
                width: 78,
                color: true,
                context_lines: 1,
            }
        );
        assert_eq!(WriterConfig::from_toml_str("").unwrap(), WriterConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = WriterConfig::from_toml_str("colour = true").unwrap_err();
        assert!(matches!(err, HclError::Config(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = WriterConfig::read(Path::new("/nonexistent/writer.toml")).unwrap_err();
        assert!(matches!(err, HclError::Io(_)));
    }
}
