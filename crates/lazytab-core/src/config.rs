//! Engine configuration that terminal operations and backends read.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Rows `sample`/`display` produce when the caller gives no count.
    pub default_sample_size: usize,

    /// Optional cap a backend enforces on `collect_all`. `None` means no cap.
    pub max_collect_rows: Option<usize>,

    /// Widest rendered cell in `display`; longer cells are truncated.
    pub display_max_width: usize,

    /// Token `display` prints for Missing.
    pub missing_token: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_sample_size: 10,
            max_collect_rows: None,
            display_max_width: 40,
            missing_token: "NA".to_string(),
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `LAZYTAB_SAMPLE_SIZE`: default row count for sample/display
    /// - `LAZYTAB_MAX_COLLECT_ROWS`: cap on collect_all
    /// - `LAZYTAB_DISPLAY_WIDTH`: widest rendered cell
    /// - `LAZYTAB_MISSING_TOKEN`: text shown for missing values
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("LAZYTAB_SAMPLE_SIZE") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.default_sample_size = v;
            }
        }

        if let Ok(s) = std::env::var("LAZYTAB_MAX_COLLECT_ROWS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_collect_rows = Some(v);
            }
        }

        if let Ok(s) = std::env::var("LAZYTAB_DISPLAY_WIDTH") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.display_max_width = v;
            }
        }

        if let Ok(s) = std::env::var("LAZYTAB_MISSING_TOKEN") {
            cfg.missing_token = s;
        }

        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_sample_size == 0 {
            return Err(Error::Config("default_sample_size must be positive".into()));
        }
        if self.display_max_width < 4 {
            return Err(Error::Config(format!(
                "display_max_width must be at least 4, got {}",
                self.display_max_width
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_overrides_defaults() {
        std::env::set_var("LAZYTAB_SAMPLE_SIZE", "25");
        std::env::set_var("LAZYTAB_MAX_COLLECT_ROWS", "1000");
        std::env::set_var("LAZYTAB_DISPLAY_WIDTH", "not a number");
        std::env::set_var("LAZYTAB_MISSING_TOKEN", "<na>");
        let cfg = EngineConfig::from_env();
        for var in [
            "LAZYTAB_SAMPLE_SIZE",
            "LAZYTAB_MAX_COLLECT_ROWS",
            "LAZYTAB_DISPLAY_WIDTH",
            "LAZYTAB_MISSING_TOKEN",
        ] {
            std::env::remove_var(var);
        }

        assert_eq!(cfg.default_sample_size, 25);
        assert_eq!(cfg.max_collect_rows, Some(1000));
        // unparsable values keep the default
        assert_eq!(cfg.display_max_width, 40);
        assert_eq!(cfg.missing_token, "<na>");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_sample_size() {
        let cfg = EngineConfig {
            default_sample_size: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }
}
