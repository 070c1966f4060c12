//! Lowering options supplied by the driver.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid options JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid option '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct LowerOptions {
    /// Name given to the produced module.
    pub module_name: String,
    /// Function that receives top-level executable statements.
    pub entry_function: String,
    /// External variadic function called by `write`.
    pub print_function: String,
    /// Report warnings (missing returns) with error severity.
    pub warnings_as_errors: bool,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            module_name: "grace".to_string(),
            entry_function: "main".to_string(),
            print_function: "printf".to_string(),
            warnings_as_errors: false,
        }
    }
}

impl LowerOptions {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let options: LowerOptions = serde_json::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entry_function.is_empty() {
            return Err(ConfigError::Invalid {
                field: "entry_function",
                reason: "must not be empty".to_string(),
            });
        }
        if self.print_function.is_empty() {
            return Err(ConfigError::Invalid {
                field: "print_function",
                reason: "must not be empty".to_string(),
            });
        }
        if self.entry_function == self.print_function {
            return Err(ConfigError::Invalid {
                field: "print_function",
                reason: format!("collides with entry function '{}'", self.entry_function),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let opts = LowerOptions::from_json(r#"{ "module_name": "demo" }"#).unwrap();
        assert_eq!(opts.module_name, "demo");
        assert_eq!(opts.entry_function, "main");
        assert_eq!(opts.print_function, "printf");
        assert!(!opts.warnings_as_errors);
    }

    #[test]
    fn rejects_empty_entry() {
        let err = LowerOptions::from_json(r#"{ "entry_function": "" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "entry_function", .. }));
    }

    #[test]
    fn rejects_colliding_names() {
        let err =
            LowerOptions::from_json(r#"{ "entry_function": "go", "print_function": "go" }"#)
                .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "print_function", .. }));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = LowerOptions::from_json("{ nope").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
