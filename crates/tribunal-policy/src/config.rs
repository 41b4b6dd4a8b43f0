//! Harness configuration.
//!
//! A `HarnessConfig` is deserialized from TOML and names the engine mode
//! and where the Cedar policy set comes from:
//!
//! ```toml
//! mode = "govern"            # or "monitor"
//!
//! [policy]
//! path = "policies/coding.cedar"   # relative to this file
//! # text = "@id(\"allow-all\") permit(principal, action, resource);"
//! ```
//!
//! Exactly one of `policy.path` and `policy.text` must be set. The
//! `TRIBUNAL_MODE` and `TRIBUNAL_POLICY_PATH` environment variables override
//! the file when `apply_env_overrides` is called.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use tribunal_contracts::{
    error::{TribunalError, TribunalResult},
    policy::EngineMode,
};

pub const ENV_MODE: &str = "TRIBUNAL_MODE";
pub const ENV_POLICY_PATH: &str = "TRIBUNAL_POLICY_PATH";

/// Where the policy set is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySource {
    Path(PathBuf),
    Text(String),
}

/// The `[policy]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySection {
    pub path: Option<PathBuf>,
    pub text: Option<String>,
}

/// The top-level structure deserialized from a TOML config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    #[serde(default)]
    pub mode: EngineMode,
    pub policy: PolicySection,
}

impl HarnessConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `TribunalError::Config` if the TOML is malformed or does not
    /// match the expected shape.
    pub fn from_toml_str(s: &str) -> TribunalResult<Self> {
        toml::from_str(s).map_err(|e| TribunalError::Config {
            reason: format!("failed to parse harness config TOML: {e}"),
        })
    }

    /// Read the file at `path`. A relative `policy.path` is resolved against
    /// the config file's directory.
    pub fn from_file(path: &Path) -> TribunalResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| TribunalError::Config {
            reason: format!("failed to read harness config '{}': {}", path.display(), e),
        })?;
        let mut config = Self::from_toml_str(&contents)?;

        if let (Some(policy_path), Some(dir)) = (&config.policy.path, path.parent()) {
            if policy_path.is_relative() {
                config.policy.path = Some(dir.join(policy_path));
            }
        }
        Ok(config)
    }

    /// Apply overrides from a key lookup (usually the process environment).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> TribunalResult<()> {
        if let Some(mode) = lookup(ENV_MODE) {
            self.mode = match mode.trim().to_ascii_lowercase().as_str() {
                "govern" => EngineMode::Govern,
                "monitor" => EngineMode::Monitor,
                other => {
                    return Err(TribunalError::Config {
                        reason: format!("{ENV_MODE} must be 'govern' or 'monitor', got '{other}'"),
                    })
                }
            };
        }
        if let Some(path) = lookup(ENV_POLICY_PATH).filter(|p| !p.trim().is_empty()) {
            self.policy = PolicySection {
                path: Some(PathBuf::from(path)),
                text: None,
            };
        }
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) -> TribunalResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// The configured policy source.
    ///
    /// # Errors
    ///
    /// `TribunalError::Config` unless exactly one of `path` / `text` is set.
    pub fn policy_source(&self) -> TribunalResult<PolicySource> {
        match (&self.policy.path, &self.policy.text) {
            (Some(path), None) => Ok(PolicySource::Path(path.clone())),
            (None, Some(text)) => Ok(PolicySource::Text(text.clone())),
            (None, None) => Err(TribunalError::Config {
                reason: "no policy set configured; set policy.path or policy.text".to_string(),
            }),
            (Some(_), Some(_)) => Err(TribunalError::Config {
                reason: "policy.path and policy.text are mutually exclusive".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use tribunal_contracts::{error::TribunalError, policy::EngineMode};

    use super::*;

    #[test]
    fn mode_defaults_to_govern() {
        let config = HarnessConfig::from_toml_str(
            r#"
            [policy]
            path = "coding.cedar"
            "#,
        )
        .unwrap();
        assert_eq!(config.mode, EngineMode::Govern);
        assert_eq!(
            config.policy_source().unwrap(),
            PolicySource::Path(PathBuf::from("coding.cedar"))
        );
    }

    #[test]
    fn inline_text_and_monitor_mode() {
        let config = HarnessConfig::from_toml_str(
            r#"
            mode = "monitor"
            [policy]
            text = "permit(principal, action, resource);"
            "#,
        )
        .unwrap();
        assert_eq!(config.mode, EngineMode::Monitor);
        assert!(matches!(config.policy_source().unwrap(), PolicySource::Text(_)));
    }

    #[test]
    fn missing_or_conflicting_policy_source() {
        let none = HarnessConfig::from_toml_str("[policy]\n").unwrap();
        assert!(matches!(none.policy_source(), Err(TribunalError::Config { .. })));

        let both = HarnessConfig::from_toml_str(
            r#"
            [policy]
            path = "a.cedar"
            text = "permit(principal, action, resource);"
            "#,
        )
        .unwrap();
        assert!(matches!(both.policy_source(), Err(TribunalError::Config { .. })));
    }

    #[test]
    fn missing_policy_table_is_a_config_error() {
        match HarnessConfig::from_toml_str("mode = \"govern\"") {
            Err(TribunalError::Config { reason }) => {
                assert!(reason.contains("failed to parse harness config TOML"))
            }
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn overrides_replace_mode_and_policy() {
        let mut config = HarnessConfig::from_toml_str(
            r#"
            [policy]
            text = "permit(principal, action, resource);"
            "#,
        )
        .unwrap();

        let env: HashMap<&str, &str> = [(ENV_MODE, "Monitor"), (ENV_POLICY_PATH, "/etc/tribunal/p.cedar")]
            .into_iter()
            .collect();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.mode, EngineMode::Monitor);
        assert_eq!(
            config.policy_source().unwrap(),
            PolicySource::Path(PathBuf::from("/etc/tribunal/p.cedar"))
        );
    }

    #[test]
    fn invalid_mode_override_is_rejected() {
        let mut config = HarnessConfig::from_toml_str("[policy]\npath = \"a.cedar\"").unwrap();
        let result = config.apply_overrides(|k| (k == ENV_MODE).then(|| "audit".to_string()));
        assert!(matches!(result, Err(TribunalError::Config { .. })));
    }

    #[test]
    fn relative_policy_path_resolves_against_config_dir() {
        let dir = std::env::temp_dir().join(format!("tribunal-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("tribunal.toml");
        std::fs::write(&file, "[policy]\npath = \"coding.cedar\"\n").unwrap();

        let config = HarnessConfig::from_file(&file).unwrap();
        assert_eq!(config.policy.path, Some(dir.join("coding.cedar")));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
