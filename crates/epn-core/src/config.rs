use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration (loaded from epn.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EpnConfig {
    pub keystore: KeystoreConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystoreConfig {
    /// Platform keychain service name
    pub service: String,
    /// Alias the device RSA key pair is stored under
    pub alias: String,
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            service: "epn".into(),
            alias: "epn-device-rsa".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Wall-clock processing budget per notification, in milliseconds.
    /// The host extension gets roughly 30 s; stay inside it.
    pub deadline_ms: u64,
    /// Decrypted payload keys copied into the auxiliary mapping.
    /// Everything not on this list stays untouched.
    pub merge_keys: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 25_000,
            merge_keys: vec!["body".into(), "experienceId".into(), "scopeKey".into()],
        }
    }
}

impl EpnConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
            toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("parsing config {}: {e}", path.display()))
        } else {
            tracing::warn!("config file not found: {} (using defaults)", path.display());
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EpnConfig::default();
        assert_eq!(config.keystore.service, "epn");
        assert_eq!(config.keystore.alias, "epn-device-rsa");
        assert_eq!(config.pipeline.deadline_ms, 25_000);
        assert_eq!(
            config.pipeline.merge_keys,
            vec!["body", "experienceId", "scopeKey"]
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: EpnConfig = toml::from_str(
            r#"
            [pipeline]
            deadline_ms = 5000
            "#,
        )
        .unwrap();
        assert_eq!(config.pipeline.deadline_ms, 5000);
        assert_eq!(config.keystore.alias, "epn-device-rsa");
        assert_eq!(config.pipeline.merge_keys.len(), 3);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EpnConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.pipeline.deadline_ms, 25_000);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("epn.toml");
        std::fs::write(
            &path,
            r#"
            [keystore]
            service = "myapp"
            alias = "myapp-rsa"

            [pipeline]
            merge_keys = ["body"]
            "#,
        )
        .unwrap();

        let config = EpnConfig::load(&path).unwrap();
        assert_eq!(config.keystore.service, "myapp");
        assert_eq!(config.pipeline.merge_keys, vec!["body"]);
    }
}
