//! Service principal and storage configuration
//!
//! Loaded from a JSON file (`spnconfig.json` by default). Files ending in
//! `.toml` are read as TOML with the same keys.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use sparkscan_blob::{DEFAULT_AUTHORITY_HOST, DEFAULT_BLOB_ENDPOINT_SUFFIX};

/// Supported config file formats
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct ScanConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub storage_account_name: String,
    pub src_container_name: String,
    pub dest_container_name: String,

    /// Blob endpoint domain, for clouds other than the public one
    #[serde(default)]
    pub blob_endpoint_suffix: Option<String>,

    #[serde(default)]
    pub authority_host: Option<String>,
}

impl ScanConfig {
    /// Read and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content, ConfigFormat::from_path(path))
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let config: ScanConfig = match format {
            ConfigFormat::Json => serde_json::from_str(content)?,
            ConfigFormat::Toml => toml::from_str(content)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("tenant_id", &self.tenant_id),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("storage_account_name", &self.storage_account_name),
            ("src_container_name", &self.src_container_name),
            ("dest_container_name", &self.dest_container_name),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                bail!("`{}` must not be empty", key);
            }
        }
        Ok(())
    }

    pub fn blob_endpoint_suffix(&self) -> &str {
        self.blob_endpoint_suffix
            .as_deref()
            .unwrap_or(DEFAULT_BLOB_ENDPOINT_SUFFIX)
    }

    pub fn authority_host(&self) -> &str {
        self.authority_host.as_deref().unwrap_or(DEFAULT_AUTHORITY_HOST)
    }
}

impl std::fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("storage_account_name", &self.storage_account_name)
            .field("src_container_name", &self.src_container_name)
            .field("dest_container_name", &self.dest_container_name)
            .field("blob_endpoint_suffix", &self.blob_endpoint_suffix())
            .field("authority_host", &self.authority_host())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &str = r#"{
        "tenant_id": "tenant",
        "client_id": "client",
        "client_secret": "hunter2",
        "storage_account_name": "acct",
        "src_container_name": "logs",
        "dest_container_name": "out"
    }"#;

    #[test]
    fn test_parse_json_with_defaults() {
        let config = ScanConfig::parse(JSON, ConfigFormat::Json).unwrap();
        assert_eq!(config.storage_account_name, "acct");
        assert_eq!(config.blob_endpoint_suffix(), "blob.core.windows.net");
        assert_eq!(config.authority_host(), "https://login.microsoftonline.com");
    }

    #[test]
    fn test_parse_toml() {
        let content = r#"
tenant_id = "tenant"
client_id = "client"
client_secret = "hunter2"
storage_account_name = "acct"
src_container_name = "logs"
dest_container_name = "out"
blob_endpoint_suffix = "blob.core.chinacloudapi.cn"
"#;
        let config = ScanConfig::parse(content, ConfigFormat::Toml).unwrap();
        assert_eq!(config.blob_endpoint_suffix(), "blob.core.chinacloudapi.cn");
    }

    #[test]
    fn test_missing_key_fails() {
        let content = r#"{"tenant_id": "t", "client_id": "c"}"#;
        let err = ScanConfig::parse(content, ConfigFormat::Json).unwrap_err();
        assert!(format!("{:#}", err).contains("client_secret"));
    }

    #[test]
    fn test_empty_key_fails() {
        let content = JSON.replace("\"logs\"", "\"  \"");
        let err = ScanConfig::parse(&content, ConfigFormat::Json).unwrap_err();
        assert!(err.to_string().contains("src_container_name"));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("spn.TOML")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("spnconfig.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("spnconfig")), ConfigFormat::Json);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spnconfig.json");
        fs::write(&path, JSON).unwrap();
        let config = ScanConfig::load(&path).unwrap();
        assert_eq!(config.src_container_name, "logs");

        let missing = ScanConfig::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(missing.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = ScanConfig::parse(JSON, ConfigFormat::Json).unwrap();
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
