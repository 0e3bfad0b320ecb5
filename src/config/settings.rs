//! Configuration structures for JsonLog

use crate::{JsonLogError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Prefix of environment variables that override file settings,
/// e.g. `JSONLOG_SERVER__BIND=0.0.0.0:6400`.
pub const ENV_PREFIX: &str = "JSONLOG";

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server settings
    pub server: ServerSettings,
    /// Storage configuration
    pub storage: StorageSettings,
    /// Whitelisted doc types, keyed by platform
    pub platforms: BTreeMap<String, Vec<String>>,
}

/// Core server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address the HTTP listener binds to
    pub bind: String,
}

/// Storage configuration shared by every stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Root directory; streams live at `<data_dir>/<platform>/<doc_type>.log`
    pub data_dir: PathBuf,
    /// Number of messages each stream buffers before producers block
    pub buffer_capacity: usize,
    /// Rotate at most once per calendar day
    pub daily: bool,
    /// Master switch for rotation
    pub rotate: bool,
}

/// Per-stream writer document: `{"filename": "...", "daily": true, "rotate": true}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Live file path. Required.
    #[serde(default)]
    pub filename: Option<PathBuf>,
    /// Rotate at most once per calendar day
    #[serde(default = "enabled")]
    pub daily: bool,
    /// Master switch for rotation
    #[serde(default = "enabled")]
    pub rotate: bool,
}

/// One stream derived from the platform whitelist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSpec {
    /// Platform path segment
    pub platform: String,
    /// Doc type path segment
    pub doc_type: String,
    /// Writer settings for this stream
    pub writer: WriterConfig,
}

fn enabled() -> bool {
    true
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:6400".to_string(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("logs"),
            buffer_capacity: 100,
            daily: true,
            rotate: true,
        }
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            filename: None,
            daily: true,
            rotate: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file, with `JSONLOG_*` environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let loaded = ::config::Config::builder()
            .add_source(
                ::config::File::from(path.as_ref())
                    .format(::config::FileFormat::Toml)
                    .required(true),
            )
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| JsonLogError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ServerConfig = loaded
            .try_deserialize()
            .map_err(|e| JsonLogError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text, without environment overrides
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ServerConfig = toml::from_str(content)
            .map_err(|e| JsonLogError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.bind.is_empty() {
            return Err(JsonLogError::Config("Bind address cannot be empty".to_string()));
        }
        if self.storage.buffer_capacity == 0 {
            return Err(JsonLogError::Config(
                "Buffer capacity must be at least 1".to_string(),
            ));
        }
        for (platform, doc_types) in &self.platforms {
            if !is_platform_name(platform) {
                return Err(JsonLogError::Config(format!(
                    "Invalid platform name {:?}: expected [a-z]+",
                    platform
                )));
            }
            for doc_type in doc_types.iter().filter(|d| !d.is_empty()) {
                if !is_doc_type_name(doc_type) {
                    return Err(JsonLogError::Config(format!(
                        "Invalid doc type {:?} for platform {}: expected [a-zA-Z0-9]+",
                        doc_type, platform
                    )));
                }
            }
        }
        Ok(())
    }

    /// Every stream the whitelist describes. Empty doc type entries are skipped.
    pub fn streams(&self) -> Vec<StreamSpec> {
        self.platforms
            .iter()
            .flat_map(|(platform, doc_types)| {
                doc_types
                    .iter()
                    .filter(|doc_type| !doc_type.is_empty())
                    .map(move |doc_type| StreamSpec {
                        platform: platform.clone(),
                        doc_type: doc_type.clone(),
                        writer: WriterConfig {
                            filename: Some(
                                self.storage
                                    .data_dir
                                    .join(platform)
                                    .join(format!("{}.log", doc_type)),
                            ),
                            daily: self.storage.daily,
                            rotate: self.storage.rotate,
                        },
                    })
            })
            .collect()
    }
}

impl WriterConfig {
    /// Writer for `path` with daily rotation enabled
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            filename: Some(path.into()),
            ..Default::default()
        }
    }

    /// Parse a JSON writer document
    pub fn from_json(document: &str) -> Result<Self> {
        let config: WriterConfig = serde_json::from_str(document)
            .map_err(|e| JsonLogError::Config(format!("Invalid writer config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Return the live file path, failing when none was configured
    pub fn validate(&self) -> Result<&Path> {
        match self.filename.as_deref() {
            Some(path) if !path.as_os_str().is_empty() => Ok(path),
            _ => Err(JsonLogError::Config(
                "writer config must have filename".to_string(),
            )),
        }
    }
}

/// Platform segment pattern: `[a-z]+`
pub fn is_platform_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_lowercase())
}

/// Doc type segment pattern: `[a-zA-Z0-9]+`
pub fn is_doc_type_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_config_defaults() {
        let config = WriterConfig::from_json(r#"{"filename":"logs/app.log"}"#).unwrap();
        assert_eq!(config.filename, Some(PathBuf::from("logs/app.log")));
        assert!(config.daily);
        assert!(config.rotate);
    }

    #[test]
    fn test_writer_config_explicit_flags() {
        let config =
            WriterConfig::from_json(r#"{"filename":"a.log","daily":false,"rotate":false}"#)
                .unwrap();
        assert!(!config.daily);
        assert!(!config.rotate);
    }

    #[test]
    fn test_writer_config_requires_filename() {
        let missing = WriterConfig::from_json(r#"{"daily":true}"#);
        assert!(matches!(missing, Err(JsonLogError::Config(_))));

        let empty = WriterConfig::from_json(r#"{"filename":""}"#);
        assert!(matches!(empty, Err(JsonLogError::Config(_))));
    }

    #[test]
    fn test_server_config_from_toml() {
        let config = ServerConfig::from_toml_str(
            r#"
            [server]
            bind = "0.0.0.0:7000"

            [storage]
            data_dir = "/data/logs"
            buffer_capacity = 16

            [platforms]
            web = ["pageview", "click", ""]
            ios = ["crash"]
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind, "0.0.0.0:7000");
        assert_eq!(config.storage.buffer_capacity, 16);
        assert!(config.storage.daily);

        let streams = config.streams();
        assert_eq!(streams.len(), 3);
        let click = streams.iter().find(|s| s.doc_type == "click").unwrap();
        assert_eq!(click.platform, "web");
        assert_eq!(
            click.writer.filename,
            Some(PathBuf::from("/data/logs/web/click.log"))
        );
    }

    #[test]
    fn test_server_config_validation() {
        let mut config = ServerConfig::default();
        assert!(config.validate().is_ok());

        config.storage.buffer_capacity = 0;
        assert!(config.validate().is_err());

        config.storage.buffer_capacity = 10;
        config.platforms.insert("Web".to_string(), vec!["click".to_string()]);
        assert!(config.validate().is_err());

        config.platforms.clear();
        config.platforms.insert("web".to_string(), vec!["page-view".to_string()]);
        assert!(config.validate().is_err());

        config.server.bind.clear();
        config.platforms.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_server_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(
            &path,
            "[storage]\nbuffer_capacity = 8\n[platforms]\nweb = [\"click\"]\n",
        )
        .unwrap();

        let config = ServerConfig::from_file(&path).unwrap();
        assert_eq!(config.storage.buffer_capacity, 8);
        assert_eq!(config.platforms["web"], vec!["click".to_string()]);
    }

    #[test]
    fn test_segment_patterns() {
        assert!(is_platform_name("android"));
        assert!(!is_platform_name("android2"));
        assert!(!is_platform_name(""));
        assert!(is_doc_type_name("PageView2"));
        assert!(!is_doc_type_name("page_view"));
    }
}
