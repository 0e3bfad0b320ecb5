//! Configuration management for JsonLog

pub mod settings;

pub use settings::{
    is_doc_type_name, is_platform_name, ServerConfig, ServerSettings, StorageSettings,
    StreamSpec, WriterConfig,
};
