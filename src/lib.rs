//! # JsonLog - Per-Stream JSON Log Collection
//!
//! JsonLog accepts structured JSON records from many concurrent producers and
//! appends them to one file per stream, rotating each file when the calendar
//! day changes.
//!
//! ## Features
//!
//! - **Ordered Streams**: one background worker per stream, records land in submission order
//! - **Backpressure**: bounded buffers suspend producers instead of dropping records
//! - **Daily Rotation**: `<file>.<YYYYMMDD>` with `.001`..`.999` collision suffixes
//! - **Observable Failures**: write and rotation failures go to a pluggable observer
//! - **HTTP Ingestion**: `POST /collect/{platform}/{doc_type}` with a configured whitelist
//!
//! ## Quick Start
//!
//! ### Server
//! ```no_run
//! use jsonlog::config::ServerConfig;
//! use jsonlog::server::LogServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::from_file("config/server.toml")?;
//!     let server = LogServer::new(config).await?;
//!     server.start().await?;
//!     server.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ### Embedded stream
//! ```no_run
//! use jsonlog::config::WriterConfig;
//! use jsonlog::stream::AsyncLogChannel;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WriterConfig::from_json(r#"{"filename":"logs/app.log"}"#)?;
//!     let stream = AsyncLogChannel::new(100, &config)?;
//!
//!     stream.submit(r#"{"event":"login"}"#).await?;
//!     stream.close().await?;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod server;
pub mod stream;
pub mod types;
pub mod writer;

/// Common error types used throughout JsonLog
pub mod error {
    use std::fmt;
    use std::path::PathBuf;

    /// JsonLog error types
    #[derive(Debug)]
    pub enum JsonLogError {
        /// I/O operation failed
        Io(std::io::Error),
        /// Serialization/deserialization failed
        Serde(serde_json::Error),
        /// Configuration error
        Config(String),
        /// The live log file could not be opened or created
        Open {
            /// Path of the live file
            path: PathBuf,
            /// Underlying OS error
            source: std::io::Error,
        },
        /// Rotation could not complete; the stream keeps its previous handle
        Rotation(String),
        /// A single message could not be appended
        Write {
            /// Path of the live file
            path: PathBuf,
            /// Underlying OS error
            source: std::io::Error,
        },
        /// The stream no longer accepts messages
        Closed(String),
        /// The background worker ended abnormally
        Worker(String),
        /// Server error
        Server(String),
    }

    impl fmt::Display for JsonLogError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                JsonLogError::Io(e) => write!(f, "I/O error: {}", e),
                JsonLogError::Serde(e) => write!(f, "Serialization error: {}", e),
                JsonLogError::Config(e) => write!(f, "Configuration error: {}", e),
                JsonLogError::Open { path, source } => {
                    write!(f, "Cannot open {}: {}", path.display(), source)
                }
                JsonLogError::Rotation(e) => write!(f, "Rotation error: {}", e),
                JsonLogError::Write { path, source } => {
                    write!(f, "Write to {} failed: {}", path.display(), source)
                }
                JsonLogError::Closed(e) => write!(f, "Stream closed: {}", e),
                JsonLogError::Worker(e) => write!(f, "Worker error: {}", e),
                JsonLogError::Server(e) => write!(f, "Server error: {}", e),
            }
        }
    }

    impl std::error::Error for JsonLogError {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            match self {
                JsonLogError::Io(e) => Some(e),
                JsonLogError::Serde(e) => Some(e),
                JsonLogError::Open { source, .. } | JsonLogError::Write { source, .. } => {
                    Some(source)
                }
                _ => None,
            }
        }
    }

    impl From<std::io::Error> for JsonLogError {
        fn from(err: std::io::Error) -> Self {
            JsonLogError::Io(err)
        }
    }

    impl From<serde_json::Error> for JsonLogError {
        fn from(err: serde_json::Error) -> Self {
            JsonLogError::Serde(err)
        }
    }

    /// Result type alias for JsonLog operations
    pub type Result<T> = std::result::Result<T, JsonLogError>;
}

pub use error::{JsonLogError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ServerConfig, WriterConfig};
    pub use crate::server::LogServer;
    pub use crate::stream::{AsyncLogChannel, StreamRegistry};
    pub use crate::writer::{Clock, Diagnostics, ManualClock, RotatingFileWriter, SystemClock};
    pub use crate::{JsonLogError, Result};
}
