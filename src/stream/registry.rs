//! Routing table from `(platform, doc_type)` to a stream
//!
//! Built once at startup and never mutated afterwards, so lookups need no
//! synchronization.

use crate::config::{ServerConfig, StreamSpec};
use crate::stream::AsyncLogChannel;
use crate::writer::{Diagnostics, FailureObserver, RotatingFileWriter};
use crate::Result;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Outcome of resolving a request's path segments
#[derive(Debug)]
pub enum Lookup<'a> {
    /// Platform is not whitelisted
    UnknownPlatform,
    /// Doc type is not whitelisted for this platform
    UnknownDocType,
    /// Whitelisted, but the stream could not be created at startup
    Unavailable,
    /// Stream ready to accept messages
    Ready(&'a AsyncLogChannel),
}

/// All streams of one server
#[derive(Debug, Default)]
pub struct StreamRegistry {
    whitelist: BTreeMap<String, BTreeSet<String>>,
    streams: HashMap<String, AsyncLogChannel>,
}

impl StreamRegistry {
    /// Routing key for a platform/doc type pair
    pub fn key(platform: &str, doc_type: &str) -> String {
        format!("{}.{}", platform, doc_type)
    }

    /// Create every stream the configuration whitelists
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Like [`StreamRegistry::from_config`], reporting stream failures to `observer`
    pub fn from_config_with_observer(
        config: &ServerConfig,
        observer: FailureObserver,
    ) -> Result<Self> {
        Self::build(config, Some(observer))
    }

    fn build(config: &ServerConfig, observer: Option<FailureObserver>) -> Result<Self> {
        config.validate()?;

        let mut registry = Self::default();
        for spec in config.streams() {
            registry
                .whitelist
                .entry(spec.platform.clone())
                .or_default()
                .insert(spec.doc_type.clone());

            let key = Self::key(&spec.platform, &spec.doc_type);
            match open_stream(&key, &spec, config.storage.buffer_capacity, observer.clone()) {
                Ok(channel) => {
                    info!(stream = %key, path = ?spec.writer.filename, "registered stream");
                    registry.streams.insert(key, channel);
                }
                Err(err) => {
                    error!(stream = %key, error = %err, "stream unavailable");
                }
            }
        }

        // Platforms with no doc types are still valid URL prefixes.
        for platform in config.platforms.keys() {
            registry.whitelist.entry(platform.clone()).or_default();
        }

        Ok(registry)
    }

    /// Resolve a request to a stream
    pub fn lookup(&self, platform: &str, doc_type: &str) -> Lookup<'_> {
        let Some(doc_types) = self.whitelist.get(platform) else {
            return Lookup::UnknownPlatform;
        };
        if !doc_types.contains(doc_type) {
            return Lookup::UnknownDocType;
        }
        match self.streams.get(&Self::key(platform, doc_type)) {
            Some(channel) => Lookup::Ready(channel),
            None => Lookup::Unavailable,
        }
    }

    /// Stream registered under `key`
    pub fn get(&self, key: &str) -> Option<&AsyncLogChannel> {
        self.streams.get(key)
    }

    /// Registered routing keys, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.streams.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Number of live streams
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Whether no stream could be created
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Drain and close every stream
    pub async fn close_all(&self) {
        for (key, channel) in &self.streams {
            if let Err(err) = channel.close().await {
                warn!(stream = %key, error = %err, "stream did not close cleanly");
            }
        }
    }
}

fn open_stream(
    key: &str,
    spec: &StreamSpec,
    capacity: usize,
    observer: Option<FailureObserver>,
) -> Result<AsyncLogChannel> {
    if let Some(dir) = spec.writer.filename.as_deref().and_then(|p| p.parent()) {
        std::fs::create_dir_all(dir)?;
    }

    let mut diagnostics = Diagnostics::new(key);
    if let Some(observer) = observer {
        diagnostics = diagnostics.with_observer(observer);
    }

    let writer = RotatingFileWriter::open(&spec.writer)?.with_diagnostics(Arc::new(diagnostics));
    AsyncLogChannel::with_writer(capacity, writer)
}
