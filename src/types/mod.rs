//! Data types shared between ingestion and storage

pub mod record;

pub use record::{CollectedRecord, RecordError};
