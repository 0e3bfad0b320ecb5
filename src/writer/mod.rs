//! File sink: exclusive handle, date rotation, time source and failure reporting

pub mod clock;
pub mod diagnostics;
pub mod exclusive_file;
pub mod rotating;

pub use clock::{Clock, ManualClock, SystemClock};
pub use diagnostics::{Diagnostics, DiagnosticsSnapshot, Failure, FailureKind, FailureObserver};
pub use exclusive_file::{ExclusiveFile, HandleGuard};
pub use rotating::{rotated_path, RotateOutcome, RotatingFileWriter, MAX_SEQUENCE};
