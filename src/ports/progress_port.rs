//! Batch progress reporting port.

use crate::domain::batch::ProgressEvent;

pub trait ProgressSink: Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// Discards all events.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _event: &ProgressEvent) {}
}
