//! Progress sink that reports through the `log` facade.

use crate::domain::batch::ProgressEvent;
use crate::ports::progress_port::ProgressSink;

pub struct LogProgressSink;

pub fn format_progress(event: &ProgressEvent) -> String {
    format!(
        "[{}/{}] {:.1}% | ok {} failed {} | {:.1} instruments/s | eta {:.1} min",
        event.completed,
        event.total,
        event.percent(),
        event.succeeded,
        event.failed,
        event.throughput,
        event.eta.as_secs_f64() / 60.0
    )
}

impl ProgressSink for LogProgressSink {
    fn on_progress(&self, event: &ProgressEvent) {
        log::info!("{}", format_progress(event));
    }
}
