//! Report generation port trait.

use std::path::PathBuf;

use crate::domain::batch::BatchResult;
use crate::domain::error::RankbtError;

/// Port for persisting a ranked batch.
pub trait ReportPort {
    /// Writes the report and returns where it landed.
    fn write(&self, result: &BatchResult) -> Result<PathBuf, RankbtError>;
}
