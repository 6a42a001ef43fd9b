//! Domain error types.

use chrono::NaiveDate;

/// Broad classification of a [`RankbtError`], used when recording
/// per-instrument failures in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Simulation,
    System,
    Config,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Simulation => "simulation",
            ErrorKind::System => "system",
            ErrorKind::Config => "config",
        };
        f.write_str(name)
    }
}

/// Top-level error type for rankbt.
#[derive(Debug, thiserror::Error)]
pub enum RankbtError {
    #[error("{instrument}: missing required column '{column}'")]
    MissingColumn { instrument: String, column: String },

    #[error("{instrument}: invalid row {row}: {reason}")]
    InvalidRow {
        instrument: String,
        row: usize,
        reason: String,
    },

    #[error("insufficient data for {instrument}: have {bars} bars, need {minimum}")]
    InsufficientData {
        instrument: String,
        bars: usize,
        minimum: usize,
    },

    #[error("{instrument}: duplicate date {date}")]
    DuplicateDate { instrument: String, date: NaiveDate },

    #[error("{instrument}: invalid close price {price} on {date}")]
    InvalidPrice {
        instrument: String,
        date: NaiveDate,
        price: f64,
    },

    #[error("{instrument}: volume confirmation required but no volume data")]
    MissingVolume { instrument: String },

    #[error("invalid signals: {reason}")]
    InvalidSignals { reason: String },

    #[error("invalid signal config: {reason}")]
    InvalidSignalConfig { reason: String },

    #[error("invalid simulation parameters: {reason}")]
    InvalidSimulation { reason: String },

    #[error("no data for {instrument}")]
    NoData { instrument: String },

    #[error("worker panicked while processing {instrument}: {reason}")]
    WorkerPanic { instrument: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RankbtError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RankbtError::MissingColumn { .. }
            | RankbtError::InvalidRow { .. }
            | RankbtError::InsufficientData { .. }
            | RankbtError::DuplicateDate { .. }
            | RankbtError::InvalidPrice { .. }
            | RankbtError::MissingVolume { .. }
            | RankbtError::InvalidSignals { .. } => ErrorKind::Validation,
            RankbtError::InvalidSignalConfig { .. } | RankbtError::InvalidSimulation { .. } => {
                ErrorKind::Simulation
            }
            RankbtError::NoData { .. }
            | RankbtError::WorkerPanic { .. }
            | RankbtError::Csv(_)
            | RankbtError::Io(_) => ErrorKind::System,
            RankbtError::ConfigParse { .. }
            | RankbtError::ConfigMissing { .. }
            | RankbtError::ConfigInvalid { .. } => ErrorKind::Config,
        }
    }
}

impl From<&RankbtError> for std::process::ExitCode {
    fn from(err: &RankbtError) -> Self {
        let code: u8 = match err.kind() {
            ErrorKind::System => 1,
            ErrorKind::Config => 2,
            ErrorKind::Simulation => 3,
            ErrorKind::Validation => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_classified() {
        let err = RankbtError::InsufficientData {
            instrument: "600000".into(),
            bars: 120,
            minimum: 250,
        };
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            err.to_string(),
            "insufficient data for 600000: have 120 bars, need 250"
        );
    }

    #[test]
    fn io_error_is_system() {
        let err = RankbtError::from(std::io::Error::other("disk gone"));
        assert_eq!(err.kind(), ErrorKind::System);
    }

    #[test]
    fn simulation_and_config_kinds() {
        let sim = RankbtError::InvalidSimulation {
            reason: "initial_capital must be positive".into(),
        };
        assert_eq!(sim.kind(), ErrorKind::Simulation);

        let cfg = RankbtError::ConfigMissing {
            section: "batch".into(),
            key: "data_dir".into(),
        };
        assert_eq!(cfg.kind(), ErrorKind::Config);
        assert_eq!(cfg.to_string(), "missing config key [batch] data_dir");
    }

    #[test]
    fn kind_display() {
        assert_eq!(ErrorKind::Validation.to_string(), "validation");
        assert_eq!(ErrorKind::System.to_string(), "system");
    }
}
