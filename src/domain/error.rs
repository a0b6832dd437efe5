//! Domain error types.

/// Top-level error type for gatetrader.
#[derive(Debug, thiserror::Error)]
pub enum GatetraderError {
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

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("invalid bar sequence for {symbol} at index {index}: {reason}")]
    BarValidation {
        symbol: String,
        index: usize,
        reason: String,
    },

    #[error("invalid stop: entry {entry_price} and stop {stop_price} leave no stop distance")]
    InvalidStop { entry_price: f64, stop_price: f64 },

    #[error("position size for {symbol} rounds to zero (requested {requested}, affordable {affordable})")]
    SizingCap {
        symbol: String,
        requested: f64,
        affordable: f64,
    },

    #[error("{asset} holdings of {held} do not exceed the protected reserve of {reserved}")]
    ProtectedReserve {
        asset: String,
        held: f64,
        reserved: f64,
    },

    #[error("invalid target: {reason}")]
    InvalidTarget { reason: String },

    #[error("{collaborator} unavailable: {reason}")]
    CollaboratorUnavailable {
        collaborator: String,
        reason: String,
    },

    #[error("collaborator timeout: {collaborator} did not answer within {timeout_ms}ms")]
    CollaboratorTimeout {
        collaborator: String,
        timeout_ms: u64,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GatetraderError {
    /// Sizing failures downgrade a bar to HOLD instead of aborting a run.
    pub fn is_sizing_failure(&self) -> bool {
        matches!(
            self,
            GatetraderError::InvalidStop { .. }
                | GatetraderError::SizingCap { .. }
                | GatetraderError::ProtectedReserve { .. }
        )
    }
}

impl From<&GatetraderError> for std::process::ExitCode {
    fn from(err: &GatetraderError) -> Self {
        let code: u8 = match err {
            GatetraderError::Io(_) | GatetraderError::Csv(_) | GatetraderError::Json(_) => 1,
            GatetraderError::ConfigParse { .. }
            | GatetraderError::ConfigMissing { .. }
            | GatetraderError::ConfigInvalid { .. }
            | GatetraderError::InvalidTarget { .. } => 2,
            GatetraderError::CollaboratorUnavailable { .. }
            | GatetraderError::CollaboratorTimeout { .. } => 3,
            GatetraderError::InvalidStop { .. }
            | GatetraderError::SizingCap { .. }
            | GatetraderError::ProtectedReserve { .. } => 4,
            GatetraderError::NoData { .. }
            | GatetraderError::InsufficientData { .. }
            | GatetraderError::BarValidation { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
