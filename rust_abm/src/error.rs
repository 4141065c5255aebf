use thiserror::Error;

use crate::agents::{AccountError, FirmId};
use crate::config::ConfigError;
use crate::markets::MarketError;

/// Fatal simulation errors.
///
/// Recoverable business conditions (insolvency, bankruptcy, a payroll
/// shortfall covered by a short-term loan) never surface here; anything that
/// does aborts the run.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Market(#[from] MarketError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{firm} opened twice in period {period}")]
    AlreadyOpen { firm: FirmId, period: u64 },
    #[error("{firm} is not open")]
    NotOpen { firm: FirmId },
    #[error("{firm} operated while bankrupt in period {period}")]
    OperatingWhileBankrupt { firm: FirmId, period: u64 },
    #[error(
        "inconsistent capital for {firm} in period {period}: expected {expected}, found {actual}"
    )]
    InconsistentCapital {
        firm: FirmId,
        period: u64,
        expected: i64,
        actual: i64,
    },
    #[error("financing shortfall: {needed} needed, {available} available")]
    InsufficientFinancing { needed: i64, available: i64 },
    #[error("unknown firm type `{0}`")]
    UnknownFirmType(String),
}
