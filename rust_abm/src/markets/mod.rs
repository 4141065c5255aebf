pub mod capital;
pub mod goods;
pub mod labor;

use thiserror::Error;

use crate::agents::FirmId;

pub use capital::{Ownership, ShareholderPool, StockCertificate};
pub use goods::{run_consumption, Goods, GoodsOutcome, Supply, SupplyQuote};
pub use labor::{run_job_search, JobContract, JobOffer, JobOfferQuote, LaborOutcome};

/// Errors raised when an agent uses a market instrument it may not use.
#[derive(Debug, Error, PartialEq)]
pub enum MarketError {
    #[error("offer issued in period {issued} used in period {period}")]
    ExpiredOffer { issued: u64, period: u64 },
    #[error("purchase volume must be positive")]
    EmptyPurchase,
    #[error("supply of {supplier} has {remaining} units left, {requested} requested")]
    SupplyExhausted {
        supplier: FirmId,
        remaining: u64,
        requested: u64,
    },
    #[error("payment of {paid} does not match the {expected} owed")]
    PaymentMismatch { paid: i64, expected: i64 },
    #[error("{0} cannot buy its own supply")]
    SelfPurchase(FirmId),
    #[error("{0} has no supply this period")]
    NoSupply(FirmId),
    #[error("job offer of {0} has no vacancy left")]
    NoVacancy(FirmId),
    #[error("{requested} units requested from an inventory of {available}")]
    InventoryShortfall { requested: u64, available: u64 },
}
