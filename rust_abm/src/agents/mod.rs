pub mod bank;
pub mod firm;
pub mod household;

use std::fmt;

pub use bank::{Account, AccountError, BankData, Cheque, DebtService};
pub use firm::{Firm, FirmSeed, FirmStrategy, PeerView, WageRule};
pub use household::HouseholdData;

/// Identity of a firm. Never reused, so a regenerated firm gets a fresh id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FirmId(pub u64);

/// Index of a household in `EconomyState::households`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HouseholdId(pub usize);

/// Anything that can hold an account or receive a cheque.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentRef {
    Firm(FirmId),
    Household(HouseholdId),
    Bank,
}

impl fmt::Display for FirmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "firm#{}", self.0)
    }
}

impl fmt::Display for HouseholdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "household#{}", self.0)
    }
}

impl fmt::Display for AgentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentRef::Firm(id) => id.fmt(f),
            AgentRef::Household(id) => id.fmt(f),
            AgentRef::Bank => write!(f, "bank"),
        }
    }
}
