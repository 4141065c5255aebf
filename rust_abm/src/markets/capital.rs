use rand::rngs::StdRng;

use crate::agents::{FirmId, HouseholdId};

/// Anything able to supply owners for a firm's equity.
pub trait ShareholderPool {
    /// Draw up to `n` distinct capital owners.
    fn select_capital_owners(&self, n: usize, rng: &mut StdRng) -> Vec<HouseholdId>;
}

/// Title to a share of a firm's capital.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StockCertificate {
    holder: HouseholdId,
    issuer: FirmId,
    shares: u64,
    nominal: i64,
}

impl StockCertificate {
    pub fn holder(&self) -> HouseholdId {
        self.holder
    }

    pub fn issuer(&self) -> FirmId {
        self.issuer
    }

    pub fn shares(&self) -> u64 {
        self.shares
    }

    /// Share of the issuer's capital at the time of issuance.
    pub fn nominal(&self) -> i64 {
        self.nominal
    }
}

/// The set of certificates that together own 100% of a firm.
#[derive(Clone, Debug)]
pub struct Ownership {
    issuer: FirmId,
    certificates: Vec<StockCertificate>,
}

impl Ownership {
    pub fn new(issuer: FirmId) -> Self {
        Ownership {
            issuer,
            certificates: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn certificates(&self) -> &[StockCertificate] {
        &self.certificates
    }

    pub fn total_shares(&self) -> u64 {
        self.certificates.iter().map(|c| c.shares).sum()
    }

    /// Partition the firm into one equal certificate per owner.
    pub fn issue_shares(&mut self, owners: &[HouseholdId], capital: i64) {
        if owners.is_empty() {
            return;
        }
        let nominal = capital.max(0) / owners.len() as i64;
        self.certificates.extend(owners.iter().map(|&holder| StockCertificate {
            holder,
            issuer: self.issuer,
            shares: 1,
            nominal,
        }));
    }

    /// Cancel every certificate and reissue the firm to new owners.
    pub fn clear(&mut self, owners: &[HouseholdId], capital: i64) {
        self.certificates.clear();
        self.issue_shares(owners, capital);
    }

    /// Split `amount` pro rata among the holders.
    ///
    /// Each holder receives `amount / total_shares` per share; the remainder
    /// of the integer division is not distributed.
    pub fn distribute(&self, amount: i64) -> Vec<(HouseholdId, i64)> {
        let total = self.total_shares() as i64;
        if total == 0 || amount <= 0 {
            return Vec::new();
        }
        let per_share = amount / total;
        if per_share == 0 {
            return Vec::new();
        }
        self.certificates
            .iter()
            .map(|c| (c.holder, per_share * c.shares as i64))
            .collect()
    }
}
