use rand::rngs::StdRng;

use crate::agents::{Account, AgentRef, Cheque, FirmId};
use crate::config::Config;
use crate::error::SimError;
use crate::markets::{Ownership, ShareholderPool};

use super::memory::Trailing;

/// Outcome of the end-of-period solvency check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Solvency {
    Solvent,
    /// Debt above assets, still within the patience window.
    Insolvent { periods: u32 },
    /// Patience exhausted: the excess debt is to be cancelled.
    CancelDebt { amount: i64 },
    Bankrupt,
}

/// Capital, leverage target, dividends, equity and solvency.
#[derive(Clone, Debug)]
pub struct CapitalManager {
    target_debt_ratio: f64,
    payout_rate: f64,
    max_payout_share: f64,
    profits: Trailing,
    patience: u32,
    sanction_periods: u32,
    insolvent_periods: u32,
    sanction: u32,
    shareholders: usize,
    ownership: Ownership,
}

impl CapitalManager {
    pub fn new(issuer: FirmId, target_debt_ratio: f64, config: &Config) -> Self {
        CapitalManager {
            target_debt_ratio,
            payout_rate: config.payout_rate,
            max_payout_share: config.max_payout_share,
            profits: Trailing::new(config.profit_memory),
            patience: config.patience,
            sanction_periods: config.dividend_sanction_periods,
            insolvent_periods: 0,
            sanction: 0,
            shareholders: config.shareholders_per_firm,
            ownership: Ownership::new(issuer),
        }
    }

    pub fn target_debt_ratio(&self) -> f64 {
        self.target_debt_ratio
    }

    pub fn set_target_debt_ratio(&mut self, ratio: f64) {
        self.target_debt_ratio = ratio.clamp(0.0, 1.0);
    }

    pub fn ownership(&self) -> &Ownership {
        &self.ownership
    }

    pub fn insolvent_periods(&self) -> u32 {
        self.insolvent_periods
    }

    pub fn dividends_allowed(&self) -> bool {
        self.sanction == 0
    }

    pub fn average_profit(&self) -> f64 {
        self.profits.mean()
    }

    /// Capital the firm wants to hold given its leverage target.
    pub fn capital_target(&self, assets: i64) -> i64 {
        (assets as f64 * (1.0 - self.target_debt_ratio)).round() as i64
    }

    /// Make sure `amount` is available in cash, borrowing short-term if not.
    pub fn secure_financing(&self, account: &mut Account, amount: i64, term: u32) -> Result<i64, SimError> {
        let shortfall = amount - account.amount();
        if shortfall <= 0 {
            return Ok(0);
        }
        account.borrow(shortfall, term, false)?;
        if account.amount() < amount {
            return Err(SimError::InsufficientFinancing {
                needed: amount,
                available: account.amount(),
            });
        }
        Ok(shortfall)
    }

    /// Dividend the firm is ready to pay this period.
    pub fn dividend(&self, capital: i64, cash: i64) -> i64 {
        if !self.dividends_allowed() || capital <= 0 {
            return 0;
        }
        let average = self.profits.mean();
        if average <= 0.0 {
            return 0;
        }
        let by_profit = (self.payout_rate * average).round() as i64;
        let by_capital = (capital as f64 * self.max_payout_share).round() as i64;
        by_profit.min(cash).min(by_capital).max(0)
    }

    /// Pay the dividend out pro rata. The undistributable remainder stays in
    /// the firm.
    pub fn pay_dividend(
        &self,
        account: &mut Account,
        capital: i64,
        period: u64,
    ) -> Result<Vec<Cheque>, SimError> {
        let amount = self.dividend(capital, account.amount());
        self.ownership
            .distribute(amount)
            .into_iter()
            .map(|(holder, share)| {
                account
                    .issue_cheque(AgentRef::Household(holder), share, period)
                    .map_err(SimError::from)
            })
            .collect()
    }

    /// Draw the first shareholders if the firm has none yet.
    pub fn seed_ownership<P>(&mut self, pool: &P, capital: i64, rng: &mut StdRng)
    where
        P: ShareholderPool + ?Sized,
    {
        if self.ownership.is_empty() {
            let owners = pool.select_capital_owners(self.shareholders, rng);
            self.ownership.issue_shares(&owners, capital);
        }
    }

    pub fn clear_ownership<P>(&mut self, pool: &P, capital: i64, rng: &mut StdRng)
    where
        P: ShareholderPool + ?Sized,
    {
        let owners = pool.select_capital_owners(self.shareholders, rng);
        self.ownership.clear(&owners, capital);
    }

    pub fn record_profit(&mut self, net_profit: i64) {
        self.profits.push(net_profit as f64);
    }

    /// Count insolvent periods and decide what happens once patience runs out.
    pub fn check_solvency(&mut self, debt: i64, assets: i64, machines: u32) -> Solvency {
        self.sanction = self.sanction.saturating_sub(1);
        if debt <= assets {
            self.insolvent_periods = 0;
            return Solvency::Solvent;
        }
        self.insolvent_periods += 1;
        if self.insolvent_periods <= self.patience {
            return Solvency::Insolvent {
                periods: self.insolvent_periods,
            };
        }
        self.insolvent_periods = 0;
        if machines == 0 {
            return Solvency::Bankrupt;
        }
        self.sanction = self.sanction_periods;
        Solvency::CancelDebt {
            amount: debt - assets,
        }
    }
}
