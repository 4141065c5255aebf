use rand::rngs::StdRng;
use rand::seq::index;

use crate::agents::{Account, AgentRef, Cheque, FirmId, HouseholdId};
use crate::agents::bank::AccountError;
use crate::markets::ShareholderPool;

// ─────────────────────────────────────────────────────────────────────────────
// Data stored in EconomyState::households
// ─────────────────────────────────────────────────────────────────────────────

/// All mutable state for a single household: worker, consumer and
/// potential shareholder.
#[derive(Clone, Debug)]
pub struct HouseholdData {
    pub id: HouseholdId,
    pub account: Account,
    pub employer: Option<FirmId>,
    pub wage: i64,
    pub reservation_wage: f64,
    pub consumption_propensity: f64,
    pub unemployment_spell: u32,
}

impl HouseholdData {
    pub fn new(id: HouseholdId, wealth: i64, reservation_wage: f64, propensity: f64) -> Self {
        let mut account = Account::new(AgentRef::Household(id));
        account.endow(wealth);
        HouseholdData {
            id,
            account,
            employer: None,
            wage: 0,
            reservation_wage,
            consumption_propensity: propensity,
            unemployment_spell: 0,
        }
    }

    pub fn is_employed(&self) -> bool {
        self.employer.is_some()
    }

    pub fn cash(&self) -> i64 {
        self.account.amount()
    }

    // ─── Employment interface ───────────────────────────────────────────────

    pub fn become_employed(&mut self, employer: FirmId, wage: i64) {
        self.employer = Some(employer);
        self.wage = wage;
        self.reservation_wage = wage as f64;
        self.unemployment_spell = 0;
    }

    pub fn become_unemployed(&mut self) {
        self.employer = None;
        self.wage = 0;
    }

    pub fn lower_reservation_wage(&mut self, decay: f64, floor: f64) {
        self.unemployment_spell += 1;
        self.reservation_wage = (self.reservation_wage * (1.0 - decay)).max(floor);
    }

    // ─── Income and spending ────────────────────────────────────────────────

    pub fn receive(&mut self, cheque: Cheque, period: u64) -> Result<(), AccountError> {
        self.account.deposit(cheque, period)
    }

    pub fn consumption_budget(&self) -> i64 {
        (self.cash() as f64 * self.consumption_propensity).round() as i64
    }
}

impl ShareholderPool for [HouseholdData] {
    fn select_capital_owners(&self, n: usize, rng: &mut StdRng) -> Vec<HouseholdId> {
        let n = n.min(self.len());
        index::sample(rng, self.len(), n)
            .into_iter()
            .map(|i| self[i].id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::collections::BTreeSet;

    fn households(n: usize) -> Vec<HouseholdData> {
        (0..n)
            .map(|i| HouseholdData::new(HouseholdId(i), 1000, 800.0, 0.5))
            .collect()
    }

    #[test]
    fn capital_owners_are_distinct() {
        let pool = households(20);
        let mut rng = StdRng::seed_from_u64(5);
        let owners = pool.select_capital_owners(10, &mut rng);
        let unique: BTreeSet<_> = owners.iter().collect();
        assert_eq!(owners.len(), 10);
        assert_eq!(unique.len(), 10);
        assert_eq!(pool.select_capital_owners(50, &mut rng).len(), 20);
    }

    #[test]
    fn reservation_wage_decays_to_floor() {
        let mut hh = HouseholdData::new(HouseholdId(0), 0, 1000.0, 0.5);
        for _ in 0..100 {
            hh.lower_reservation_wage(0.1, 400.0);
        }
        assert_eq!(hh.reservation_wage, 400.0);
        hh.become_employed(FirmId(3), 700);
        assert_eq!(hh.reservation_wage, 700.0);
        assert_eq!(hh.unemployment_spell, 0);
    }

    #[test]
    fn budget_never_exceeds_cash() {
        let hh = HouseholdData::new(HouseholdId(0), 3, 0.0, 0.99);
        assert!(hh.consumption_budget() <= hh.cash());
    }
}
