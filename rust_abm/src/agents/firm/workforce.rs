use rand::Rng;

use crate::agents::{Account, AccountError, AgentRef, Cheque, FirmId, HouseholdId};
use crate::config::Config;
use crate::markets::{JobContract, JobOffer, MarketError};

/// Wage setting, hiring and payroll.
#[derive(Clone, Debug)]
pub struct WorkforceManager {
    employer: FirmId,
    wage: f64,
    low: f64,
    high: f64,
    flexibility: f64,
    min_wage: f64,
    normal_vacancy_rate: f64,
    term_min: u64,
    term_max: u64,
    contracts: Vec<JobContract>,
    offer: Option<JobOffer>,
    manpower_target: u32,
    last_openings: u32,
    last_vacancies: u32,
}

impl WorkforceManager {
    pub fn new(employer: FirmId, config: &Config) -> Self {
        let mut workforce = WorkforceManager {
            employer,
            wage: 0.0,
            low: 0.0,
            high: 0.0,
            flexibility: config.wage_flexibility,
            min_wage: config.min_wage,
            normal_vacancy_rate: config.normal_vacancy_rate,
            term_min: config.contract_term_min,
            term_max: config.contract_term_max,
            contracts: Vec::new(),
            offer: None,
            manpower_target: 0,
            last_openings: 0,
            last_vacancies: 0,
        };
        workforce.set_wage(config.initial_wage);
        workforce
    }

    pub fn wage(&self) -> f64 {
        self.wage
    }

    /// Wage written into job offers.
    pub fn offered_wage(&self) -> i64 {
        self.wage.round().max(1.0) as i64
    }

    pub fn bracket(&self) -> (f64, f64) {
        (self.low, self.high)
    }

    pub fn workforce(&self) -> usize {
        self.contracts.len()
    }

    pub fn contracts(&self) -> &[JobContract] {
        &self.contracts
    }

    pub fn manpower_target(&self) -> u32 {
        self.manpower_target
    }

    pub fn job_openings(&self) -> u32 {
        self.offer.as_ref().map_or(0, |o| o.initial_vacancies())
    }

    pub fn vacancies(&self) -> u32 {
        self.offer.as_ref().map_or(0, |o| o.vacancies())
    }

    pub fn vacancy_rate(&self) -> f64 {
        let openings = self.job_openings();
        if openings == 0 {
            0.0
        } else {
            self.vacancies() as f64 / openings as f64
        }
    }

    pub fn offer(&self) -> Option<&JobOffer> {
        self.offer.as_ref()
    }

    /// Jump to `wage` with a fresh bracket around it.
    pub fn set_wage(&mut self, wage: f64) {
        self.wage = wage.max(self.min_wage);
        self.low = (self.wage * (1.0 - self.flexibility)).max(self.min_wage);
        self.high = self.wage * (1.0 + self.flexibility);
    }

    pub fn open(&mut self) {
        self.offer = None;
    }

    /// Bracketed wage adjustment from last period's vacancy rate.
    pub fn update_wage(&mut self, rng: &mut impl Rng) {
        if self.last_openings == 0 {
            return;
        }
        let vacancy_rate = self.last_vacancies as f64 / self.last_openings as f64;
        let mut wage = self.wage;
        if vacancy_rate > self.normal_vacancy_rate {
            self.low = wage;
            wage += rng.gen::<f64>() * (self.high - wage);
            self.high *= 1.0 + self.flexibility;
        } else {
            self.high = wage;
            wage = self.low + rng.gen::<f64>() * (wage - self.low);
            self.low = (self.low * (1.0 - self.flexibility)).max(self.min_wage);
        }
        self.wage = wage.clamp(self.low, self.high).max(self.min_wage);
    }

    /// Size the workforce for the coming production.
    ///
    /// Returns the workers laid off, most recent hires first.
    pub fn update_workforce(&mut self, capacity: u32, utilization: f64, period: u64) -> Vec<HouseholdId> {
        self.manpower_target = (capacity as f64 * utilization).round() as u32;
        let target = self.manpower_target as usize;
        if target < self.contracts.len() {
            self.offer = None;
            return self
                .contracts
                .split_off(target)
                .into_iter()
                .rev()
                .map(|c| c.worker())
                .collect();
        }
        let openings = (target - self.contracts.len()) as u32;
        self.offer = (openings > 0)
            .then(|| JobOffer::new(self.employer, self.offered_wage(), openings, period));
        Vec::new()
    }

    /// Wages owed this period if every opening gets filled.
    pub fn payroll_forecast(&self) -> i64 {
        let current: i64 = self.contracts.iter().map(|c| c.wage()).sum();
        let openings = self.offer.as_ref().map_or(0, |o| o.vacancies() as i64 * o.wage());
        current + openings
    }

    pub fn hire(
        &mut self,
        worker: HouseholdId,
        period: u64,
        rng: &mut impl Rng,
    ) -> Result<Option<JobContract>, MarketError> {
        let Some(offer) = self.offer.as_mut().filter(|o| o.vacancies() > 0) else {
            return Ok(None);
        };
        offer.apply(period)?;
        let term = rng.gen_range(self.term_min..=self.term_max);
        let contract = JobContract::new(worker, offer.wage(), period, term);
        self.contracts.push(contract.clone());
        Ok(Some(contract))
    }

    /// Drop contracts that ran out. Returns the workers released.
    pub fn expire(&mut self, period: u64) -> Vec<HouseholdId> {
        let (valid, expired): (Vec<_>, Vec<_>) =
            self.contracts.drain(..).partition(|c| c.is_valid(period));
        self.contracts = valid;
        expired.into_iter().map(|c| c.worker()).collect()
    }

    pub fn layoff_all(&mut self) -> Vec<HouseholdId> {
        self.offer = None;
        self.contracts.drain(..).map(|c| c.worker()).collect()
    }

    /// One wage cheque per active contract.
    pub fn pay_workers(&self, account: &mut Account, period: u64) -> Result<Vec<Cheque>, AccountError> {
        let payroll: i64 = self.contracts.iter().map(|c| c.wage()).sum();
        if payroll > account.amount() {
            return Err(AccountError::InsufficientFunds {
                holder: account.holder(),
                required: payroll,
                available: account.amount(),
            });
        }
        self.contracts
            .iter()
            .map(|c| account.issue_cheque(AgentRef::Household(c.worker()), c.wage(), period))
            .collect()
    }

    /// Remember the hiring outcome for the next wage decision.
    pub fn close(&mut self) {
        self.last_openings = self.job_openings();
        self.last_vacancies = self.vacancies();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn manager() -> WorkforceManager {
        WorkforceManager::new(FirmId(1), &Config::default())
    }

    #[test]
    fn target_creates_one_offer_for_all_openings() {
        let mut workforce = manager();
        let laid_off = workforce.update_workforce(10, 0.85, 4);
        assert!(laid_off.is_empty());
        assert_eq!(workforce.manpower_target(), 9);
        let offer = workforce.offer().unwrap();
        assert_eq!(offer.vacancies(), 9);
        assert_eq!(offer.wage(), 1000);
        assert_eq!(workforce.payroll_forecast(), 9000);
    }

    #[test]
    fn layoffs_hit_most_recent_hires_first() {
        let mut workforce = manager();
        let mut rng = StdRng::seed_from_u64(1);
        workforce.update_workforce(4, 1.0, 0);
        for i in 0..4 {
            workforce.hire(HouseholdId(i), 0, &mut rng).unwrap().unwrap();
        }
        workforce.open();
        let laid_off = workforce.update_workforce(4, 0.5, 1);
        assert_eq!(laid_off, vec![HouseholdId(3), HouseholdId(2)]);
        assert_eq!(workforce.workforce(), 2);
        assert!(workforce.offer().is_none());
    }

    #[test]
    fn hiring_after_the_offer_period_fails() {
        let mut workforce = manager();
        let mut rng = StdRng::seed_from_u64(1);
        workforce.update_workforce(2, 1.0, 5);
        assert!(matches!(
            workforce.hire(HouseholdId(0), 6, &mut rng),
            Err(MarketError::ExpiredOffer { issued: 5, period: 6 })
        ));
    }

    #[test]
    fn hiring_without_vacancy_returns_none() {
        let mut workforce = manager();
        let mut rng = StdRng::seed_from_u64(1);
        workforce.update_workforce(1, 1.0, 0);
        assert!(workforce.hire(HouseholdId(0), 0, &mut rng).unwrap().is_some());
        assert!(workforce.hire(HouseholdId(1), 0, &mut rng).unwrap().is_none());
    }

    #[test]
    fn contracts_expire_by_term() {
        let mut workforce = manager();
        let mut rng = StdRng::seed_from_u64(1);
        workforce.update_workforce(1, 1.0, 0);
        let contract = workforce.hire(HouseholdId(7), 0, &mut rng).unwrap().unwrap();
        assert!(workforce.expire(contract.end() - 1).is_empty());
        assert_eq!(workforce.expire(contract.end()), vec![HouseholdId(7)]);
    }

    #[test]
    fn payroll_requires_cash() {
        let mut workforce = manager();
        let mut rng = StdRng::seed_from_u64(1);
        workforce.update_workforce(2, 1.0, 0);
        workforce.hire(HouseholdId(0), 0, &mut rng).unwrap();
        workforce.hire(HouseholdId(1), 0, &mut rng).unwrap();
        let mut account = Account::new(AgentRef::Firm(FirmId(1)));
        account.endow(1500);
        assert!(matches!(
            workforce.pay_workers(&mut account, 0),
            Err(AccountError::InsufficientFunds { required: 2000, .. })
        ));
        assert_eq!(account.amount(), 1500);
        account.endow(500);
        let cheques = workforce.pay_workers(&mut account, 0).unwrap();
        assert_eq!(cheques.len(), 2);
        assert_eq!(account.amount(), 0);
    }

    #[test]
    fn unfilled_vacancies_raise_the_wage() {
        let mut workforce = manager();
        let mut rng = StdRng::seed_from_u64(1);
        workforce.update_workforce(10, 1.0, 0);
        workforce.close();
        workforce.update_wage(&mut rng);
        assert!(workforce.wage() >= 1000.0);
        assert_eq!(workforce.bracket().0, 1000.0);
    }

    proptest! {
        #[test]
        fn wage_never_falls_below_minimum(
            seed in any::<u64>(),
            filled in prop::collection::vec(any::<bool>(), 1..150),
        ) {
            let config = Config { initial_wage: 120.0, min_wage: 100.0, ..Config::default() };
            let mut workforce = WorkforceManager::new(FirmId(1), &config);
            let mut rng = StdRng::seed_from_u64(seed);
            for (period, fill) in filled.into_iter().enumerate() {
                let period = period as u64;
                workforce.open();
                workforce.layoff_all();
                workforce.update_workforce(1, 1.0, period);
                if fill {
                    workforce.hire(HouseholdId(0), period, &mut rng).unwrap();
                }
                workforce.close();
                workforce.update_wage(&mut rng);
                let (low, high) = workforce.bracket();
                prop_assert!(workforce.wage() >= 100.0);
                prop_assert!(low >= 100.0 && low <= workforce.wage() && workforce.wage() <= high);
            }
        }
    }
}
