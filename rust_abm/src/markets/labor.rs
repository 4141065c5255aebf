use rand::seq::SliceRandom;
use rand::rngs::StdRng;
use tracing::debug;

use crate::agents::{FirmId, HouseholdId};
use crate::error::SimError;
use crate::markets::MarketError;
use crate::state::EconomyState;

// ─────────────────────────────────────────────────────────────────────────────
// Job offers and contracts
// ─────────────────────────────────────────────────────────────────────────────

/// Vacancies a firm publishes for one period at a single wage.
#[derive(Clone, Debug)]
pub struct JobOffer {
    employer: FirmId,
    wage: i64,
    initial: u32,
    vacancies: u32,
    period: u64,
}

impl JobOffer {
    pub fn new(employer: FirmId, wage: i64, vacancies: u32, period: u64) -> Self {
        JobOffer {
            employer,
            wage,
            initial: vacancies,
            vacancies,
            period,
        }
    }

    pub fn employer(&self) -> FirmId {
        self.employer
    }

    pub fn wage(&self) -> i64 {
        self.wage
    }

    pub fn initial_vacancies(&self) -> u32 {
        self.initial
    }

    /// Vacancies still open.
    pub fn vacancies(&self) -> u32 {
        self.vacancies
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    /// Fill one vacancy. Applying in any other period than the one the offer
    /// was issued in is an error.
    pub fn apply(&mut self, period: u64) -> Result<(), MarketError> {
        if period != self.period {
            return Err(MarketError::ExpiredOffer {
                issued: self.period,
                period,
            });
        }
        if self.vacancies == 0 {
            return Err(MarketError::NoVacancy(self.employer));
        }
        self.vacancies -= 1;
        Ok(())
    }
}

/// Snapshot of an open job offer as seen by a job seeker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobOfferQuote {
    pub employer: FirmId,
    pub wage: i64,
}

/// Employment relation between a firm and a household.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobContract {
    worker: HouseholdId,
    wage: i64,
    start: u64,
    term: u64,
}

impl JobContract {
    pub fn new(worker: HouseholdId, wage: i64, start: u64, term: u64) -> Self {
        JobContract {
            worker,
            wage,
            start,
            term,
        }
    }

    pub fn worker(&self) -> HouseholdId {
        self.worker
    }

    pub fn wage(&self) -> i64 {
        self.wage
    }

    pub fn end(&self) -> u64 {
        self.start + self.term
    }

    pub fn is_valid(&self, period: u64) -> bool {
        period < self.end()
    }
}

/// Draw up to `n` offers and sort them from best to worst paid.
pub fn best_paid(offers: &[JobOfferQuote], n: usize, rng: &mut StdRng) -> Vec<JobOfferQuote> {
    let mut sample: Vec<JobOfferQuote> = offers.choose_multiple(rng, n).copied().collect();
    sample.sort_by(|a, b| b.wage.cmp(&a.wage));
    sample
}

// ─────────────────────────────────────────────────────────────────────────────
// Job search
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of the labour market for one period.
#[derive(Clone, Debug, Default)]
pub struct LaborOutcome {
    pub total_employed: usize,
    pub total_unemployed: usize,
    pub unemployment_rate: f64,
    pub average_wage: f64,
    pub total_matches: usize,
}

/// Unemployed households apply to the period's job offers.
///
/// Each job seeker, in shuffled order, samples a few offers, sorts them by
/// wage and takes the best one that still has a vacancy and pays at least
/// its reservation wage. Seekers left without a job lower their
/// reservation wage.
pub fn run_job_search(state: &mut EconomyState) -> Result<LaborOutcome, SimError> {
    let period = state.current_period;
    let sample_size = state.config.job_search_size;

    let mut seekers: Vec<usize> = (0..state.households.len())
        .filter(|&i| !state.households[i].is_employed())
        .collect();
    seekers.shuffle(&mut state.rng);

    let mut total_matches = 0usize;
    for hh_idx in seekers {
        let offers = state.sector.job_offer_quotes();
        if offers.is_empty() {
            break;
        }
        let reservation = state.households[hh_idx].reservation_wage;
        for offer in best_paid(&offers, sample_size, &mut state.rng) {
            if (offer.wage as f64) < reservation {
                break;
            }
            let hired = state.sector.hire(
                offer.employer,
                HouseholdId(hh_idx),
                period,
                &mut state.rng,
            )?;
            if let Some(contract) = hired {
                state.households[hh_idx].become_employed(offer.employer, contract.wage());
                total_matches += 1;
                break;
            }
        }
    }

    let decay = state.config.reservation_wage_decay;
    let floor = state.config.min_wage;
    for hh in state.households.iter_mut().filter(|h| !h.is_employed()) {
        hh.lower_reservation_wage(decay, floor);
    }

    let outcome = labor_statistics(state, total_matches);
    debug!(
        period,
        matches = outcome.total_matches,
        unemployment = outcome.unemployment_rate,
        "job search done"
    );
    Ok(outcome)
}

/// Employment statistics over the whole household population.
pub fn labor_statistics(state: &EconomyState, total_matches: usize) -> LaborOutcome {
    let total = state.households.len();
    let wages: Vec<i64> = state
        .households
        .iter()
        .filter(|h| h.is_employed())
        .map(|h| h.wage)
        .collect();
    let total_employed = wages.len();
    let total_unemployed = total - total_employed;
    LaborOutcome {
        total_employed,
        total_unemployed,
        unemployment_rate: if total > 0 {
            total_unemployed as f64 / total as f64
        } else {
            0.0
        },
        average_wage: if wages.is_empty() {
            0.0
        } else {
            wages.iter().sum::<i64>() as f64 / total_employed as f64
        },
        total_matches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn job_offer_is_valid_only_in_its_period() {
        let mut offer = JobOffer::new(FirmId(2), 1000, 3, 7);
        offer.apply(7).unwrap();
        assert_eq!(
            offer.apply(8),
            Err(MarketError::ExpiredOffer { issued: 7, period: 8 })
        );
        assert_eq!(offer.vacancies(), 2);
    }

    #[test]
    fn job_offer_runs_out_of_vacancies() {
        let mut offer = JobOffer::new(FirmId(2), 1000, 1, 0);
        offer.apply(0).unwrap();
        assert_eq!(offer.apply(0), Err(MarketError::NoVacancy(FirmId(2))));
    }

    #[test]
    fn contract_expires_at_end_of_term() {
        let contract = JobContract::new(HouseholdId(1), 900, 10, 6);
        assert!(contract.is_valid(10));
        assert!(contract.is_valid(15));
        assert!(!contract.is_valid(16));
    }

    #[test]
    fn best_paid_sorts_by_wage() {
        let offers = vec![
            JobOfferQuote { employer: FirmId(1), wage: 900 },
            JobOfferQuote { employer: FirmId(2), wage: 1100 },
            JobOfferQuote { employer: FirmId(3), wage: 1000 },
        ];
        let mut rng = StdRng::seed_from_u64(1);
        let sorted = best_paid(&offers, 3, &mut rng);
        assert_eq!(sorted[0].employer, FirmId(2));
        assert_eq!(sorted[2].employer, FirmId(1));
    }
}
