use std::any::Any;
use std::fmt;

use krabmaga::engine::{agent::Agent, schedule::Schedule, state::State};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, LogNormal, Normal};
use serde::Serialize;
use tracing::{error, info};

use crate::agents::{AgentRef, BankData, Cheque, FirmId, HouseholdData, HouseholdId};
use crate::config::{Config, ConfigError};
use crate::error::SimError;
use crate::events::SectorEvent;
use crate::markets::labor::labor_statistics;
use crate::markets::{run_consumption, run_job_search, GoodsOutcome, LaborOutcome};
use crate::sector::{Phase, Sector};

// ─────────────────────────────────────────────────────────────────────────────
// Period record
// ─────────────────────────────────────────────────────────────────────────────

/// Aggregate statistics recorded for a single simulation period.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PeriodRecord {
    pub period: u64,
    pub live_firms: usize,
    pub bankruptcies: usize,
    pub firms_created: usize,
    pub sales_value: i64,
    pub average_price: f64,
    pub average_wage: f64,
    pub employment: usize,
    pub unemployment_rate: f64,
    pub total_debt: i64,
    pub canceled_debt: i64,
    pub dividends: i64,
    pub machines_bought: u32,
}

/// Flows accumulated over the phases of the current period.
#[derive(Clone, Copy, Debug, Default)]
struct PeriodFlows {
    firms_created: usize,
    bankruptcies: usize,
    dividends: i64,
    machines_bought: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Economy state (implements krabmaga State)
// ─────────────────────────────────────────────────────────────────────────────

/// Central state struct holding all agent data and simulation outcomes.
///
/// This implements the krabmaga `State` trait. Opening runs in
/// `before_step`, closure in `after_step`, and the phases in between are
/// driven by a single [`PeriodAgent`] proxy so that their order never
/// depends on the scheduler.
pub struct EconomyState {
    // Agent data
    pub sector: Sector,
    pub households: Vec<HouseholdData>,
    pub bank: BankData,

    // Market outcomes (updated each period)
    pub goods_last: GoodsOutcome,
    pub labor_last: LaborOutcome,

    // Configuration
    pub config: Config,

    // Random number generator
    pub rng: StdRng,

    // Simulation records
    pub records: Vec<PeriodRecord>,
    pub current_period: u64,

    /// First fatal error raised by a phase. Nothing runs once it is set.
    pub failure: Option<SimError>,

    flows: PeriodFlows,
    seed: u64,
}

impl EconomyState {
    pub fn new(config: Config, seed: u64) -> Result<Self, SimError> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let households = Self::create_households(&config, &mut rng)?;
        let sector = Sector::new(&config, &mut rng)?;
        let bank = BankData::new(&config);
        info!(
            firms = sector.len(),
            households = households.len(),
            firm_type = %config.firm_type,
            seed,
            "economy initialised"
        );
        Ok(EconomyState {
            sector,
            households,
            bank,
            goods_last: GoodsOutcome::default(),
            labor_last: LaborOutcome::default(),
            config,
            rng,
            records: Vec::new(),
            current_period: 0,
            failure: None,
            flows: PeriodFlows::default(),
            seed,
        })
    }

    fn create_households(
        cfg: &Config,
        rng: &mut StdRng,
    ) -> Result<Vec<HouseholdData>, ConfigError> {
        let wealth_ln = LogNormal::new(cfg.initial_wealth_mean.ln(), cfg.initial_wealth_sigma)
            .map_err(|e| ConfigError::Invalid {
                field: "initial_wealth_sigma",
                reason: e.to_string(),
            })?;
        let propensity_normal =
            Normal::new(cfg.consumption_propensity_mean, cfg.consumption_propensity_std).map_err(
                |e| ConfigError::Invalid {
                    field: "consumption_propensity_std",
                    reason: e.to_string(),
                },
            )?;

        Ok((0..cfg.n_households)
            .map(|i| {
                let wealth = wealth_ln.sample(rng).round() as i64;
                let propensity = propensity_normal.sample(rng).clamp(0.05, 0.95);
                HouseholdData::new(HouseholdId(i), wealth, cfg.min_wage, propensity)
            })
            .collect())
    }

    /// Park the first fatal error; later ones are consequences of it.
    fn park(&mut self, err: SimError) {
        if self.failure.is_none() {
            error!(period = self.current_period, error = %err, "simulation aborted");
            self.failure = Some(err);
        }
    }

    fn release_workers(&mut self, employer: FirmId, workers: Vec<HouseholdId>) {
        for worker in workers {
            let household = &mut self.households[worker.0];
            if household.employer == Some(employer) {
                household.become_unemployed();
            }
        }
    }

    /// Deposit firm cheques into the households they are payable to.
    fn deliver(&mut self, cheques: Vec<Cheque>) -> Result<(), SimError> {
        let period = self.current_period;
        for cheque in cheques {
            if let AgentRef::Household(id) = cheque.payee() {
                self.households[id.0].receive(cheque, period)?;
            }
        }
        Ok(())
    }

    // ─── Phases ─────────────────────────────────────────────────────────────

    /// Regeneration, scheduled events, then every firm opens.
    pub fn run_opening(&mut self) -> Result<(), SimError> {
        let period = self.current_period;
        self.flows = PeriodFlows::default();
        self.flows.firms_created += self.sector.regenerate(period, &self.config, &mut self.rng)?;

        let events: Vec<SectorEvent> = self
            .config
            .events
            .iter()
            .filter(|e| e.period == period)
            .map(|e| e.event.clone())
            .collect();
        for event in &events {
            self.flows.firms_created +=
                self.sector
                    .apply_event(event, period, &self.config, &mut self.rng)?;
        }

        let rate = self.bank.interest_rate;
        for index in self.sector.order(Phase::Opening, &mut self.rng) {
            let firm = self.sector.firm_mut(index);
            let released = firm.open(period, rate, &self.households[..], &mut self.rng)?;
            let id = firm.id();
            self.release_workers(id, released);
        }
        Ok(())
    }

    /// Debt service: the canonical firm buys no intermediate inputs.
    pub fn run_inputs_purchase(&mut self) -> Result<(), SimError> {
        let short_term = self.bank.short_term_periods;
        for index in self.sector.order(Phase::InputsPurchase, &mut self.rng) {
            self.sector.firm_mut(index).service_debt(short_term)?;
        }
        Ok(())
    }

    pub fn run_pay_dividend(&mut self) -> Result<(), SimError> {
        for index in self.sector.order(Phase::PayDividend, &mut self.rng) {
            let cheques = self.sector.firm_mut(index).pay_dividend()?;
            self.flows.dividends += cheques.iter().map(Cheque::amount).sum::<i64>();
            self.deliver(cheques)?;
        }
        Ok(())
    }

    pub fn run_plan_production(&mut self) -> Result<(), SimError> {
        let peers = self.sector.peers();
        let short_term = self.bank.short_term_periods;
        for index in self.sector.order(Phase::PlanProduction, &mut self.rng) {
            let firm = self.sector.firm_mut(index);
            let laid_off = firm.plan_production(&peers, short_term, &mut self.rng)?;
            let id = firm.id();
            self.release_workers(id, laid_off);
        }
        Ok(())
    }

    pub fn run_production(&mut self) -> Result<(), SimError> {
        for index in self.sector.order(Phase::Production, &mut self.rng) {
            let cheques = self.sector.firm_mut(index).production()?;
            self.deliver(cheques)?;
        }
        Ok(())
    }

    pub fn run_investment(&mut self) -> Result<(), SimError> {
        let period = self.current_period;
        for index in self.sector.order(Phase::Investment, &mut self.rng) {
            self.flows.machines_bought +=
                self.sector
                    .invest(index, period, &self.config, &mut self.rng)?;
        }
        Ok(())
    }

    /// Phases between opening and closure, in their fixed order.
    pub fn run_market_phases(&mut self) -> Result<(), SimError> {
        self.run_inputs_purchase()?;
        self.run_pay_dividend()?;
        self.run_plan_production()?;
        self.labor_last = run_job_search(self)?;
        self.run_production()?;
        self.goods_last = run_consumption(self)?;
        self.run_investment()?;
        Ok(())
    }

    /// Every firm closes; written-off firms leave and the bank takes stock.
    pub fn run_closure(&mut self) -> Result<(), SimError> {
        let peers = self.sector.peers();
        for index in self.sector.order(Phase::Closure, &mut self.rng) {
            let firm = self.sector.firm_mut(index);
            let was_bankrupt = firm.is_bankrupt();
            firm.close(&peers, &mut self.rng)?;
            if firm.is_bankrupt() && !was_bankrupt {
                self.flows.bankruptcies += 1;
            }
        }
        self.bank.observe(self.sector.firms().iter().map(|f| f.account()));
        self.sector
            .remove_liquidated(self.current_period, &self.config, &mut self.rng);
        self.record();
        Ok(())
    }

    /// Record aggregate statistics for the completed period.
    pub fn record(&mut self) {
        let firms = self.sector.firms();
        let prices: Vec<f64> = firms.iter().filter_map(|f| f.price()).collect();
        let labor = labor_statistics(self, self.labor_last.total_matches);
        let record = PeriodRecord {
            period: self.current_period,
            live_firms: firms.len(),
            bankruptcies: self.flows.bankruptcies,
            firms_created: self.flows.firms_created,
            sales_value: firms
                .iter()
                .map(|f| f.dataset().get("sales_value").unwrap_or(0.0) as i64)
                .sum(),
            average_price: if prices.is_empty() {
                0.0
            } else {
                prices.iter().sum::<f64>() / prices.len() as f64
            },
            average_wage: labor.average_wage,
            employment: labor.total_employed,
            unemployment_rate: labor.unemployment_rate,
            total_debt: self.bank.loans,
            canceled_debt: self.bank.losses,
            dividends: self.flows.dividends,
            machines_bought: self.flows.machines_bought,
        };
        info!(
            period = record.period,
            firms = record.live_firms,
            sales = record.sales_value,
            unemployment = record.unemployment_rate,
            bankruptcies = record.bankruptcies,
            "period closed"
        );
        self.records.push(record);
        self.current_period += 1;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// krabmaga Agent proxy (stored in Schedule)
// ─────────────────────────────────────────────────────────────────────────────

/// Proxy agent for the firm sector's middle phases.
///
/// Holds no data; everything lives in the state.
#[derive(Clone)]
pub struct PeriodAgent;

impl fmt::Display for PeriodAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeriodAgent")
    }
}

impl Agent for PeriodAgent {
    fn step(&mut self, state: &mut dyn State) {
        let Some(state) = state.as_any_mut().downcast_mut::<EconomyState>() else {
            return;
        };
        if state.failure.is_some() {
            return;
        }
        if let Err(err) = state.run_market_phases() {
            state.park(err);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// krabmaga State implementation
// ─────────────────────────────────────────────────────────────────────────────

impl State for EconomyState {
    fn init(&mut self, schedule: &mut Schedule) {
        schedule.schedule_repeating(Box::new(PeriodAgent), 0.0, 0);
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_state_mut(&mut self) -> &mut dyn State {
        self
    }

    fn as_state(&self) -> &dyn State {
        self
    }

    fn reset(&mut self) {
        match EconomyState::new(self.config.clone(), self.seed) {
            Ok(fresh) => *self = fresh,
            Err(err) => self.park(err),
        }
    }

    fn before_step(&mut self, _schedule: &mut Schedule) {
        if self.failure.is_some() {
            return;
        }
        if let Err(err) = self.run_opening() {
            self.park(err);
        }
    }

    fn after_step(&mut self, _schedule: &mut Schedule) {
        if self.failure.is_some() {
            return;
        }
        if let Err(err) = self.run_closure() {
            self.park(err);
        }
    }

    fn update(&mut self, _step: u64) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Driver
// ─────────────────────────────────────────────────────────────────────────────

/// Run `periods` periods and return one record per period.
///
/// Stops at the first fatal error.
pub fn run(config: Config, seed: u64, periods: u64) -> Result<Vec<PeriodRecord>, SimError> {
    let mut state = EconomyState::new(config, seed)?;
    let mut schedule = Schedule::new();
    state.init(&mut schedule);
    for _ in 0..periods {
        schedule.step(&mut state);
        if let Some(err) = state.failure.take() {
            return Err(err);
        }
    }
    Ok(state.records)
}
