use std::collections::BTreeMap;
use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::agents::{AgentRef, Cheque, Firm, FirmId, FirmSeed, FirmStrategy, HouseholdId, PeerView};
use crate::config::Config;
use crate::error::SimError;
use crate::events::SectorEvent;
use crate::markets::goods::cheapest;
use crate::markets::{Goods, JobContract, JobOfferQuote, MarketError, SupplyQuote};

// ─────────────────────────────────────────────────────────────────────────────
// Phases
// ─────────────────────────────────────────────────────────────────────────────

/// The ordered steps every live firm goes through each period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Opening,
    InputsPurchase,
    PayDividend,
    PlanProduction,
    Production,
    Investment,
    Closure,
}

impl Phase {
    pub const ALL: [Phase; 7] = [
        Phase::Opening,
        Phase::InputsPurchase,
        Phase::PayDividend,
        Phase::PlanProduction,
        Phase::Production,
        Phase::Investment,
        Phase::Closure,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Phase::Opening => "opening",
            Phase::InputsPurchase => "inputs_purchase",
            Phase::PayDividend => "pay_dividend",
            Phase::PlanProduction => "plan_production",
            Phase::Production => "production",
            Phase::Investment => "investment",
            Phase::Closure => "closure",
        }
    }

    /// Whether firms that went bankrupt still take part.
    fn includes_bankrupt(self) -> bool {
        matches!(self, Phase::Opening | Phase::Closure)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Firm registry
// ─────────────────────────────────────────────────────────────────────────────

/// Builds a firm of one registered type.
pub type FirmFactory = fn(FirmSeed, &Config, &mut StdRng) -> Result<Firm, SimError>;

fn basic_firm(seed: FirmSeed, config: &Config, rng: &mut StdRng) -> Result<Firm, SimError> {
    Firm::new(seed, FirmStrategy::basic(), config, rng)
}

fn wage_copy_firm(seed: FirmSeed, config: &Config, rng: &mut StdRng) -> Result<Firm, SimError> {
    Firm::new(seed, FirmStrategy::wage_copy(), config, rng)
}

/// Firm types selectable by name from the configuration.
#[derive(Clone)]
pub struct FirmRegistry {
    entries: BTreeMap<&'static str, FirmFactory>,
}

impl Default for FirmRegistry {
    fn default() -> Self {
        let mut registry = FirmRegistry {
            entries: BTreeMap::new(),
        };
        registry.register("basic", basic_firm);
        registry.register("wage_copy", wage_copy_firm);
        registry
    }
}

impl FirmRegistry {
    pub fn register(&mut self, name: &'static str, factory: FirmFactory) {
        self.entries.insert(name, factory);
    }

    pub fn resolve(&self, name: &str) -> Result<FirmFactory, SimError> {
        self.entries
            .get(name)
            .copied()
            .ok_or_else(|| SimError::UnknownFirmType(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sector
// ─────────────────────────────────────────────────────────────────────────────

/// The live firm population and its regeneration schedule.
///
/// Households and investing firms reach individual firms through it.
#[derive(Clone)]
pub struct Sector {
    firms: Vec<Firm>,
    factory: FirmFactory,
    next_id: u64,
    regeneration: BTreeMap<u64, usize>,
    shuffle: bool,
}

impl Sector {
    /// Resolve the configured firm type and create the first generation.
    pub fn new(config: &Config, rng: &mut StdRng) -> Result<Self, SimError> {
        let factory = FirmRegistry::default().resolve(&config.firm_type)?;
        let mut sector = Sector {
            firms: Vec::with_capacity(config.n_firms),
            factory,
            next_id: 0,
            regeneration: BTreeMap::new(),
            shuffle: config.shuffle,
        };
        sector.create_firms(config.n_firms, config.initial_machines, 0, config, rng)?;
        Ok(sector)
    }

    pub fn firms(&self) -> &[Firm] {
        &self.firms
    }

    pub fn firm_mut(&mut self, index: usize) -> &mut Firm {
        &mut self.firms[index]
    }

    pub fn len(&self) -> usize {
        self.firms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.firms.is_empty()
    }

    /// Pending regenerations, by period.
    pub fn regeneration_schedule(&self) -> &BTreeMap<u64, usize> {
        &self.regeneration
    }

    /// Snapshot of the firms taking part in `phase`, shuffled if configured.
    pub fn order(&self, phase: Phase, rng: &mut StdRng) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.firms.len())
            .filter(|&i| phase.includes_bankrupt() || !self.firms[i].is_bankrupt())
            .collect();
        if self.shuffle {
            order.shuffle(rng);
        }
        order
    }

    pub fn create_firms(
        &mut self,
        count: usize,
        machines: u32,
        period: u64,
        config: &Config,
        rng: &mut StdRng,
    ) -> Result<(), SimError> {
        for _ in 0..count {
            let seed = FirmSeed {
                id: FirmId(self.next_id),
                period,
                machines,
            };
            self.next_id += 1;
            self.firms.push((self.factory)(seed, config, rng)?);
        }
        Ok(())
    }

    /// Create the firms scheduled for `period`. Returns how many.
    pub fn regenerate(&mut self, period: u64, config: &Config, rng: &mut StdRng) -> Result<usize, SimError> {
        let count = self.regeneration.remove(&period).unwrap_or(0);
        if count > 0 {
            self.create_firms(count, 0, period, config, rng)?;
            info!(period, count, "firms regenerated");
        }
        Ok(count)
    }

    /// Apply a scenario event. Returns the number of firms created.
    pub fn apply_event(
        &mut self,
        event: &SectorEvent,
        period: u64,
        config: &Config,
        rng: &mut StdRng,
    ) -> Result<usize, SimError> {
        match *event {
            SectorEvent::CreateFirms { count } => {
                self.create_firms(count, 0, period, config, rng)?;
                info!(period, count, "firms created by event");
                Ok(count)
            }
            SectorEvent::SetTargetDebtRatio { value } => {
                for firm in self.firms.iter_mut() {
                    firm.set_target_debt_ratio(value);
                }
                info!(period, value, "target debt ratio imposed");
                Ok(0)
            }
        }
    }

    /// Schedule `count` replacements, each after its own random delay.
    pub fn schedule_regeneration(&mut self, period: u64, count: usize, config: &Config, rng: &mut StdRng) {
        for _ in 0..count {
            let delay = rng.gen_range(config.regeneration_delay_min..=config.regeneration_delay_max);
            *self.regeneration.entry(period + delay).or_insert(0) += 1;
        }
    }

    /// Drop written-off firms and schedule their replacements.
    pub fn remove_liquidated(&mut self, period: u64, config: &Config, rng: &mut StdRng) -> usize {
        let before = self.firms.len();
        self.firms.retain(|f| !f.is_liquidated());
        let removed = before - self.firms.len();
        if removed > 0 {
            self.schedule_regeneration(period, removed, config, rng);
            info!(period, removed, "liquidated firms removed");
        }
        removed
    }

    fn index_of(&self, id: FirmId) -> Option<usize> {
        self.firms.iter().position(|f| f.id() == id)
    }

    // ─── Market access ──────────────────────────────────────────────────────

    pub fn peers(&self) -> Vec<PeerView> {
        self.firms
            .iter()
            .filter(|f| !f.is_bankrupt())
            .map(Firm::peer_view)
            .collect()
    }

    /// Open supplies, optionally leaving one firm out.
    pub fn supply_quotes(&self, exclude: Option<FirmId>) -> Vec<SupplyQuote> {
        self.firms
            .iter()
            .filter(|f| Some(f.id()) != exclude && !f.is_bankrupt())
            .filter_map(Firm::supply_quote)
            .collect()
    }

    pub fn job_offer_quotes(&self) -> Vec<JobOfferQuote> {
        self.firms
            .iter()
            .filter(|f| !f.is_bankrupt())
            .filter_map(Firm::job_offer_quote)
            .collect()
    }

    pub fn sell(&mut self, supplier: FirmId, period: u64, volume: u64, cheque: Cheque) -> Result<Goods, SimError> {
        let index = self.index_of(supplier).ok_or(MarketError::NoSupply(supplier))?;
        if cheque.drawer() == AgentRef::Firm(supplier) {
            return Err(MarketError::SelfPurchase(supplier).into());
        }
        self.firms[index].sell(period, volume, cheque)
    }

    pub fn hire(
        &mut self,
        employer: FirmId,
        worker: HouseholdId,
        period: u64,
        rng: &mut StdRng,
    ) -> Result<Option<JobContract>, SimError> {
        let index = self.index_of(employer).ok_or(MarketError::NoVacancy(employer))?;
        self.firms[index].hire(worker, period, rng)
    }

    /// Let the firm at `index` size an investment and buy the inputs from
    /// the cheapest sampled supplies. Returns the machines installed.
    pub fn invest(
        &mut self,
        index: usize,
        period: u64,
        config: &Config,
        rng: &mut StdRng,
    ) -> Result<u32, SimError> {
        let buyer = self.firms[index].id();
        let quotes = cheapest(
            &self.supply_quotes(Some(buyer)),
            config.investment_search_size,
            rng,
        );
        let plan = self.firms[index].plan_investment(
            &quotes,
            config.interest_rate,
            config.machine_horizon(),
            config.long_term_loan_periods,
        )?;
        let Some(plan) = plan else {
            return Ok(0);
        };

        let mut paid = 0;
        for order in &plan.orders {
            let amount = order.amount();
            let cheque = self.firms[index].pay_supplier(order.supplier, amount)?;
            self.sell(order.supplier, period, order.volume, cheque)?;
            paid += amount;
        }
        self.firms[index].install_machines(plan.machines, paid, rng)?;
        debug!(firm = %buyer, machines = plan.machines, paid, "machines installed");
        Ok(plan.machines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn config() -> Config {
        Config {
            n_firms: 4,
            regeneration_delay_min: 2,
            regeneration_delay_max: 5,
            ..Config::default()
        }
    }

    #[test]
    fn registry_resolves_known_types_only() {
        let registry = FirmRegistry::default();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["basic", "wage_copy"]);
        assert!(registry.resolve("basic").is_ok());
        assert!(matches!(
            registry.resolve("hybrid"),
            Err(SimError::UnknownFirmType(name)) if name == "hybrid"
        ));
    }

    #[test]
    fn unknown_firm_type_fails_at_setup() {
        let config = Config {
            firm_type: "reflective".to_string(),
            ..config()
        };
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            Sector::new(&config, &mut rng),
            Err(SimError::UnknownFirmType(_))
        ));
    }

    #[test]
    fn first_generation_gets_fresh_ids_and_machines() {
        let config = config();
        let mut rng = StdRng::seed_from_u64(0);
        let sector = Sector::new(&config, &mut rng).unwrap();
        let ids: Vec<u64> = sector.firms().iter().map(|f| f.id().0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert!(sector
            .firms()
            .iter()
            .all(|f| f.factory().capacity() == config.initial_machines));
    }

    #[test]
    fn order_is_a_permutation() {
        let config = config();
        let mut rng = StdRng::seed_from_u64(0);
        let sector = Sector::new(&config, &mut rng).unwrap();
        let mut order = sector.order(Phase::Production, &mut rng);
        order.sort_unstable();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn regeneration_creates_exactly_the_scheduled_count() {
        let config = config();
        let mut rng = StdRng::seed_from_u64(0);
        let mut sector = Sector::new(&config, &mut rng).unwrap();
        sector.schedule_regeneration(10, 3, &config, &mut rng);
        let scheduled: usize = sector.regeneration_schedule().values().sum();
        assert_eq!(scheduled, 3);
        assert!(sector
            .regeneration_schedule()
            .keys()
            .all(|&p| (12..=15).contains(&p)));

        let mut created = 0;
        for period in 11..=15 {
            created += sector.regenerate(period, &config, &mut rng).unwrap();
        }
        assert_eq!(created, 3);
        assert_eq!(sector.len(), 7);
        assert!(sector.regeneration_schedule().is_empty());
        assert!(sector.firms()[4..].iter().all(|f| f.factory().capacity() == 0));
        assert_eq!(sector.firms()[6].id(), FirmId(6));
    }

    #[test]
    fn events_create_firms_and_set_leverage() {
        let config = config();
        let mut rng = StdRng::seed_from_u64(0);
        let mut sector = Sector::new(&config, &mut rng).unwrap();
        let created = sector
            .apply_event(&SectorEvent::CreateFirms { count: 2 }, 3, &config, &mut rng)
            .unwrap();
        assert_eq!(created, 2);
        assert_eq!(sector.len(), 6);
        sector
            .apply_event(&SectorEvent::SetTargetDebtRatio { value: 0.25 }, 3, &config, &mut rng)
            .unwrap();
        assert!(sector.firms().iter().all(|f| f.target_debt_ratio() == 0.25));
    }

    #[test]
    fn unknown_supplier_is_rejected() {
        let config = config();
        let mut rng = StdRng::seed_from_u64(0);
        let mut sector = Sector::new(&config, &mut rng).unwrap();
        let mut account = crate::agents::Account::new(crate::agents::AgentRef::Bank);
        account.endow(10);
        let cheque = account
            .issue_cheque(crate::agents::AgentRef::Firm(FirmId(99)), 10, 0)
            .unwrap();
        assert!(matches!(
            sector.sell(FirmId(99), 0, 1, cheque),
            Err(SimError::Market(MarketError::NoSupply(FirmId(99))))
        ));
    }

    #[test]
    fn firm_cannot_buy_its_own_supply() {
        let config = config();
        let mut rng = StdRng::seed_from_u64(0);
        let mut sector = Sector::new(&config, &mut rng).unwrap();
        let mut account = crate::agents::Account::new(AgentRef::Firm(FirmId(0)));
        account.endow(10);
        let cheque = account.issue_cheque(AgentRef::Firm(FirmId(0)), 10, 0).unwrap();
        assert!(matches!(
            sector.sell(FirmId(0), 0, 1, cheque),
            Err(SimError::Market(MarketError::SelfPurchase(FirmId(0))))
        ));
    }
}
