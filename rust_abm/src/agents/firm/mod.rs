pub mod capital;
pub mod factory;
pub mod investment;
pub mod memory;
pub mod pricing;
pub mod production;
pub mod sales;
pub mod workforce;

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::agents::{Account, AgentRef, Cheque, DebtService, FirmId, HouseholdId};
use crate::config::Config;
use crate::error::SimError;
use crate::markets::{Goods, JobContract, JobOfferQuote, ShareholderPool, SupplyQuote};

use capital::{CapitalManager, Solvency};
use factory::Factory;
use investment::{machine_price_list, purchase_orders, InvestmentPlan, InvestmentProblem};
use pricing::{PricingManager, SalesFeedback};
use production::ProductionManager;
use sales::SalesManager;
use workforce::WorkforceManager;

// ─────────────────────────────────────────────────────────────────────────────
// Strategy, construction and peer snapshots
// ─────────────────────────────────────────────────────────────────────────────

/// How a firm sets its wage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WageRule {
    /// Bracketed adjustment driven by the vacancy rate.
    Tatonnement,
    /// Copy the wage of a randomly drawn larger firm; falls back to
    /// tâtonnement when no firm is larger.
    CopyLargerPeer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FirmStrategy {
    pub wage_rule: WageRule,
}

impl FirmStrategy {
    pub fn basic() -> Self {
        FirmStrategy {
            wage_rule: WageRule::Tatonnement,
        }
    }

    pub fn wage_copy() -> Self {
        FirmStrategy {
            wage_rule: WageRule::CopyLargerPeer,
        }
    }
}

/// What the sector decides about a firm it is about to create.
#[derive(Clone, Copy, Debug)]
pub struct FirmSeed {
    pub id: FirmId,
    pub period: u64,
    pub machines: u32,
}

/// What other firms can see of a firm when they imitate it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeerView {
    pub id: FirmId,
    pub wage: f64,
    pub target_debt_ratio: f64,
    pub markup: f64,
    pub workforce: usize,
}

/// Per-period report of a firm, keyed by series name.
#[derive(Clone, Debug, Default)]
pub struct Dataset(BTreeMap<&'static str, f64>);

impl Dataset {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn insert(&mut self, key: &'static str, value: f64) {
        self.0.insert(key, value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Flows that change capital within one period.
#[derive(Clone, Copy, Debug, Default)]
struct PeriodLedger {
    capital_start: i64,
    interest_paid: i64,
    dividends: i64,
    write_offs: i64,
    canceled_debt: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Firm
// ─────────────────────────────────────────────────────────────────────────────

/// A firm: one account, one factory and the managers that run them.
///
/// Every period goes `open → service_debt → pay_dividend → plan_production →
/// production → plan_investment → close`; `hire` and `sell` are called by
/// the markets in between. `close` checks that capital moved only by
/// gross profit, dividends, interest, write-offs and cancelled debt.
#[derive(Clone, Debug)]
pub struct Firm {
    id: FirmId,
    created: u64,
    strategy: FirmStrategy,
    account: Account,
    factory: Factory,
    capital_manager: CapitalManager,
    pricing: PricingManager,
    production: ProductionManager,
    workforce: WorkforceManager,
    sales: SalesManager,

    machine_input_volume: u64,
    machine_lifetime: (u32, u32),
    investment_limit: usize,
    normal_inventory: f64,

    is_open: bool,
    last_opened: Option<u64>,
    bankrupt: bool,
    liquidated: bool,
    period: u64,
    ledger: PeriodLedger,
    investment_size: u32,
    dataset: Dataset,
}

impl Firm {
    pub fn new(
        seed: FirmSeed,
        strategy: FirmStrategy,
        config: &Config,
        rng: &mut StdRng,
    ) -> Result<Self, SimError> {
        let id = seed.id;
        let mut account = Account::new(AgentRef::Firm(id));
        if config.initial_loan > 0 {
            account.borrow(config.initial_loan, config.long_term_loan_periods, true)?;
        }

        let lifetime = (config.machine_lifetime_min, config.machine_lifetime_max);
        let mut factory = Factory::new(config.machine_productivity, config.production_time);
        if seed.machines > 0 {
            let unit_cost = config.initial_wage / config.machine_productivity as f64;
            let machine_value = (config.machine_input_volume as f64
                * unit_cost
                * (1.0 + config.initial_markup))
                .round() as i64;
            let lifetimes: Vec<u32> = (0..seed.machines)
                .map(|_| rng.gen_range(lifetime.0..=lifetime.1))
                .collect();
            factory.add_machines(seed.machines, machine_value * seed.machines as i64, lifetimes);
        }

        let target_debt_ratio =
            rng.gen_range(config.target_debt_ratio_min..=config.target_debt_ratio_max);

        Ok(Firm {
            id,
            created: seed.period,
            strategy,
            account,
            factory,
            capital_manager: CapitalManager::new(id, target_debt_ratio, config),
            pricing: PricingManager::new(config.initial_markup, config.price_flexibility),
            production: ProductionManager::new(
                config.initial_utilization,
                config.normal_utilization,
                config.utilization_flexibility,
            ),
            workforce: WorkforceManager::new(id, config),
            sales: SalesManager::new(
                id,
                config.propensity_to_sell,
                config.selling_capacity,
                config.profit_memory,
            ),
            machine_input_volume: config.machine_input_volume,
            machine_lifetime: lifetime,
            investment_limit: config.investment_max_machines,
            normal_inventory: config.normal_inventory,
            is_open: false,
            last_opened: None,
            bankrupt: false,
            liquidated: false,
            period: seed.period,
            ledger: PeriodLedger::default(),
            investment_size: 0,
            dataset: Dataset::default(),
        })
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn id(&self) -> FirmId {
        self.id
    }

    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn is_bankrupt(&self) -> bool {
        self.bankrupt
    }

    /// Written off and waiting to be removed from the sector.
    pub fn is_liquidated(&self) -> bool {
        self.liquidated
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    pub fn price(&self) -> Option<f64> {
        self.pricing.price()
    }

    pub fn wage(&self) -> f64 {
        self.workforce.wage()
    }

    pub fn workforce(&self) -> usize {
        self.workforce.workforce()
    }

    pub fn target_debt_ratio(&self) -> f64 {
        self.capital_manager.target_debt_ratio()
    }

    pub fn investment_size(&self) -> u32 {
        self.investment_size
    }

    /// Dataset published at the last `close`.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn assets(&self) -> i64 {
        self.factory.value() + self.account.amount()
    }

    pub fn capital(&self) -> i64 {
        self.assets() - self.account.debt()
    }

    pub fn capital_target(&self) -> i64 {
        self.capital_manager.capital_target(self.assets())
    }

    pub fn peer_view(&self) -> PeerView {
        PeerView {
            id: self.id,
            wage: self.workforce.wage(),
            target_debt_ratio: self.capital_manager.target_debt_ratio(),
            markup: self.pricing.markup(),
            workforce: self.workforce.workforce(),
        }
    }

    pub fn supply_quote(&self) -> Option<SupplyQuote> {
        self.sales.quote()
    }

    pub fn job_offer_quote(&self) -> Option<JobOfferQuote> {
        self.workforce
            .offer()
            .filter(|o| o.vacancies() > 0)
            .map(|o| JobOfferQuote {
                employer: self.id,
                wage: o.wage(),
            })
    }

    pub fn set_target_debt_ratio(&mut self, ratio: f64) {
        self.capital_manager.set_target_debt_ratio(ratio);
    }

    /// Finished stock relative to `normal_inventory` periods of full output.
    fn inventory_ratio(&self) -> f64 {
        let inventory = self.factory.finished().volume as f64;
        let normal = self.normal_inventory * self.factory.max_output() as f64;
        if normal > 0.0 {
            inventory / normal
        } else if inventory > 0.0 {
            f64::INFINITY
        } else {
            1.0
        }
    }

    fn ensure_operating(&self) -> Result<(), SimError> {
        if !self.is_open {
            return Err(SimError::NotOpen { firm: self.id });
        }
        if self.bankrupt {
            return Err(SimError::OperatingWhileBankrupt {
                firm: self.id,
                period: self.period,
            });
        }
        Ok(())
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────────

    /// Open the period. Returns the workers released (expired contracts, or
    /// everyone if the firm is being written off).
    pub fn open<P>(
        &mut self,
        period: u64,
        rate: f64,
        pool: &P,
        rng: &mut StdRng,
    ) -> Result<Vec<HouseholdId>, SimError>
    where
        P: ShareholderPool + ?Sized,
    {
        if self.is_open || self.last_opened.is_some_and(|last| period <= last) {
            return Err(SimError::AlreadyOpen {
                firm: self.id,
                period,
            });
        }
        self.is_open = true;
        self.last_opened = Some(period);
        self.period = period;
        self.investment_size = 0;
        self.ledger = PeriodLedger {
            capital_start: self.capital(),
            ..PeriodLedger::default()
        };
        self.account.open(rate);
        self.sales.open();
        self.workforce.open();

        if self.bankrupt {
            return Ok(self.write_off(pool, rng));
        }
        self.ledger.write_offs += self.factory.open();
        let capital = self.capital();
        self.capital_manager.seed_ownership(pool, capital, rng);
        Ok(self.workforce.expire(period))
    }

    fn write_off<P>(&mut self, pool: &P, rng: &mut StdRng) -> Vec<HouseholdId>
    where
        P: ShareholderPool + ?Sized,
    {
        let lost = self.factory.liquidate();
        self.ledger.write_offs += lost;
        let excess = self.account.debt() - self.account.amount();
        if excess > 0 {
            self.ledger.canceled_debt += self.account.cancel_debt(excess);
        }
        self.account.repay_all();
        let released = self.workforce.layoff_all();
        self.capital_manager.clear_ownership(pool, 0, rng);
        self.liquidated = true;
        info!(
            firm = %self.id,
            period = self.period,
            lost,
            canceled_debt = self.ledger.canceled_debt,
            "firm liquidated"
        );
        released
    }

    /// Pay interest and the principal falling due.
    pub fn service_debt(&mut self, short_term: u32) -> Result<DebtService, SimError> {
        self.ensure_operating()?;
        let service = self.account.service_debt(short_term)?;
        self.ledger.interest_paid += service.interest_paid;
        Ok(service)
    }

    pub fn pay_dividend(&mut self) -> Result<Vec<Cheque>, SimError> {
        self.ensure_operating()?;
        let capital = self.capital();
        let cheques = self
            .capital_manager
            .pay_dividend(&mut self.account, capital, self.period)?;
        self.ledger.dividends += cheques.iter().map(Cheque::amount).sum::<i64>();
        Ok(cheques)
    }

    /// Update price, utilization target, wage and workforce, then secure
    /// the payroll. Returns the workers laid off.
    pub fn plan_production(
        &mut self,
        peers: &[PeerView],
        short_term: u32,
        rng: &mut StdRng,
    ) -> Result<Vec<HouseholdId>, SimError> {
        self.ensure_operating()?;
        let feedback = SalesFeedback {
            supply_volume: self.sales.last_supply_volume(),
            sales_volume: self.sales.last_sales_volume(),
            inventory_ratio: self.inventory_ratio(),
        };
        let unit_cost = self.factory.unit_cost(self.workforce.wage());
        self.pricing.update(feedback, unit_cost, rng);
        self.production.update(feedback.inventory_ratio, rng);

        match self.strategy.wage_rule {
            WageRule::Tatonnement => self.workforce.update_wage(rng),
            WageRule::CopyLargerPeer => {
                let own = self.workforce.workforce();
                let larger: Vec<&PeerView> = peers
                    .iter()
                    .filter(|p| p.id != self.id && p.workforce > own)
                    .collect();
                match larger.choose(rng) {
                    Some(peer) => self.workforce.set_wage(peer.wage),
                    None => self.workforce.update_wage(rng),
                }
            }
        }

        let laid_off = self.workforce.update_workforce(
            self.factory.capacity(),
            self.production.target(),
            self.period,
        );
        let payroll = self.workforce.payroll_forecast();
        let borrowed = self
            .capital_manager
            .secure_financing(&mut self.account, payroll, short_term)?;
        if borrowed > 0 {
            warn!(firm = %self.id, borrowed, payroll, "payroll financed short-term");
        }
        debug!(
            firm = %self.id,
            price = self.pricing.price().unwrap_or(0.0),
            wage = self.workforce.wage(),
            utilization = self.production.target(),
            manpower_target = self.workforce.manpower_target(),
            "production planned"
        );
        Ok(laid_off)
    }

    pub fn hire(
        &mut self,
        worker: HouseholdId,
        period: u64,
        rng: &mut StdRng,
    ) -> Result<Option<JobContract>, SimError> {
        self.ensure_operating()?;
        Ok(self.workforce.hire(worker, period, rng)?)
    }

    /// Pay the workforce, run the factory and publish the supply. Returns
    /// the wage cheques.
    pub fn production(&mut self) -> Result<Vec<Cheque>, SimError> {
        self.ensure_operating()?;
        let cheques = self.workforce.pay_workers(&mut self.account, self.period)?;
        let payroll: i64 = cheques.iter().map(Cheque::amount).sum();
        let report = self
            .factory
            .process(self.workforce.workforce() as u32, payroll);
        self.ledger.write_offs += report.unabsorbed;
        self.sales.create_supply(
            self.pricing.price(),
            self.factory.finished().volume,
            self.factory.max_output(),
            self.period,
        );
        Ok(cheques)
    }

    pub fn sell(&mut self, period: u64, volume: u64, cheque: Cheque) -> Result<Goods, SimError> {
        self.ensure_operating()?;
        self.sales
            .sell(period, volume, cheque, &mut self.account, &mut self.factory)
    }

    /// Size an investment against `quotes` (cheapest first, own supply
    /// excluded) and borrow long-term whatever cash does not cover.
    pub fn plan_investment(
        &mut self,
        quotes: &[SupplyQuote],
        rate: f64,
        horizon: u32,
        long_term: u32,
    ) -> Result<Option<InvestmentPlan>, SimError> {
        self.ensure_operating()?;
        let capacity = self.factory.capacity();
        if capacity > 0 && self.capital() < self.capital_target() {
            return Ok(None);
        }
        let prices = machine_price_list(quotes, self.machine_input_volume, self.investment_limit);
        if prices.is_empty() {
            return Ok(None);
        }

        let wage = self.workforce.wage();
        let price = self
            .pricing
            .price()
            .unwrap_or_else(|| self.factory.unit_cost(wage) * (1.0 + self.pricing.markup()));
        let demand =
            self.sales.average_sales() * self.production.target() / self.production.normal();
        let problem = InvestmentProblem {
            prices: &prices,
            capacity,
            productivity: self.factory.productivity(),
            demand,
            price,
            wage,
            rate,
            horizon,
        };
        let mut size = problem.optimum_size();
        if capacity == 0 {
            size = size.max(1);
        }
        if size == 0 {
            return Ok(None);
        }

        let cost = prices[size - 1];
        let Some(orders) = purchase_orders(quotes, size as u64 * self.machine_input_volume) else {
            return Ok(None);
        };
        let shortfall = cost - self.account.amount();
        if shortfall > 0 {
            self.account.borrow(shortfall, long_term, true)?;
        }
        debug!(firm = %self.id, machines = size, cost, npv = problem.npv(size), "investment planned");
        Ok(Some(InvestmentPlan {
            machines: size as u32,
            orders,
            cost,
        }))
    }

    /// Pay a supplier of investment inputs.
    pub fn pay_supplier(&mut self, supplier: FirmId, amount: i64) -> Result<Cheque, SimError> {
        self.ensure_operating()?;
        Ok(self
            .account
            .issue_cheque(AgentRef::Firm(supplier), amount, self.period)?)
    }

    /// Install machines built from inputs that cost `paid` in total.
    pub fn install_machines(&mut self, count: u32, paid: i64, rng: &mut StdRng) -> Result<(), SimError> {
        self.ensure_operating()?;
        let (min, max) = self.machine_lifetime;
        let lifetimes: Vec<u32> = (0..count).map(|_| rng.gen_range(min..=max)).collect();
        self.factory.add_machines(count, paid, lifetimes);
        self.investment_size += count;
        Ok(())
    }

    /// Close the period: solvency check, capital identity, dataset.
    pub fn close(&mut self, peers: &[PeerView], rng: &mut StdRng) -> Result<(), SimError> {
        if !self.is_open {
            return Err(SimError::NotOpen { firm: self.id });
        }
        let gross_profit = self.sales.gross_profit();

        if !self.bankrupt {
            let net_profit = gross_profit - self.ledger.interest_paid - self.ledger.write_offs;
            self.capital_manager.record_profit(net_profit);
            let debt = self.account.debt();
            let assets = self.assets();
            match self
                .capital_manager
                .check_solvency(debt, assets, self.factory.capacity())
            {
                Solvency::Solvent => {}
                Solvency::Insolvent { periods } => {
                    debug!(firm = %self.id, periods, debt, assets, "firm insolvent");
                }
                Solvency::CancelDebt { amount } => {
                    let canceled = self.account.cancel_debt(amount);
                    self.ledger.canceled_debt += canceled;
                    info!(firm = %self.id, period = self.period, canceled, "debt cancelled");
                    self.imitate(peers, rng);
                }
                Solvency::Bankrupt => {
                    self.bankrupt = true;
                    info!(firm = %self.id, period = self.period, debt, assets, "firm bankrupt");
                }
            }
        }

        let ledger = self.ledger;
        let expected = ledger.capital_start + gross_profit
            - ledger.dividends
            - ledger.interest_paid
            - ledger.write_offs
            + ledger.canceled_debt;
        let actual = self.capital();
        if expected != actual {
            return Err(SimError::InconsistentCapital {
                firm: self.id,
                period: self.period,
                expected,
                actual,
            });
        }

        self.workforce.close();
        self.sales.close();
        self.dataset = self.export(gross_profit);
        self.is_open = false;
        Ok(())
    }

    /// Copy wage, leverage target and markup from a random peer.
    fn imitate(&mut self, peers: &[PeerView], rng: &mut StdRng) {
        let others: Vec<&PeerView> = peers.iter().filter(|p| p.id != self.id).collect();
        let Some(peer) = others.choose(rng) else {
            return;
        };
        self.workforce.set_wage(peer.wage);
        self.capital_manager.set_target_debt_ratio(peer.target_debt_ratio);
        self.pricing.set_markup(peer.markup);
        self.pricing.reset();
        debug!(firm = %self.id, peer = %peer.id, "imitating peer");
    }

    fn export(&self, gross_profit: i64) -> Dataset {
        let assets = self.assets();
        let debt = self.account.debt();
        let mut data = Dataset::default();
        data.insert("price", self.pricing.price().unwrap_or(0.0));
        data.insert("wage", self.workforce.wage());
        data.insert("capital", self.capital() as f64);
        data.insert("capital_target", self.capital_target() as f64);
        data.insert("cash", self.account.amount() as f64);
        data.insert("debt", debt as f64);
        data.insert(
            "debt_ratio",
            if assets > 0 { debt as f64 / assets as f64 } else { 0.0 },
        );
        data.insert("target_debt_ratio", self.capital_manager.target_debt_ratio());
        data.insert("machines", self.factory.capacity() as f64);
        data.insert("workforce", self.workforce.workforce() as f64);
        data.insert("manpower_target", self.workforce.manpower_target() as f64);
        data.insert("job_openings", self.workforce.job_openings() as f64);
        data.insert("vacancies", self.workforce.vacancies() as f64);
        data.insert("vacancy_rate", self.workforce.vacancy_rate());
        data.insert("utilization_target", self.production.target());
        data.insert("production", self.factory.output() as f64);
        data.insert("inventory", self.factory.finished().volume as f64);
        data.insert("supply", self.sales.supply_volume() as f64);
        data.insert("sales_volume", self.sales.sales_volume() as f64);
        data.insert("sales_value", self.sales.sales_value() as f64);
        data.insert("gross_profit", gross_profit as f64);
        data.insert("dividends", self.ledger.dividends as f64);
        data.insert("interest", self.ledger.interest_paid as f64);
        data.insert("write_offs", self.ledger.write_offs as f64);
        data.insert("canceled_debt", self.ledger.canceled_debt as f64);
        data.insert("investment_size", self.investment_size as f64);
        data.insert("insolvent_periods", self.capital_manager.insolvent_periods() as f64);
        data.insert("divid", if self.capital_manager.dividends_allowed() { 1.0 } else { 0.0 });
        data.insert("bankrupt", if self.bankrupt { 1.0 } else { 0.0 });
        data.insert("age", self.period.saturating_sub(self.created) as f64);
        data.insert("average_profit", self.capital_manager.average_profit());
        data.insert("shareholders", self.capital_manager.ownership().len() as f64);
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markets::goods::payment_for;
    use rand::SeedableRng;

    struct Pool;

    impl ShareholderPool for Pool {
        fn select_capital_owners(&self, n: usize, _rng: &mut StdRng) -> Vec<HouseholdId> {
            (0..n).map(HouseholdId).collect()
        }
    }

    fn firm(config: &Config, machines: u32, rng: &mut StdRng) -> Firm {
        let seed = FirmSeed {
            id: FirmId(1),
            period: 0,
            machines,
        };
        Firm::new(seed, FirmStrategy::basic(), config, rng).unwrap()
    }

    #[test]
    fn capital_identity_holds_through_trading_periods() {
        let config = Config::default();
        let mut rng = StdRng::seed_from_u64(11);
        let mut firm = firm(&config, 4, &mut rng);
        let mut buyer = Account::new(AgentRef::Household(HouseholdId(99)));
        buyer.endow(1_000_000_000);
        let mut next_worker = 0;

        for period in 0..36 {
            firm.open(period, config.interest_rate, &Pool, &mut rng).unwrap();
            firm.service_debt(1).unwrap();
            firm.pay_dividend().unwrap();
            firm.plan_production(&[], 1, &mut rng).unwrap();
            while firm.hire(HouseholdId(next_worker), period, &mut rng).unwrap().is_some() {
                next_worker += 1;
            }
            firm.production().unwrap();
            if let Some(quote) = firm.supply_quote() {
                let volume = (quote.volume * 3 / 4).max(1);
                let cheque = buyer
                    .issue_cheque(AgentRef::Firm(firm.id()), payment_for(quote.price, volume), period)
                    .unwrap();
                firm.sell(period, volume, cheque).unwrap();
            }
            firm.plan_investment(&[], 0.005, 90, 120).unwrap();
            firm.close(&[], &mut rng).unwrap();
            assert!(!firm.dataset().is_empty());
        }
        assert!(firm.dataset().get("sales_value").unwrap() > 0.0);
        assert_eq!(firm.dataset().get("age"), Some(35.0));
        assert_eq!(
            firm.dataset().get("shareholders"),
            Some(config.shareholders_per_firm as f64)
        );
        assert!(firm.dataset().get("average_profit").is_some());
    }

    #[test]
    fn opening_twice_is_fatal() {
        let config = Config::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut firm = firm(&config, 1, &mut rng);
        firm.open(3, 0.0, &Pool, &mut rng).unwrap();
        assert!(matches!(
            firm.open(3, 0.0, &Pool, &mut rng),
            Err(SimError::AlreadyOpen { period: 3, .. })
        ));
    }

    #[test]
    fn reopening_a_past_period_is_fatal() {
        let config = Config::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut firm = firm(&config, 1, &mut rng);
        firm.open(3, 0.0, &Pool, &mut rng).unwrap();
        firm.close(&[], &mut rng).unwrap();
        for period in [3, 1] {
            assert!(matches!(
                firm.open(period, 0.0, &Pool, &mut rng),
                Err(SimError::AlreadyOpen { period: p, .. }) if p == period
            ));
        }
        assert!(!firm.is_open());
        firm.open(4, 0.0, &Pool, &mut rng).unwrap();
    }

    #[test]
    fn closed_firm_cannot_operate() {
        let config = Config::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut firm = firm(&config, 1, &mut rng);
        assert!(matches!(firm.production(), Err(SimError::NotOpen { .. })));
        assert!(matches!(firm.close(&[], &mut rng), Err(SimError::NotOpen { .. })));
    }

    #[test]
    fn bankrupt_firm_is_written_off_and_cannot_operate() {
        let config = Config::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut firm = firm(&config, 3, &mut rng);
        firm.open(0, 0.0, &Pool, &mut rng).unwrap();
        firm.close(&[], &mut rng).unwrap();

        firm.bankrupt = true;
        firm.open(1, 0.0, &Pool, &mut rng).unwrap();
        assert!(firm.is_liquidated());
        assert_eq!(firm.factory().capacity(), 0);
        assert_eq!(firm.account().debt(), 0);
        assert!(matches!(
            firm.service_debt(1),
            Err(SimError::OperatingWhileBankrupt { period: 1, .. })
        ));
        assert!(matches!(
            firm.plan_production(&[], 1, &mut rng),
            Err(SimError::OperatingWhileBankrupt { .. })
        ));
        firm.close(&[], &mut rng).unwrap();
        assert_eq!(firm.dataset().get("bankrupt"), Some(1.0));
        assert_eq!(firm.capital(), 0);
    }

    #[test]
    fn firm_without_capacity_buys_a_first_machine() {
        let config = Config {
            initial_loan: 1000,
            ..Config::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut firm = firm(&config, 0, &mut rng);
        firm.open(0, 0.0, &Pool, &mut rng).unwrap();
        assert_eq!(firm.account().amount(), 1000);

        let quotes = [SupplyQuote {
            supplier: FirmId(2),
            price: 1.5,
            volume: 10_000,
        }];
        let plan = firm.plan_investment(&quotes, 0.005, 90, 120).unwrap().unwrap();
        assert_eq!(plan.machines, 1);
        assert_eq!(plan.cost, 750);
        assert_eq!(plan.orders.len(), 1);
        assert_eq!(plan.orders[0].volume, config.machine_input_volume);

        let cheque = firm.pay_supplier(FirmId(2), plan.cost).unwrap();
        assert_eq!(cheque.payee(), AgentRef::Firm(FirmId(2)));
        firm.install_machines(plan.machines, plan.cost, &mut rng).unwrap();
        firm.close(&[], &mut rng).unwrap();
        assert_eq!(firm.factory().capacity(), 1);
        assert_eq!(firm.dataset().get("investment_size"), Some(1.0));
    }

    #[test]
    fn no_investment_without_supplies() {
        let config = Config::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut firm = firm(&config, 0, &mut rng);
        firm.open(0, 0.0, &Pool, &mut rng).unwrap();
        assert!(firm.plan_investment(&[], 0.005, 90, 120).unwrap().is_none());
    }

    #[test]
    fn prolonged_insolvency_cancels_the_excess_debt_once() {
        let config = Config {
            initial_loan: 0,
            initial_markup: 0.0,
            machine_input_volume: 100,
            ..Config::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut firm = firm(&config, 1, &mut rng);
        assert_eq!(firm.assets(), 1000);
        firm.account.borrow(1500, 120, true).unwrap();
        firm.account.issue_cheque(AgentRef::Bank, 1500, 0).unwrap();

        let peers = [PeerView {
            id: FirmId(2),
            wage: 1200.0,
            target_debt_ratio: 0.4,
            markup: 0.2,
            workforce: 3,
        }];
        let mut cancellations = Vec::new();
        for period in 0..40 {
            firm.open(period, 0.0, &Pool, &mut rng).unwrap();
            firm.close(&peers, &mut rng).unwrap();
            let data = firm.dataset();
            if data.get("canceled_debt").unwrap() > 0.0 {
                cancellations.push(period);
                assert_eq!(data.get("canceled_debt"), Some(500.0));
                assert_eq!(data.get("divid"), Some(0.0));
                assert_eq!(data.get("dividends"), Some(0.0));
            }
        }
        assert_eq!(cancellations, vec![36]);
        assert_eq!(firm.account().debt(), 1000);
        assert!(!firm.is_bankrupt());
        assert_eq!(firm.wage(), 1200.0);
        assert_eq!(firm.target_debt_ratio(), 0.4);
    }

    #[test]
    fn insolvent_firm_without_machines_goes_bankrupt() {
        let config = Config {
            initial_loan: 0,
            ..Config::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut firm = firm(&config, 0, &mut rng);
        firm.account.borrow(100, 120, true).unwrap();
        firm.account.issue_cheque(AgentRef::Bank, 100, 0).unwrap();
        for period in 0..=config.patience as u64 {
            firm.open(period, 0.0, &Pool, &mut rng).unwrap();
            firm.close(&[], &mut rng).unwrap();
        }
        assert!(firm.is_bankrupt());
        assert!(!firm.is_liquidated());
        firm.open(config.patience as u64 + 1, 0.0, &Pool, &mut rng).unwrap();
        assert!(firm.is_liquidated());
        assert_eq!(firm.account().debt(), 0);
        firm.close(&[], &mut rng).unwrap();
    }

    #[test]
    fn wage_copy_follows_a_larger_peer() {
        let config = Config::default();
        let mut rng = StdRng::seed_from_u64(1);
        let seed = FirmSeed {
            id: FirmId(1),
            period: 0,
            machines: 2,
        };
        let mut firm = Firm::new(seed, FirmStrategy::wage_copy(), &config, &mut rng).unwrap();
        let peers = [
            PeerView {
                id: FirmId(2),
                wage: 1500.0,
                target_debt_ratio: 0.5,
                markup: 0.1,
                workforce: 8,
            },
            PeerView {
                id: FirmId(1),
                wage: 1.0,
                target_debt_ratio: 0.5,
                markup: 0.1,
                workforce: 100,
            },
        ];
        firm.open(0, 0.0, &Pool, &mut rng).unwrap();
        firm.plan_production(&peers, 1, &mut rng).unwrap();
        assert_eq!(firm.wage(), 1500.0);
        assert_eq!(firm.job_offer_quote().unwrap().wage, 1500);
    }

    #[test]
    fn payroll_is_financed_before_production() {
        let config = Config {
            initial_loan: 0,
            ..Config::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut firm = firm(&config, 5, &mut rng);
        firm.open(0, 0.0, &Pool, &mut rng).unwrap();
        firm.plan_production(&[], 1, &mut rng).unwrap();
        let forecast = firm.workforce.payroll_forecast();
        assert!(forecast > 0);
        assert_eq!(firm.account().amount(), forecast);
        assert_eq!(firm.account().short_term_debt(), forecast);
    }
}
