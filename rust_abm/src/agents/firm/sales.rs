use crate::agents::{Account, Cheque, FirmId};
use crate::error::SimError;
use crate::markets::{Goods, MarketError, Supply, SupplyQuote};

use super::factory::Factory;
use super::memory::Trailing;

/// Publishes the period's supply and books the sales made against it.
#[derive(Clone, Debug)]
pub struct SalesManager {
    supplier: FirmId,
    propensity: f64,
    selling_capacity: f64,
    supply: Option<Supply>,
    sales_volume: u64,
    sales_value: i64,
    cost_of_goods_sold: i64,
    last_supply_volume: u64,
    last_sales_volume: u64,
    memory: Trailing,
}

impl SalesManager {
    pub fn new(supplier: FirmId, propensity: f64, selling_capacity: f64, memory: usize) -> Self {
        SalesManager {
            supplier,
            propensity,
            selling_capacity,
            supply: None,
            sales_volume: 0,
            sales_value: 0,
            cost_of_goods_sold: 0,
            last_supply_volume: 0,
            last_sales_volume: 0,
            memory: Trailing::new(memory),
        }
    }

    pub fn supply(&self) -> Option<&Supply> {
        self.supply.as_ref()
    }

    /// Quote for buyers, if anything is left on offer.
    pub fn quote(&self) -> Option<SupplyQuote> {
        self.supply
            .as_ref()
            .filter(|s| s.remaining() > 0)
            .map(Supply::quote)
    }

    pub fn supply_volume(&self) -> u64 {
        self.supply.as_ref().map_or(0, Supply::initial_volume)
    }

    pub fn sales_volume(&self) -> u64 {
        self.sales_volume
    }

    pub fn sales_value(&self) -> i64 {
        self.sales_value
    }

    pub fn gross_profit(&self) -> i64 {
        self.sales_value - self.cost_of_goods_sold
    }

    pub fn last_supply_volume(&self) -> u64 {
        self.last_supply_volume
    }

    pub fn last_sales_volume(&self) -> u64 {
        self.last_sales_volume
    }

    /// Average sales volume over the remembered periods.
    pub fn average_sales(&self) -> f64 {
        self.memory.mean()
    }

    pub fn open(&mut self) {
        self.supply = None;
        self.sales_volume = 0;
        self.sales_value = 0;
        self.cost_of_goods_sold = 0;
    }

    /// Offer part of the finished stock at `price`.
    pub fn create_supply(&mut self, price: Option<f64>, finished: u64, max_output: u64, period: u64) {
        let by_stock = (self.propensity * finished as f64).floor() as u64;
        let by_capacity = (self.selling_capacity * max_output as f64).floor() as u64;
        let volume = by_stock.min(by_capacity);
        self.supply = match price {
            Some(price) if volume > 0 => Some(Supply::new(self.supplier, price, volume, period)),
            _ => None,
        };
    }

    pub fn sell(
        &mut self,
        period: u64,
        volume: u64,
        cheque: Cheque,
        account: &mut Account,
        factory: &mut Factory,
    ) -> Result<Goods, SimError> {
        let supply = self
            .supply
            .as_mut()
            .ok_or(MarketError::NoSupply(self.supplier))?;
        let paid = cheque.amount();
        supply.take(period, volume, paid)?;
        account.deposit(cheque, period)?;
        let goods = factory.release(volume)?;
        self.sales_volume += volume;
        self.sales_value += paid;
        self.cost_of_goods_sold += goods.value;
        Ok(goods)
    }

    pub fn close(&mut self) {
        self.last_supply_volume = self.supply_volume();
        self.last_sales_volume = self.sales_volume;
        self.memory.push(self.sales_volume as f64);
    }
}
