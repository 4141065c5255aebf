use crate::agents::FirmId;
use crate::markets::goods::payment_for;
use crate::markets::SupplyQuote;

/// Goods to buy from one supplier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PurchaseOrder {
    pub supplier: FirmId,
    pub price: f64,
    pub volume: u64,
}

impl PurchaseOrder {
    pub fn amount(&self) -> i64 {
        payment_for(self.price, self.volume)
    }
}

/// A sized investment, ready to be executed against the goods market.
#[derive(Clone, Debug, PartialEq)]
pub struct InvestmentPlan {
    pub machines: u32,
    pub orders: Vec<PurchaseOrder>,
    pub cost: i64,
}

/// Buy `volume` units walking up `quotes` (cheapest first).
///
/// Takes whose payment would round to zero are skipped. `None` when the
/// quotes cannot cover the volume.
pub fn purchase_orders(quotes: &[SupplyQuote], volume: u64) -> Option<Vec<PurchaseOrder>> {
    let mut orders = Vec::new();
    let mut missing = volume;
    for quote in quotes {
        if missing == 0 {
            break;
        }
        let take = quote.volume.min(missing);
        if take == 0 || payment_for(quote.price, take) <= 0 {
            continue;
        }
        orders.push(PurchaseOrder {
            supplier: quote.supplier,
            price: quote.price,
            volume: take,
        });
        missing -= take;
    }
    (missing == 0).then_some(orders)
}

/// Entry `k - 1` is the cost of the inputs for `k` machines.
///
/// The list stops at `limit` machines or when the quotes run dry.
pub fn machine_price_list(quotes: &[SupplyQuote], input_volume: u64, limit: usize) -> Vec<i64> {
    let mut prices = Vec::new();
    for k in 1..=limit as u64 {
        match purchase_orders(quotes, k * input_volume) {
            Some(orders) => prices.push(orders.iter().map(PurchaseOrder::amount).sum()),
            None => break,
        }
    }
    prices
}

/// Discounted cash-flow comparison of candidate capacity expansions.
#[derive(Clone, Debug)]
pub struct InvestmentProblem<'a> {
    pub prices: &'a [i64],
    pub capacity: u32,
    pub productivity: u64,
    /// Expected sales volume per period.
    pub demand: f64,
    pub price: f64,
    pub wage: f64,
    pub rate: f64,
    pub horizon: u32,
}

impl InvestmentProblem<'_> {
    /// Operating margin per period with `machines` installed.
    fn cash_flow(&self, machines: u32) -> f64 {
        let productivity = self.productivity as f64;
        let operated = (machines as f64).min(self.demand.max(0.0) / productivity);
        operated * (productivity * self.price - self.wage)
    }

    /// Present value of one money unit per period over the horizon.
    fn annuity(&self) -> f64 {
        let horizon = self.horizon as f64;
        if self.rate <= 0.0 {
            horizon
        } else {
            (1.0 - (1.0 + self.rate).powf(-horizon)) / self.rate
        }
    }

    /// Net present value of buying `k` more machines.
    pub fn npv(&self, k: usize) -> f64 {
        if k == 0 || k > self.prices.len() {
            return 0.0;
        }
        let gain = self.cash_flow(self.capacity + k as u32) - self.cash_flow(self.capacity);
        gain * self.annuity() - self.prices[k - 1] as f64
    }

    /// Grow `k` while the NPV strictly improves.
    pub fn optimum_size(&self) -> usize {
        let mut best = 0;
        let mut best_npv = 0.0;
        for k in 1..=self.prices.len() {
            let npv = self.npv(k);
            if npv <= best_npv {
                break;
            }
            best = k;
            best_npv = npv;
        }
        best
    }
}
