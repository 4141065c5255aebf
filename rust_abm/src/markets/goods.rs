use rand::seq::SliceRandom;
use rand::rngs::StdRng;
use tracing::debug;

use crate::agents::{AgentRef, FirmId};
use crate::error::SimError;
use crate::markets::MarketError;
use crate::state::EconomyState;

/// A quantity of goods together with its book value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Goods {
    pub volume: u64,
    pub value: i64,
}

/// Amount owed for `volume` units at `price`, rounded to the money unit.
pub fn payment_for(price: f64, volume: u64) -> i64 {
    (price * volume as f64).round() as i64
}

// ─────────────────────────────────────────────────────────────────────────────
// Supply
// ─────────────────────────────────────────────────────────────────────────────

/// Goods a firm offers for sale during one period.
#[derive(Clone, Debug)]
pub struct Supply {
    supplier: FirmId,
    price: f64,
    initial: u64,
    remaining: u64,
    period: u64,
}

impl Supply {
    pub fn new(supplier: FirmId, price: f64, volume: u64, period: u64) -> Self {
        Supply {
            supplier,
            price,
            initial: volume,
            remaining: volume,
            period,
        }
    }

    pub fn supplier(&self) -> FirmId {
        self.supplier
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn initial_volume(&self) -> u64 {
        self.initial
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    pub fn cost(&self, volume: u64) -> i64 {
        payment_for(self.price, volume)
    }

    /// Take `volume` units off the supply against a payment of `paid`.
    ///
    /// The payment may differ from `price × volume` by at most one money unit.
    pub fn take(&mut self, period: u64, volume: u64, paid: i64) -> Result<(), MarketError> {
        if period != self.period {
            return Err(MarketError::ExpiredOffer {
                issued: self.period,
                period,
            });
        }
        if volume == 0 {
            return Err(MarketError::EmptyPurchase);
        }
        if volume > self.remaining {
            return Err(MarketError::SupplyExhausted {
                supplier: self.supplier,
                remaining: self.remaining,
                requested: volume,
            });
        }
        let expected = self.cost(volume);
        if (paid - expected).abs() > 1 {
            return Err(MarketError::PaymentMismatch { paid, expected });
        }
        self.remaining -= volume;
        Ok(())
    }

    pub fn quote(&self) -> SupplyQuote {
        SupplyQuote {
            supplier: self.supplier,
            price: self.price,
            volume: self.remaining,
        }
    }
}

/// Snapshot of a supply as seen by a prospective buyer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SupplyQuote {
    pub supplier: FirmId,
    pub price: f64,
    pub volume: u64,
}

/// Draw up to `n` quotes and sort them from cheapest to dearest.
pub fn cheapest(quotes: &[SupplyQuote], n: usize, rng: &mut StdRng) -> Vec<SupplyQuote> {
    let mut sample: Vec<SupplyQuote> = quotes.choose_multiple(rng, n).copied().collect();
    sample.sort_by(|a, b| a.price.total_cmp(&b.price));
    sample
}

/// Largest purchase from a quote that fits the budget, with its payment.
///
/// `None` when nothing can be bought or the payment would round to zero.
pub fn affordable(price: f64, available: u64, budget: i64) -> Option<(u64, i64)> {
    if budget <= 0 || price <= 0.0 {
        return None;
    }
    let mut volume = available.min((budget as f64 / price).floor() as u64);
    while volume > 0 && payment_for(price, volume) > budget {
        volume -= 1;
    }
    let amount = payment_for(price, volume);
    (volume > 0 && amount > 0).then_some((volume, amount))
}

// ─────────────────────────────────────────────────────────────────────────────
// Consumption
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of household consumption for one period.
#[derive(Clone, Debug, Default)]
pub struct GoodsOutcome {
    pub volume: u64,
    pub value: i64,
    pub buyers: usize,
}

/// Households spend their consumption budget on the period's supplies.
///
/// Each household, in shuffled order, samples a handful of supplies, sorts
/// them by price and buys from the cheapest first until its budget or the
/// sampled supplies run out.
pub fn run_consumption(state: &mut EconomyState) -> Result<GoodsOutcome, SimError> {
    let period = state.current_period;
    let sample_size = state.config.supply_search_size;

    let mut order: Vec<usize> = (0..state.households.len()).collect();
    order.shuffle(&mut state.rng);

    let mut outcome = GoodsOutcome::default();
    for hh_idx in order {
        let mut budget = state.households[hh_idx].consumption_budget();
        if budget <= 0 {
            continue;
        }
        let quotes = state.sector.supply_quotes(None);
        if quotes.is_empty() {
            break;
        }

        let mut bought = false;
        for quote in cheapest(&quotes, sample_size, &mut state.rng) {
            let Some((volume, amount)) = affordable(quote.price, quote.volume, budget) else {
                continue;
            };
            let cheque = state.households[hh_idx].account.issue_cheque(
                AgentRef::Firm(quote.supplier),
                amount,
                period,
            )?;
            let goods = state.sector.sell(quote.supplier, period, volume, cheque)?;
            budget -= amount;
            outcome.volume += goods.volume;
            outcome.value += amount;
            bought = true;
            if budget <= 0 {
                break;
            }
        }
        if bought {
            outcome.buyers += 1;
        }
    }

    debug!(period, volume = outcome.volume, value = outcome.value, "consumption done");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn two_purchases_exhaust_the_supply() {
        let mut supply = Supply::new(FirmId(1), 5.0, 100, 3);
        supply.take(3, 40, 200).unwrap();
        supply.take(3, 60, 300).unwrap();
        assert_eq!(supply.remaining(), 0);
        for volume in [1, 10] {
            assert!(matches!(
                supply.take(3, volume, payment_for(5.0, volume)),
                Err(MarketError::SupplyExhausted { .. })
            ));
        }
    }

    #[test]
    fn supply_is_valid_only_in_its_period() {
        let mut supply = Supply::new(FirmId(1), 5.0, 100, 3);
        assert_eq!(
            supply.take(4, 1, 5),
            Err(MarketError::ExpiredOffer { issued: 3, period: 4 })
        );
        assert_eq!(supply.remaining(), 100);
    }

    #[test]
    fn payment_must_match_within_one_unit() {
        let mut supply = Supply::new(FirmId(1), 2.5, 100, 0);
        // 3 × 2.5 = 7.5 rounds to 8; 7 is within tolerance, 6 is not.
        supply.take(0, 3, 7).unwrap();
        assert_eq!(
            supply.take(0, 3, 6),
            Err(MarketError::PaymentMismatch { paid: 6, expected: 8 })
        );
        assert_eq!(supply.take(0, 0, 0), Err(MarketError::EmptyPurchase));
    }

    #[test]
    fn purchase_fits_the_budget() {
        assert_eq!(affordable(2.5, 100, 10), Some((4, 10)));
        // 5 × 2.5 = 12.5 rounds to 13, one over the budget.
        assert_eq!(affordable(2.5, 100, 12), Some((4, 10)));
        assert_eq!(affordable(2.5, 3, 100), Some((3, 8)));
        assert_eq!(affordable(2.5, 100, 0), None);
        assert_eq!(affordable(2.5, 0, 100), None);
    }

    #[test]
    fn purchase_worth_nothing_is_skipped() {
        // 0.01 × 40 = 0.4 rounds to a zero payment.
        assert_eq!(affordable(0.01, 40, 1_000), None);
        assert_eq!(affordable(0.01, 60, 1_000), Some((60, 1)));
    }

    #[test]
    fn cheapest_sorts_sample_by_price() {
        let quotes: Vec<SupplyQuote> = [3.0, 1.0, 2.0]
            .iter()
            .enumerate()
            .map(|(i, &price)| SupplyQuote {
                supplier: FirmId(i as u64),
                price,
                volume: 10,
            })
            .collect();
        let mut rng = StdRng::seed_from_u64(9);
        let sorted = cheapest(&quotes, 3, &mut rng);
        let prices: Vec<f64> = sorted.iter().map(|q| q.price).collect();
        assert_eq!(prices, vec![1.0, 2.0, 3.0]);
    }
}
