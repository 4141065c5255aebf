use rand::Rng;

/// Sales feedback from the previous period.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SalesFeedback {
    pub supply_volume: u64,
    pub sales_volume: u64,
    /// Finished inventory relative to its normal level.
    pub inventory_ratio: f64,
}

/// Bracketed price discovery.
///
/// The price moves at random inside `[low, high]`; the side that just
/// proved wrong closes on the price and the other side widens, so the
/// bracket narrows around the market price period after period.
#[derive(Clone, Debug)]
pub struct PricingManager {
    price: Option<f64>,
    low: f64,
    high: f64,
    markup: f64,
    flexibility: f64,
}

impl PricingManager {
    pub fn new(markup: f64, flexibility: f64) -> Self {
        PricingManager {
            price: None,
            low: 0.0,
            high: 0.0,
            markup,
            flexibility,
        }
    }

    pub fn price(&self) -> Option<f64> {
        self.price
    }

    pub fn bracket(&self) -> (f64, f64) {
        (self.low, self.high)
    }

    pub fn markup(&self) -> f64 {
        self.markup
    }

    pub fn set_markup(&mut self, markup: f64) {
        self.markup = markup;
    }

    /// Forget the current price; the next update starts again from cost.
    pub fn reset(&mut self) {
        self.price = None;
    }

    pub fn update(&mut self, feedback: SalesFeedback, unit_cost: f64, rng: &mut impl Rng) {
        let Some(price) = self.price else {
            if unit_cost > 0.0 {
                let price = unit_cost * (1.0 + self.markup);
                self.price = Some(price);
                self.low = price * (1.0 - self.flexibility);
                self.high = price * (1.0 + self.flexibility);
            }
            return;
        };
        if feedback.supply_volume == 0 {
            return;
        }

        let mut price = price;
        if feedback.sales_volume >= feedback.supply_volume {
            self.low = price;
            if feedback.inventory_ratio < 1.0 {
                price += rng.gen::<f64>() * (self.high - price);
            }
            self.high *= 1.0 + self.flexibility;
        } else {
            self.high = price;
            if feedback.inventory_ratio > 1.0 {
                price = self.low + rng.gen::<f64>() * (price - self.low);
            }
            self.low *= 1.0 - self.flexibility;
        }
        self.price = Some(price.clamp(self.low, self.high));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn first_update_starts_from_cost() {
        let mut pricing = PricingManager::new(0.1, 0.1);
        let mut rng = StdRng::seed_from_u64(0);
        pricing.update(SalesFeedback::default(), 10.0, &mut rng);
        let price = pricing.price().unwrap();
        assert!((price - 11.0).abs() < 1e-9);
        let (low, high) = pricing.bracket();
        assert!((low - 9.9).abs() < 1e-9);
        assert!((high - 12.1).abs() < 1e-9);
    }

    #[test]
    fn sold_out_with_low_stock_raises_price() {
        let mut pricing = PricingManager::new(0.0, 0.1);
        let mut rng = StdRng::seed_from_u64(0);
        pricing.update(SalesFeedback::default(), 10.0, &mut rng);
        let feedback = SalesFeedback {
            supply_volume: 100,
            sales_volume: 100,
            inventory_ratio: 0.5,
        };
        pricing.update(feedback, 10.0, &mut rng);
        assert!(pricing.price().unwrap() >= 10.0);
        assert_eq!(pricing.bracket().0, 10.0);
    }

    #[test]
    fn unsold_goods_with_high_stock_lower_price() {
        let mut pricing = PricingManager::new(0.0, 0.1);
        let mut rng = StdRng::seed_from_u64(0);
        pricing.update(SalesFeedback::default(), 10.0, &mut rng);
        let feedback = SalesFeedback {
            supply_volume: 100,
            sales_volume: 40,
            inventory_ratio: 3.0,
        };
        pricing.update(feedback, 10.0, &mut rng);
        assert!(pricing.price().unwrap() <= 10.0);
        assert_eq!(pricing.bracket().1, 10.0);
    }

    #[test]
    fn no_supply_holds_price() {
        let mut pricing = PricingManager::new(0.0, 0.1);
        let mut rng = StdRng::seed_from_u64(0);
        pricing.update(SalesFeedback::default(), 10.0, &mut rng);
        pricing.update(SalesFeedback::default(), 50.0, &mut rng);
        assert_eq!(pricing.price(), Some(10.0));
    }

    proptest! {
        #[test]
        fn price_stays_inside_bracket(
            seed in any::<u64>(),
            steps in prop::collection::vec((1u64..200, 0u64..200, 0.0f64..3.0), 1..60),
        ) {
            let mut pricing = PricingManager::new(0.1, 0.1);
            let mut rng = StdRng::seed_from_u64(seed);
            pricing.update(SalesFeedback::default(), 7.5, &mut rng);
            for (supply, sales, inventory_ratio) in steps {
                let feedback = SalesFeedback {
                    supply_volume: supply,
                    sales_volume: sales.min(supply),
                    inventory_ratio,
                };
                pricing.update(feedback, 7.5, &mut rng);
                let price = pricing.price().unwrap();
                let (low, high) = pricing.bracket();
                prop_assert!(low <= price && price <= high, "{low} <= {price} <= {high}");
                prop_assert!(low > 0.0);
            }
        }
    }
}
