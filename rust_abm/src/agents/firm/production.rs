use rand::Rng;

/// Targeted capacity utilization, steered by inventory feedback.
#[derive(Clone, Debug)]
pub struct ProductionManager {
    target: f64,
    normal: f64,
    flexibility: f64,
}

impl ProductionManager {
    pub fn new(initial: f64, normal: f64, flexibility: f64) -> Self {
        ProductionManager {
            target: initial.clamp(0.0, 1.0),
            normal,
            flexibility,
        }
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn normal(&self) -> f64 {
        self.normal
    }

    /// Move the target against the inventory ratio, outside a random dead
    /// band of half-width `α1·α2` around 1.
    pub fn update(&mut self, inventory_ratio: f64, rng: &mut impl Rng) {
        let alpha1: f64 = rng.gen();
        let alpha2: f64 = rng.gen();
        let band = alpha1 * alpha2;
        let step = alpha1 * self.flexibility;
        if inventory_ratio < 1.0 - band {
            self.target = (self.target + step).min(1.0);
        } else if inventory_ratio > 1.0 + band {
            self.target = (self.target - step).max(0.0);
        }
    }
}
