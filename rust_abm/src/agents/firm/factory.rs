use crate::markets::{Goods, MarketError};

/// A single production unit. It needs one worker per period to run.
#[derive(Clone, Debug)]
pub struct Machine {
    productivity: u64,
    value: i64,
    remaining_life: u32,
    progress: u32,
    wip_value: i64,
}

impl Machine {
    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn remaining_life(&self) -> u32 {
        self.remaining_life
    }

    pub fn wip_value(&self) -> i64 {
        self.wip_value
    }
}

/// What one call to [`Factory::process`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProductionReport {
    pub operated: u32,
    pub output: u64,
    /// Payroll that could not be attached to a running machine.
    pub unabsorbed: i64,
}

/// Machines, work in process and the stock of finished goods.
///
/// Depreciation and wages are carried into the goods being made, so the
/// factory value only ever leaves through [`Factory::release`] (cost of
/// goods sold) or through write-offs.
#[derive(Clone, Debug)]
pub struct Factory {
    machines: Vec<Machine>,
    productivity: u64,
    production_time: u32,
    finished: Goods,
    output: u64,
}

impl Factory {
    pub fn new(productivity: u64, production_time: u32) -> Self {
        Factory {
            machines: Vec::new(),
            productivity,
            production_time: production_time.max(1),
            finished: Goods::default(),
            output: 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.machines.len() as u32
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    pub fn productivity(&self) -> u64 {
        self.productivity
    }

    /// Output per period with every machine running.
    pub fn max_output(&self) -> u64 {
        self.machines.iter().map(|m| m.productivity).sum()
    }

    pub fn finished(&self) -> Goods {
        self.finished
    }

    /// Units delivered to finished goods this period.
    pub fn output(&self) -> u64 {
        self.output
    }

    pub fn machines_value(&self) -> i64 {
        self.machines.iter().map(|m| m.value).sum()
    }

    pub fn wip_value(&self) -> i64 {
        self.machines.iter().map(|m| m.wip_value).sum()
    }

    pub fn value(&self) -> i64 {
        self.machines_value() + self.wip_value() + self.finished.value
    }

    /// Book value per finished unit, or the labour cost of a fresh unit when
    /// the stock is empty.
    pub fn unit_cost(&self, wage: f64) -> f64 {
        if self.finished.volume > 0 {
            self.finished.value as f64 / self.finished.volume as f64
        } else {
            wage / self.productivity.max(1) as f64
        }
    }

    /// Install `count` new machines worth `total_value` together.
    pub fn add_machines(&mut self, count: u32, total_value: i64, lifetimes: impl IntoIterator<Item = u32>) {
        if count == 0 {
            return;
        }
        let each = total_value / count as i64;
        let mut remainder = total_value - each * count as i64;
        for life in lifetimes.into_iter().take(count as usize) {
            self.machines.push(Machine {
                productivity: self.productivity,
                value: each + remainder,
                remaining_life: life.max(1),
                progress: 0,
                wip_value: 0,
            });
            remainder = 0;
        }
    }

    /// Start a new period: scrap worn-out machines.
    ///
    /// Returns the value written off with them (stranded work in process).
    pub fn open(&mut self) -> i64 {
        self.output = 0;
        let mut written_off = 0;
        self.machines.retain(|m| {
            if m.remaining_life == 0 {
                written_off += m.value + m.wip_value;
                false
            } else {
                true
            }
        });
        written_off
    }

    /// Run up to `workers` machines, oldest first, charging `payroll` to them.
    pub fn process(&mut self, workers: u32, payroll: i64) -> ProductionReport {
        let operated = workers.min(self.capacity());
        if operated == 0 {
            return ProductionReport {
                unabsorbed: payroll,
                ..ProductionReport::default()
            };
        }

        let share = payroll / operated as i64;
        let mut remainder = payroll - share * operated as i64;
        let production_time = self.production_time;
        let mut delivered = Goods::default();
        for machine in self.machines.iter_mut().take(operated as usize) {
            let depreciation = if machine.remaining_life <= 1 {
                machine.value
            } else {
                machine.value / machine.remaining_life as i64
            };
            machine.value -= depreciation;
            machine.remaining_life = machine.remaining_life.saturating_sub(1);
            machine.wip_value += depreciation + share + remainder;
            remainder = 0;
            machine.progress += 1;
            if machine.progress >= production_time {
                delivered.volume += machine.productivity * production_time as u64;
                delivered.value += machine.wip_value;
                machine.progress = 0;
                machine.wip_value = 0;
            }
        }

        self.finished.volume += delivered.volume;
        self.finished.value += delivered.value;
        self.output += delivered.volume;
        ProductionReport {
            operated,
            output: delivered.volume,
            unabsorbed: 0,
        }
    }

    /// Take `volume` finished units out of stock at weighted-average value.
    pub fn release(&mut self, volume: u64) -> Result<Goods, MarketError> {
        if volume > self.finished.volume {
            return Err(MarketError::InventoryShortfall {
                requested: volume,
                available: self.finished.volume,
            });
        }
        let value = if volume == self.finished.volume {
            self.finished.value
        } else {
            (self.finished.value as f64 * volume as f64 / self.finished.volume as f64).round() as i64
        };
        self.finished.volume -= volume;
        self.finished.value -= value;
        Ok(Goods { volume, value })
    }

    /// Write the whole factory off. Returns the value lost.
    pub fn liquidate(&mut self) -> i64 {
        let value = self.value();
        self.machines.clear();
        self.finished = Goods::default();
        value
    }
}
