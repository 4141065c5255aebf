use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::events::ScheduledEvent;

/// Errors raised while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to parse config JSON: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Configuration parameters for the economy simulation.
///
/// Every field has a default, so a JSON document only needs to name the
/// values it overrides.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // Population
    pub n_firms: usize,
    pub n_households: usize,

    // Firm creation
    pub firm_type: String,
    pub initial_machines: u32,
    pub initial_loan: i64,
    pub shareholders_per_firm: usize,

    // Factory
    pub machine_productivity: u64,
    pub machine_lifetime_min: u32,
    pub machine_lifetime_max: u32,
    pub machine_input_volume: u64,
    pub production_time: u32,

    // Pricing
    pub initial_markup: f64,
    pub price_flexibility: f64,

    // Production
    pub initial_utilization: f64,
    pub normal_utilization: f64,
    pub utilization_flexibility: f64,
    pub normal_inventory: f64,

    // Sales
    pub propensity_to_sell: f64,
    pub selling_capacity: f64,

    // Workforce
    pub initial_wage: f64,
    pub min_wage: f64,
    pub wage_flexibility: f64,
    pub normal_vacancy_rate: f64,
    pub contract_term_min: u64,
    pub contract_term_max: u64,

    // Capital
    pub target_debt_ratio_min: f64,
    pub target_debt_ratio_max: f64,
    pub payout_rate: f64,
    pub max_payout_share: f64,
    pub profit_memory: usize,
    pub patience: u32,
    pub dividend_sanction_periods: u32,

    // Investment
    pub investment_search_size: usize,
    pub investment_max_machines: usize,

    // Households
    pub initial_wealth_mean: f64,
    pub initial_wealth_sigma: f64,
    pub consumption_propensity_mean: f64,
    pub consumption_propensity_std: f64,
    pub reservation_wage_decay: f64,
    pub job_search_size: usize,
    pub supply_search_size: usize,

    // Bank
    pub interest_rate: f64,
    pub short_term_loan_periods: u32,
    pub long_term_loan_periods: u32,

    // Sector scheduling
    pub shuffle: bool,
    pub regeneration_delay_min: u64,
    pub regeneration_delay_max: u64,

    // Scenario
    pub events: Vec<ScheduledEvent>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            n_firms: 50,
            n_households: 1000,

            firm_type: "basic".to_string(),
            initial_machines: 10,
            initial_loan: 20_000,
            shareholders_per_firm: 10,

            machine_productivity: 100,
            machine_lifetime_min: 60,
            machine_lifetime_max: 120,
            machine_input_volume: 500,
            production_time: 1,

            initial_markup: 0.1,
            price_flexibility: 0.1,

            initial_utilization: 0.85,
            normal_utilization: 0.85,
            utilization_flexibility: 0.05,
            normal_inventory: 2.0,

            propensity_to_sell: 0.5,
            selling_capacity: 2.0,

            initial_wage: 1000.0,
            min_wage: 100.0,
            wage_flexibility: 0.05,
            normal_vacancy_rate: 0.03,
            contract_term_min: 6,
            contract_term_max: 18,

            target_debt_ratio_min: 0.3,
            target_debt_ratio_max: 0.7,
            payout_rate: 0.75,
            max_payout_share: 0.05,
            profit_memory: 12,
            patience: 36,
            dividend_sanction_periods: 12,

            investment_search_size: 10,
            investment_max_machines: 50,

            initial_wealth_mean: 5000.0,
            initial_wealth_sigma: 0.5,
            consumption_propensity_mean: 0.5,
            consumption_propensity_std: 0.1,
            reservation_wage_decay: 0.05,
            job_search_size: 5,
            supply_search_size: 5,

            interest_rate: 0.005,
            short_term_loan_periods: 1,
            long_term_loan_periods: 120,

            shuffle: true,
            regeneration_delay_min: 12,
            regeneration_delay_max: 36,

            events: Vec::new(),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(field, format!("{value} is outside [0, 1]")));
    }
    Ok(())
}

fn check_range<T: PartialOrd + std::fmt::Display>(
    field: &'static str,
    min: T,
    max: T,
) -> Result<(), ConfigError> {
    if min > max {
        return Err(invalid(field, format!("minimum {min} exceeds maximum {max}")));
    }
    Ok(())
}

impl Config {
    /// Parse a (possibly partial) JSON document over the defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Reject parameter sets the model cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_households == 0 {
            return Err(invalid("n_households", "at least one household is required"));
        }
        if self.firm_type.trim().is_empty() {
            return Err(invalid("firm_type", "must name a registered firm type"));
        }
        if self.machine_productivity == 0 {
            return Err(invalid("machine_productivity", "must be positive"));
        }
        if self.machine_lifetime_min == 0 {
            return Err(invalid("machine_lifetime_min", "must be positive"));
        }
        check_range(
            "machine_lifetime_max",
            self.machine_lifetime_min,
            self.machine_lifetime_max,
        )?;
        if self.machine_input_volume == 0 {
            return Err(invalid("machine_input_volume", "must be positive"));
        }
        if self.production_time == 0 {
            return Err(invalid("production_time", "must be positive"));
        }
        if self.initial_markup < 0.0 {
            return Err(invalid("initial_markup", "must not be negative"));
        }
        for (field, value) in [
            ("price_flexibility", self.price_flexibility),
            ("utilization_flexibility", self.utilization_flexibility),
            ("wage_flexibility", self.wage_flexibility),
            ("initial_utilization", self.initial_utilization),
            ("normal_utilization", self.normal_utilization),
            ("propensity_to_sell", self.propensity_to_sell),
            ("normal_vacancy_rate", self.normal_vacancy_rate),
            ("payout_rate", self.payout_rate),
            ("max_payout_share", self.max_payout_share),
            ("consumption_propensity_mean", self.consumption_propensity_mean),
            ("reservation_wage_decay", self.reservation_wage_decay),
        ] {
            check_unit(field, value)?;
        }
        if self.normal_utilization == 0.0 {
            return Err(invalid("normal_utilization", "must be positive"));
        }
        if self.normal_inventory <= 0.0 {
            return Err(invalid("normal_inventory", "must be positive"));
        }
        if self.selling_capacity <= 0.0 {
            return Err(invalid("selling_capacity", "must be positive"));
        }
        if self.min_wage < 1.0 {
            return Err(invalid("min_wage", "must be at least one money unit"));
        }
        if self.initial_wage < self.min_wage {
            return Err(invalid("initial_wage", "must not be below min_wage"));
        }
        if self.contract_term_min == 0 {
            return Err(invalid("contract_term_min", "must be positive"));
        }
        check_range("contract_term_max", self.contract_term_min, self.contract_term_max)?;
        check_unit("target_debt_ratio_min", self.target_debt_ratio_min)?;
        check_range(
            "target_debt_ratio_max",
            self.target_debt_ratio_min,
            self.target_debt_ratio_max,
        )?;
        if self.target_debt_ratio_max >= 1.0 {
            return Err(invalid("target_debt_ratio_max", "must be below 1"));
        }
        if self.profit_memory == 0 {
            return Err(invalid("profit_memory", "must be positive"));
        }
        if self.shareholders_per_firm == 0 {
            return Err(invalid("shareholders_per_firm", "must be positive"));
        }
        if self.investment_search_size == 0 || self.job_search_size == 0 || self.supply_search_size == 0 {
            return Err(invalid("search_size", "sample sizes must be positive"));
        }
        if self.initial_wealth_mean <= 0.0 || self.initial_wealth_sigma < 0.0 {
            return Err(invalid("initial_wealth_mean", "wealth distribution is degenerate"));
        }
        if self.consumption_propensity_std < 0.0 {
            return Err(invalid("consumption_propensity_std", "must not be negative"));
        }
        if self.interest_rate < 0.0 {
            return Err(invalid("interest_rate", "must not be negative"));
        }
        if self.short_term_loan_periods == 0 || self.long_term_loan_periods == 0 {
            return Err(invalid("loan_periods", "loan terms must be positive"));
        }
        check_range(
            "regeneration_delay_max",
            self.regeneration_delay_min,
            self.regeneration_delay_max,
        )?;
        if self.initial_loan < 0 {
            return Err(invalid("initial_loan", "must not be negative"));
        }
        Ok(())
    }

    /// Mean machine lifetime, used as the investment horizon.
    pub fn machine_horizon(&self) -> u32 {
        (self.machine_lifetime_min + self.machine_lifetime_max) / 2
    }
}
