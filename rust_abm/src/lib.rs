/*!
# `firm_abm`: firm-sector core of a macroeconomic agent-based model

Firms decide prices, production, wages, hiring, investment, dividends and
solvency each period; the [`sector`] schedules them through the fixed
phases of a period, and households, a bank and three markets close the
loop around them.

The period loop is driven by [krABMaga](https://github.com/krABMaga/krABMaga)
(krabmaga). With the `python` feature the crate also builds a Python
extension exposing [`state::run`] as `run_simulation`.

## Quick start

```no_run
use firm_abm::{config::Config, state::run};

let records = run(Config::default(), 42, 120)?;
for r in &records {
    println!("{} {} {:.3}", r.period, r.live_firms, r.unemployment_rate);
}
# Ok::<(), firm_abm::error::SimError>(())
```
*/

pub mod agents;
pub mod config;
pub mod error;
pub mod events;
pub mod markets;
pub mod sector;
pub mod state;

#[cfg(feature = "python")]
mod python {
    use pyo3::exceptions::{PyRuntimeError, PyValueError};
    use pyo3::prelude::*;

    use crate::config::Config;
    use crate::error::SimError;
    use crate::state::{self, PeriodRecord};

    // ─────────────────────────────────────────────────────────────────────────
    // Python-visible period record
    // ─────────────────────────────────────────────────────────────────────────

    /// Aggregate statistics for a single simulation period.
    ///
    /// All fields are read-only from Python.
    #[pyclass(get_all)]
    #[derive(Clone, Debug)]
    pub struct PyPeriodRecord {
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

    impl From<PeriodRecord> for PyPeriodRecord {
        fn from(r: PeriodRecord) -> Self {
            PyPeriodRecord {
                period: r.period,
                live_firms: r.live_firms,
                bankruptcies: r.bankruptcies,
                firms_created: r.firms_created,
                sales_value: r.sales_value,
                average_price: r.average_price,
                average_wage: r.average_wage,
                employment: r.employment,
                unemployment_rate: r.unemployment_rate,
                total_debt: r.total_debt,
                canceled_debt: r.canceled_debt,
                dividends: r.dividends,
                machines_bought: r.machines_bought,
            }
        }
    }

    #[pymethods]
    impl PyPeriodRecord {
        fn __repr__(&self) -> String {
            format!(
                "PyPeriodRecord(period={}, live_firms={}, sales_value={}, unemployment_rate={:.4})",
                self.period, self.live_firms, self.sales_value, self.unemployment_rate
            )
        }

        /// Convert to a plain Python dict for easy interop with pandas / polars.
        fn to_dict(&self) -> std::collections::HashMap<String, f64> {
            let mut m = std::collections::HashMap::new();
            m.insert("period".to_string(), self.period as f64);
            m.insert("live_firms".to_string(), self.live_firms as f64);
            m.insert("bankruptcies".to_string(), self.bankruptcies as f64);
            m.insert("firms_created".to_string(), self.firms_created as f64);
            m.insert("sales_value".to_string(), self.sales_value as f64);
            m.insert("average_price".to_string(), self.average_price);
            m.insert("average_wage".to_string(), self.average_wage);
            m.insert("employment".to_string(), self.employment as f64);
            m.insert("unemployment_rate".to_string(), self.unemployment_rate);
            m.insert("total_debt".to_string(), self.total_debt as f64);
            m.insert("canceled_debt".to_string(), self.canceled_debt as f64);
            m.insert("dividends".to_string(), self.dividends as f64);
            m.insert("machines_bought".to_string(), self.machines_bought as f64);
            m
        }
    }

    fn to_py_err(err: SimError) -> PyErr {
        match err {
            SimError::Config(_) | SimError::UnknownFirmType(_) => PyValueError::new_err(err.to_string()),
            other => PyRuntimeError::new_err(other.to_string()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Main simulation entry point
    // ─────────────────────────────────────────────────────────────────────────

    /// Run the firm-sector simulation and return per-period statistics.
    ///
    /// Args:
    ///     periods: Number of simulation periods to run.
    ///     seed: Random seed for reproducibility.
    ///     config_json: Optional JSON object overriding the default parameters.
    ///
    /// Returns:
    ///     A list of :class:`PyPeriodRecord` objects, one per period.
    #[pyfunction]
    #[pyo3(signature = (periods=120, seed=42, config_json=None))]
    fn run_simulation(
        periods: u64,
        seed: u64,
        config_json: Option<&str>,
    ) -> PyResult<Vec<PyPeriodRecord>> {
        let config = match config_json {
            Some(json) => Config::from_json(json).map_err(|e| to_py_err(e.into()))?,
            None => Config::default(),
        };
        let records = state::run(config, seed, periods).map_err(to_py_err)?;
        Ok(records.into_iter().map(PyPeriodRecord::from).collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Module definition
    // ─────────────────────────────────────────────────────────────────────────

    /// Firm-sector agent-based model.
    #[pymodule]
    fn firm_abm(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_class::<PyPeriodRecord>()?;
        m.add_function(wrap_pyfunction!(run_simulation, m)?)?;
        Ok(())
    }
}
