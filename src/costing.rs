//! Capital and operating cost modeling.
//!
//! Costing is an extension over solved unit state: attaching costing to a
//! unit declares a capital and an operating cost variable plus the equality
//! constraints tying them to the unit's performance variables, and
//! system-level costing rolls the per-unit costs into total investment,
//! operating cost, and levelized cost of water.
//!
//! Process-wide cost parameters live in one immutable [`CostingParams`]
//! shared by `Rc`. Units receive the handle explicitly at attachment time,
//! so a unit's cost model never reaches across the flowsheet to find its
//! parameters. The [`CostingParamsBuilder`] refuses to build until every
//! parameter has a value; a missing parameter is a fatal
//! [`ConfigurationError`] naming the parameter, never a silent default.

use std::rc::Rc;

use crate::core::error::ConfigurationError;
use crate::core::variable::{VarId, VarPool};

/// Process-wide cost parameters.
///
/// All monetary values are USD. The defaults reproduce a conventional
/// seawater reverse-osmosis cost basis.
#[derive(Debug, Clone, PartialEq)]
pub struct CostingParams {
    /// Plant utilization fraction.
    pub load_factor: f64,

    /// Indirect-cost multiplier on total capital cost.
    pub factor_total_investment: f64,

    /// Maintenance, labor, and chemical cost as a fraction of investment.
    pub factor_maintenance_labor_chemical: f64,

    /// Capital annualization factor, 1/yr.
    pub factor_capital_annualization: f64,

    /// Membrane replacement cost as a fraction of membrane capital per year.
    pub factor_membrane_replacement: f64,

    /// Electricity price, $/kWh.
    pub electricity_cost: f64,

    /// Reverse-osmosis membrane cost, $/m².
    pub ro_membrane_cost: f64,

    /// Nanofiltration membrane cost, $/m².
    pub nf_membrane_cost: f64,

    /// High-pressure pump cost, $/W of mechanical work.
    pub high_pressure_pump_cost: f64,

    /// Centrifugal pump cost, $/W of mechanical work.
    pub centrifugal_pump_cost: f64,

    /// Pressure exchanger cost, $/(m³/h) of low-pressure-side flow.
    pub pressure_exchanger_cost: f64,

    /// Energy-recovery pump cost correlation coefficient, $/(m³/h)^b.
    pub erd_pump_cost_a: f64,

    /// Energy-recovery pump cost correlation exponent.
    pub erd_pump_cost_b: f64,
}

impl Default for CostingParams {
    fn default() -> Self {
        Self {
            load_factor: 0.9,
            factor_total_investment: 2.0,
            factor_maintenance_labor_chemical: 0.03,
            factor_capital_annualization: 0.1,
            factor_membrane_replacement: 0.2,
            electricity_cost: 0.07,
            ro_membrane_cost: 30.0,
            nf_membrane_cost: 15.0,
            high_pressure_pump_cost: 53.0 / 1e5 * 3600.0,
            centrifugal_pump_cost: 0.15,
            pressure_exchanger_cost: 535.0,
            erd_pump_cost_a: 3134.7,
            erd_pump_cost_b: 0.58,
        }
    }
}

impl CostingParams {
    /// Starts a builder with no parameters assigned.
    #[must_use]
    pub fn builder(block: impl Into<String>) -> CostingParamsBuilder {
        CostingParamsBuilder::new(block)
    }
}

/// Builder requiring every cost parameter to be assigned explicitly.
#[derive(Debug, Clone, Default)]
pub struct CostingParamsBuilder {
    block: String,
    load_factor: Option<f64>,
    factor_total_investment: Option<f64>,
    factor_maintenance_labor_chemical: Option<f64>,
    factor_capital_annualization: Option<f64>,
    factor_membrane_replacement: Option<f64>,
    electricity_cost: Option<f64>,
    ro_membrane_cost: Option<f64>,
    nf_membrane_cost: Option<f64>,
    high_pressure_pump_cost: Option<f64>,
    centrifugal_pump_cost: Option<f64>,
    pressure_exchanger_cost: Option<f64>,
    erd_pump_cost_a: Option<f64>,
    erd_pump_cost_b: Option<f64>,
}

macro_rules! builder_setters {
    ($($field:ident),* $(,)?) => {
        $(
            /// Assigns this parameter.
            #[must_use]
            pub fn $field(mut self, value: f64) -> Self {
                self.$field = Some(value);
                self
            }
        )*
    };
}

impl CostingParamsBuilder {
    /// Creates a builder; `block` names the parameter block in errors.
    #[must_use]
    pub fn new(block: impl Into<String>) -> Self {
        Self {
            block: block.into(),
            ..Self::default()
        }
    }

    builder_setters!(
        load_factor,
        factor_total_investment,
        factor_maintenance_labor_chemical,
        factor_capital_annualization,
        factor_membrane_replacement,
        electricity_cost,
        ro_membrane_cost,
        nf_membrane_cost,
        high_pressure_pump_cost,
        centrifugal_pump_cost,
        pressure_exchanger_cost,
        erd_pump_cost_a,
        erd_pump_cost_b,
    );

    /// Finalizes the parameter set.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] naming the first parameter that was
    /// never assigned.
    pub fn build(self) -> Result<Rc<CostingParams>, ConfigurationError> {
        let block = &self.block;
        let require = |value: Option<f64>, name: &str| {
            value.ok_or_else(|| ConfigurationError::missing_parameter(block, name))
        };
        Ok(Rc::new(CostingParams {
            load_factor: require(self.load_factor, "load_factor")?,
            factor_total_investment: require(
                self.factor_total_investment,
                "factor_total_investment",
            )?,
            factor_maintenance_labor_chemical: require(
                self.factor_maintenance_labor_chemical,
                "factor_maintenance_labor_chemical",
            )?,
            factor_capital_annualization: require(
                self.factor_capital_annualization,
                "factor_capital_annualization",
            )?,
            factor_membrane_replacement: require(
                self.factor_membrane_replacement,
                "factor_membrane_replacement",
            )?,
            electricity_cost: require(self.electricity_cost, "electricity_cost")?,
            ro_membrane_cost: require(self.ro_membrane_cost, "ro_membrane_cost")?,
            nf_membrane_cost: require(self.nf_membrane_cost, "nf_membrane_cost")?,
            high_pressure_pump_cost: require(
                self.high_pressure_pump_cost,
                "high_pressure_pump_cost",
            )?,
            centrifugal_pump_cost: require(self.centrifugal_pump_cost, "centrifugal_pump_cost")?,
            pressure_exchanger_cost: require(
                self.pressure_exchanger_cost,
                "pressure_exchanger_cost",
            )?,
            erd_pump_cost_a: require(self.erd_pump_cost_a, "erd_pump_cost_a")?,
            erd_pump_cost_b: require(self.erd_pump_cost_b, "erd_pump_cost_b")?,
        }))
    }
}

/// The capital and operating cost variables attached to one unit.
#[derive(Debug, Clone, Copy)]
pub struct CostingBlock {
    /// Capital cost, $.
    pub capital_cost: VarId,

    /// Operating cost, $/yr.
    pub operating_cost: VarId,
}

impl CostingBlock {
    /// Declares the standard pair of cost variables under `prefix`.
    pub(crate) fn make_vars(pool: &VarPool, prefix: &str) -> Self {
        Self {
            capital_cost: pool.add_bounded(
                format!("{prefix}.capital_cost"),
                1e5,
                Some(0.0),
                None,
            ),
            operating_cost: pool.add_bounded(
                format!("{prefix}.operating_cost"),
                1e4,
                Some(0.0),
                Some(1e6),
            ),
        }
    }
}

/// Flowsheet-level cost roll-up variables.
#[derive(Debug, Clone, Copy)]
pub struct SystemCosting {
    /// Sum of unit capital costs, $.
    pub capital_cost_total: VarId,

    /// Total investment including indirect costs, $.
    pub investment_cost_total: VarId,

    /// Maintenance, labor, and chemical operating cost, $/yr.
    pub operating_cost_mlc: VarId,

    /// Total operating cost, $/yr.
    pub operating_cost_total: VarId,

    /// Levelized cost of water, $/m³.
    pub lcow: VarId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_a_missing_parameter() {
        let err = CostingParams::builder("fs.costing_param")
            .load_factor(0.9)
            .build()
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("fs.costing_param"));
        assert!(text.contains("factor_total_investment"));
    }

    #[test]
    fn fully_assigned_builder_matches_defaults() {
        let built = CostingParams::builder("fs.costing_param")
            .load_factor(0.9)
            .factor_total_investment(2.0)
            .factor_maintenance_labor_chemical(0.03)
            .factor_capital_annualization(0.1)
            .factor_membrane_replacement(0.2)
            .electricity_cost(0.07)
            .ro_membrane_cost(30.0)
            .nf_membrane_cost(15.0)
            .high_pressure_pump_cost(53.0 / 1e5 * 3600.0)
            .centrifugal_pump_cost(0.15)
            .pressure_exchanger_cost(535.0)
            .erd_pump_cost_a(3134.7)
            .erd_pump_cost_b(0.58)
            .build()
            .unwrap();
        assert_eq!(*built, CostingParams::default());
    }
}
