//! Flowsheet composition.
//!
//! A [`Flowsheet`] owns the shared variable pool and the unit models, wires
//! their ports together with equality constraints, and aggregates every
//! unit's equation system (plus the connection and costing relations) into
//! one system for a flowsheet-level solve.

use std::rc::Rc;

use crate::core::error::ConfigurationError;
use crate::core::port::{self, Port};
use crate::core::scaling::set_scaling_from_value;
use crate::core::solver::{EquationSystem, SolveReport, SolverAdapter, SolverOptions};
use crate::core::variable::{VarId, VarPool};
use crate::costing::{CostingBlock, CostingParams, SystemCosting};
use crate::models::UnitModel;

/// Handle to a unit owned by a flowsheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitHandle(usize);

/// A collection of connected unit models over one variable pool.
pub struct Flowsheet {
    pool: VarPool,
    units: Vec<Box<dyn UnitModel>>,
    system: EquationSystem,
    annual_water_production: Option<VarId>,
    system_costing: Option<SystemCosting>,
}

impl Default for Flowsheet {
    fn default() -> Self {
        Self::new()
    }
}

impl Flowsheet {
    /// Creates an empty flowsheet.
    #[must_use]
    pub fn new() -> Self {
        let pool = VarPool::new();
        Self {
            system: EquationSystem::new(&pool),
            pool,
            units: Vec::new(),
            annual_water_production: None,
            system_costing: None,
        }
    }

    /// The flowsheet's variable pool. Units must be built against it.
    #[must_use]
    pub fn pool(&self) -> &VarPool {
        &self.pool
    }

    /// Takes ownership of a unit and returns a handle to it.
    pub fn add_unit(&mut self, unit: impl UnitModel + 'static) -> UnitHandle {
        self.units.push(Box::new(unit));
        UnitHandle(self.units.len() - 1)
    }

    /// Typed access to a unit.
    #[must_use]
    pub fn unit<T: 'static>(&self, handle: UnitHandle) -> Option<&T> {
        self.units[handle.0].as_any().downcast_ref()
    }

    /// Typed mutable access to a unit.
    pub fn unit_mut<T: 'static>(&mut self, handle: UnitHandle) -> Option<&mut T> {
        self.units[handle.0].as_any_mut().downcast_mut()
    }

    /// Access to a unit through the common interface.
    #[must_use]
    pub fn unit_dyn(&self, handle: UnitHandle) -> &dyn UnitModel {
        self.units[handle.0].as_ref()
    }

    /// Units in insertion order.
    pub fn units(&self) -> impl Iterator<Item = &dyn UnitModel> {
        self.units.iter().map(AsRef::as_ref)
    }

    /// Connects two ports with member-wise equality constraints.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the ports do not expose identical
    /// member sets.
    pub fn connect(&mut self, from: &Port, to: &Port) -> Result<(), ConfigurationError> {
        port::connect(&mut self.system, from, to)
    }

    /// Copies current values downstream for sequential initialization.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the ports do not expose identical
    /// member sets.
    pub fn propagate(&self, from: &Port, to: &Port) -> Result<(), ConfigurationError> {
        port::propagate(&self.pool, from, to)
    }

    /// Sets (and fixes) the annual water production used by costing, m³/yr.
    pub fn set_annual_water_production(&mut self, m3_per_year: f64) {
        let id = *self.annual_water_production.get_or_insert_with(|| {
            self.pool
                .add_bounded("fs.annual_water_production", 0.0, Some(0.0), None)
        });
        self.pool.fix_at(id, m3_per_year);
    }

    /// The annual water production variable, if it has been set.
    #[must_use]
    pub fn annual_water_production(&self) -> Option<VarId> {
        self.annual_water_production
    }

    /// Attaches system-level costing, rolling unit costs up into total
    /// investment, operating cost, and levelized cost of water. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if annual water production has not
    /// been set or no unit has costing attached.
    pub fn system_costing(
        &mut self,
        params: &Rc<CostingParams>,
    ) -> Result<SystemCosting, ConfigurationError> {
        if let Some(existing) = self.system_costing {
            return Ok(existing);
        }
        let production = self.annual_water_production.ok_or_else(|| {
            ConfigurationError::missing_parameter("fs.costing", "annual_water_production")
        })?;
        let blocks: Vec<CostingBlock> =
            self.units.iter().filter_map(|u| u.costing().copied()).collect();
        if blocks.is_empty() {
            return Err(ConfigurationError::new(
                "fs.costing",
                "no unit has costing attached; call add_costing on the units first",
            ));
        }

        let costing = SystemCosting {
            capital_cost_total: self.pool.add_bounded(
                "fs.costing.capital_cost_total",
                1e6,
                Some(0.0),
                None,
            ),
            investment_cost_total: self.pool.add_bounded(
                "fs.costing.investment_cost_total",
                2e6,
                Some(0.0),
                None,
            ),
            operating_cost_mlc: self.pool.add_bounded(
                "fs.costing.operating_cost_MLC",
                1e4,
                Some(0.0),
                None,
            ),
            operating_cost_total: self.pool.add("fs.costing.operating_cost_total", 1e5),
            lcow: self.pool.add_bounded("fs.costing.LCOW", 1.0, Some(0.0), None),
        };

        let capitals: Vec<VarId> = blocks.iter().map(|b| b.capital_cost).collect();
        let operatings: Vec<VarId> = blocks.iter().map(|b| b.operating_cost).collect();

        {
            let total = costing.capital_cost_total;
            self.system
                .add_constraint("fs.costing.capital_cost_total_equation", move |p| {
                    p.get(total) - capitals.iter().map(|id| p.get(*id)).sum::<f64>()
                });
        }
        {
            let (investment, capital) = (costing.investment_cost_total, costing.capital_cost_total);
            let factor = params.factor_total_investment;
            self.system
                .add_constraint("fs.costing.investment_cost_equation", move |p| {
                    p.get(investment) - factor * p.get(capital)
                });
        }
        {
            let (mlc, investment) = (costing.operating_cost_mlc, costing.investment_cost_total);
            let factor = params.factor_maintenance_labor_chemical;
            self.system
                .add_constraint("fs.costing.operating_cost_MLC_equation", move |p| {
                    p.get(mlc) - factor * p.get(investment)
                });
        }
        {
            let (total, mlc) = (costing.operating_cost_total, costing.operating_cost_mlc);
            self.system
                .add_constraint("fs.costing.operating_cost_total_equation", move |p| {
                    p.get(total) - p.get(mlc) - operatings.iter().map(|id| p.get(*id)).sum::<f64>()
                });
        }
        {
            let SystemCosting {
                investment_cost_total,
                operating_cost_total,
                lcow,
                ..
            } = costing;
            let annualization = params.factor_capital_annualization;
            self.system.add_constraint("fs.costing.LCOW_equation", move |p| {
                p.get(lcow) * p.get(production)
                    - (annualization * p.get(investment_cost_total)
                        + p.get(operating_cost_total))
            });
        }

        self.system.add_vars([
            costing.capital_cost_total,
            costing.investment_cost_total,
            costing.operating_cost_mlc,
            costing.operating_cost_total,
            costing.lcow,
        ]);
        self.system_costing = Some(costing);
        Ok(costing)
    }

    /// The system-level costing block, if attached.
    #[must_use]
    pub fn costing(&self) -> Option<&SystemCosting> {
        self.system_costing.as_ref()
    }

    /// Aggregates every unit system plus the flowsheet's own connection and
    /// costing relations into one solvable system.
    #[must_use]
    pub fn combined_system(&self) -> EquationSystem {
        let mut combined = EquationSystem::new(&self.pool);
        for unit in &self.units {
            combined.extend_from(unit.equations());
        }
        combined.extend_from(&self.system);
        combined
    }

    /// Runs each unit's scaling pass, then scales the flowsheet-level
    /// variables from their magnitudes.
    pub fn calculate_scaling_factors(&mut self) {
        for unit in &mut self.units {
            unit.calculate_scaling_factors();
        }
        if let Some(id) = self.annual_water_production {
            set_scaling_from_value(&self.pool, id);
        }
        if let Some(costing) = self.system_costing {
            for id in [
                costing.capital_cost_total,
                costing.investment_cost_total,
                costing.operating_cost_mlc,
                costing.operating_cost_total,
                costing.lcow,
            ] {
                set_scaling_from_value(&self.pool, id);
            }
        }
    }

    /// Solves the combined flowsheet system.
    pub fn solve(&self, solver: &dyn SolverAdapter, options: &SolverOptions) -> SolveReport {
        solver.solve(&self.combined_system(), options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::solver::NewtonSolver;
    use crate::models::pump::{Pump, PumpType};
    use crate::properties::seawater::SimpleSeawater;
    use approx::assert_abs_diff_eq;

    fn feed_pump(fs: &Flowsheet, name: &str) -> Pump {
        Pump::build(fs.pool(), name, PumpType::HighPressure, Rc::new(SimpleSeawater))
    }

    #[test]
    fn typed_access_through_handles() {
        let mut fs = Flowsheet::new();
        let pump = feed_pump(&fs, "fs.pump");
        let handle = fs.add_unit(pump);
        assert!(fs.unit::<Pump>(handle).is_some());
        assert_eq!(fs.unit_dyn(handle).name(), "fs.pump");
    }

    #[test]
    fn connected_pumps_solve_as_one_system() {
        let mut fs = Flowsheet::new();
        let first = fs.add_unit(feed_pump(&fs, "fs.pump1"));
        let second = fs.add_unit(feed_pump(&fs, "fs.pump2"));

        {
            let pump = fs.unit::<Pump>(first).unwrap();
            let pool = fs.pool();
            pool.fix_at(pump.inlet_state().flow_mass_h2o, 0.965);
            pool.fix_at(pump.inlet_state().flow_mass_tds, 0.035);
            pool.fix_at(pump.inlet_state().temperature, 298.15);
            pool.fix_at(pump.inlet_state().pressure, 101325.0);
            pool.fix_at(pump.deltap, 1e5);
            pool.fix_at(pump.efficiency, 0.8);
        }
        {
            let pump = fs.unit::<Pump>(second).unwrap();
            fs.pool().fix_at(pump.deltap, 2e5);
            fs.pool().fix_at(pump.efficiency, 0.8);
        }

        let outlet = fs.unit::<Pump>(first).unwrap().outlet().clone();
        let inlet = fs.unit::<Pump>(second).unwrap().inlet().clone();
        fs.connect(&outlet, &inlet).unwrap();

        let combined = fs.combined_system();
        assert_eq!(combined.degrees_of_freedom(), 0);

        fs.calculate_scaling_factors();
        let report = fs.solve(&NewtonSolver::new(), &SolverOptions::default());
        assert!(report.status.is_optimal());

        let pump2 = fs.unit::<Pump>(second).unwrap();
        assert_abs_diff_eq!(
            fs.pool().get(pump2.outlet_state().pressure),
            101325.0 + 3e5,
            epsilon = 1.0
        );
    }

    #[test]
    fn system_costing_requires_annual_water_production() {
        let mut fs = Flowsheet::new();
        let handle = fs.add_unit(feed_pump(&fs, "fs.pump"));
        let params = Rc::new(CostingParams::default());
        fs.unit_mut::<Pump>(handle).unwrap().add_costing(&params);

        let err = fs.system_costing(&params).unwrap_err();
        assert!(err.to_string().contains("annual_water_production"));

        fs.set_annual_water_production(1e6);
        let first = fs.system_costing(&params).unwrap();
        let second = fs.system_costing(&params).unwrap();
        assert_eq!(first.lcow, second.lcow); // idempotent
    }
}
