//! Pressure-changer (pump) unit model.

use std::any::Any;
use std::rc::Rc;

use crate::core::port::Port;
use crate::core::report::{PerformanceContents, StreamRow, StreamTable};
use crate::core::scaling::set_scaling_from_value;
use crate::core::solver::{EquationSystem, SolverAdapter, SolverOptions};
use crate::core::state::{StateArgs, StateBlock, release_state};
use crate::core::variable::{VarId, VarPool};
use crate::costing::{CostingBlock, CostingParams};
use crate::models::{InitializeOutcome, UnitModel};
use crate::properties::seawater::{SeawaterPropertyModel, SeawaterState};

/// Pump service class; selects the costing correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpType {
    /// Low-head transfer pump.
    Centrifugal,

    /// Membrane feed pump.
    HighPressure,

    /// Booster pump paired with an energy-recovery pressure exchanger.
    PressureExchanger,
}

/// Isothermal pump raising stream pressure by a specified `deltap`.
///
/// Mechanical work follows `work · efficiency = Q · Δp`. A typical
/// specification fixes the inlet state, `deltap`, and `efficiency`, leaving
/// the outlet state and work to the solve.
pub struct Pump {
    name: String,
    pool: VarPool,
    pump_type: PumpType,
    model: Rc<dyn SeawaterPropertyModel>,
    inlet_state: SeawaterState,
    outlet_state: SeawaterState,
    inlet: Port,
    outlet: Port,
    /// Pressure rise, Pa.
    pub deltap: VarId,
    /// Mechanical efficiency.
    pub efficiency: VarId,
    /// Mechanical work, W.
    pub work_mechanical: VarId,
    system: EquationSystem,
    costing: Option<CostingBlock>,
}

impl Pump {
    /// Builds the pump and registers its constraints.
    pub fn build(
        pool: &VarPool,
        name: &str,
        pump_type: PumpType,
        model: Rc<dyn SeawaterPropertyModel>,
    ) -> Self {
        let inlet_state = SeawaterState::new(pool, &format!("{name}.properties_in"), true);
        let outlet_state = SeawaterState::new(pool, &format!("{name}.properties_out"), false);
        let inlet = Port::new(format!("{name}.inlet"), inlet_state.port_members());
        let outlet = Port::new(format!("{name}.outlet"), outlet_state.port_members());

        let deltap = pool.add_bounded(format!("{name}.deltaP"), 1e5, Some(0.0), None);
        let efficiency =
            pool.add_bounded(format!("{name}.efficiency_pump"), 0.75, Some(1e-8), Some(1.0));
        let work_mechanical =
            pool.add_bounded(format!("{name}.work_mechanical"), 1e3, Some(0.0), None);

        // An energy-recovery device runs in reverse: pressure drop across
        // the unit and shaft work extracted from the stream.
        if pump_type == PumpType::PressureExchanger {
            pool.set_lower(deltap, None);
            pool.set_lower(work_mechanical, None);
        }

        let mut system = EquationSystem::new(pool);
        system.add_vars(inlet_state.state_vars());
        system.add_vars(outlet_state.state_vars());
        system.add_vars([deltap, efficiency, work_mechanical]);

        for (label, src, dst) in [
            ("H2O", inlet_state.flow_mass_h2o, outlet_state.flow_mass_h2o),
            ("TDS", inlet_state.flow_mass_tds, outlet_state.flow_mass_tds),
        ] {
            system.add_constraint(format!("{name}.mass_balance[{label}]"), move |p| {
                p.get(src) - p.get(dst)
            });
        }
        {
            let (t_in, t_out) = (inlet_state.temperature, outlet_state.temperature);
            system.add_constraint(format!("{name}.isothermal"), move |p| {
                p.get(t_out) - p.get(t_in)
            });
        }
        {
            let (p_in, p_out) = (inlet_state.pressure, outlet_state.pressure);
            system.add_constraint(format!("{name}.pressure_rise"), move |p| {
                p.get(p_out) - p.get(p_in) - p.get(deltap)
            });
        }
        {
            let state = inlet_state.clone();
            let model = Rc::clone(&model);
            system.add_constraint(format!("{name}.work_mechanical_equation"), move |p| {
                let flow_vol = state.flow_vol(p, model.as_ref());
                p.get(work_mechanical) * p.get(efficiency) - flow_vol * p.get(deltap)
            });
        }

        Self {
            name: name.to_string(),
            pool: pool.clone(),
            pump_type,
            model,
            inlet_state,
            outlet_state,
            inlet,
            outlet,
            deltap,
            efficiency,
            work_mechanical,
            system,
            costing: None,
        }
    }

    /// Service class of this pump.
    #[must_use]
    pub fn pump_type(&self) -> PumpType {
        self.pump_type
    }

    /// Inlet port.
    #[must_use]
    pub fn inlet(&self) -> &Port {
        &self.inlet
    }

    /// Outlet port.
    #[must_use]
    pub fn outlet(&self) -> &Port {
        &self.outlet
    }

    /// Inlet state block.
    #[must_use]
    pub fn inlet_state(&self) -> &SeawaterState {
        &self.inlet_state
    }

    /// Outlet state block.
    #[must_use]
    pub fn outlet_state(&self) -> &SeawaterState {
        &self.outlet_state
    }

    /// Attaches capital and operating cost relations. Idempotent.
    ///
    /// High-pressure and centrifugal pumps cost capital proportionally to
    /// mechanical work. A pump paired with a pressure exchanger follows the
    /// energy-recovery-device power-law capital correlation instead. All
    /// three operate on purchased electricity; in the energy-recovery case
    /// the work term is negative, so the operating-cost lower bound is
    /// relaxed.
    pub fn add_costing(&mut self, params: &Rc<CostingParams>) {
        if self.costing.is_some() {
            return;
        }
        let block = CostingBlock::make_vars(&self.pool, &format!("{}.costing", self.name));
        let name = &self.name;
        let work = self.work_mechanical;

        match self.pump_type {
            PumpType::HighPressure | PumpType::Centrifugal => {
                let unit_cost = if self.pump_type == PumpType::HighPressure {
                    params.high_pressure_pump_cost
                } else {
                    params.centrifugal_pump_cost
                };
                let capital = block.capital_cost;
                self.system
                    .add_constraint(format!("{name}.costing.capital_cost_equation"), move |p| {
                        p.get(capital) - unit_cost * p.get(work)
                    });

                let operating = block.operating_cost;
                let annual_kwh_rate =
                    24.0 * 365.0 * params.load_factor * params.electricity_cost / 1000.0;
                self.system.add_constraint(
                    format!("{name}.costing.operating_cost_equation"),
                    move |p| p.get(operating) - p.get(work) * annual_kwh_rate,
                );
            }
            PumpType::PressureExchanger => {
                let a = params.erd_pump_cost_a;
                let b = params.erd_pump_cost_b;
                let state = self.inlet_state.clone();
                let model = Rc::clone(&self.model);

                let capital = block.capital_cost;
                self.system
                    .add_constraint(format!("{name}.costing.capital_cost_equation"), move |p| {
                        let q_hourly = state.flow_vol(p, model.as_ref()) * 3600.0;
                        p.get(capital) - a * q_hourly.powf(b)
                    });

                // Recovered work makes the electricity term negative.
                self.pool.set_lower(block.operating_cost, Some(-1e6));
                let operating = block.operating_cost;
                let annual_kwh_rate =
                    24.0 * 365.0 * params.load_factor * params.electricity_cost / 1000.0;
                self.system.add_constraint(
                    format!("{name}.costing.operating_cost_equation"),
                    move |p| p.get(operating) - p.get(work) * annual_kwh_rate,
                );
            }
        }
        self.system
            .add_vars([block.capital_cost, block.operating_cost]);
        self.costing = Some(block);
    }
}

impl UnitModel for Pump {
    fn name(&self) -> &str {
        &self.name
    }

    fn equations(&self) -> &EquationSystem {
        &self.system
    }

    fn initialize(
        &mut self,
        solver: &dyn SolverAdapter,
        options: &SolverOptions,
    ) -> InitializeOutcome {
        let flags = self.inlet_state.initialize(None, true);
        let args = StateArgs::from_state(&self.pool, &self.inlet_state);
        self.outlet_state.initialize(Some(&args), false);

        let report = solver.solve(&self.system, options);

        if let Some(flags) = flags {
            release_state(&self.pool, flags);
        }
        report.into()
    }

    fn calculate_scaling_factors(&mut self) {
        for state in [&self.inlet_state, &self.outlet_state] {
            for id in state.state_vars() {
                set_scaling_from_value(&self.pool, id);
            }
        }
        for id in [self.deltap, self.efficiency, self.work_mechanical] {
            set_scaling_from_value(&self.pool, id);
        }
    }

    fn costing(&self) -> Option<&CostingBlock> {
        self.costing.as_ref()
    }

    fn performance_contents(&self) -> PerformanceContents {
        let mut contents = PerformanceContents::default();
        contents.push_var("Mechanical Work", &self.pool, self.work_mechanical);
        contents.push_var("Pressure Change", &self.pool, self.deltap);
        contents.push_var("Efficiency", &self.pool, self.efficiency);
        contents
    }

    fn stream_table(&self) -> StreamTable {
        let pool = &self.pool;
        let states = [&self.inlet_state, &self.outlet_state];
        StreamTable {
            columns: vec!["Inlet".into(), "Outlet".into()],
            rows: vec![
                StreamRow {
                    label: "Volumetric Flowrate".into(),
                    values: states
                        .iter()
                        .map(|s| s.flow_vol(pool, self.model.as_ref()))
                        .collect(),
                },
                StreamRow {
                    label: "Mass Concentration TDS".into(),
                    values: states
                        .iter()
                        .map(|s| s.conc_mass_tds(pool, self.model.as_ref()))
                        .collect(),
                },
                StreamRow {
                    label: "Pressure".into(),
                    values: states.iter().map(|s| pool.get(s.pressure)).collect(),
                },
            ],
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::solver::NewtonSolver;
    use crate::properties::seawater::SimpleSeawater;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn build_pump(pump_type: PumpType) -> (VarPool, Pump) {
        let pool = VarPool::new();
        let pump = Pump::build(&pool, "fs.pump", pump_type, Rc::new(SimpleSeawater));
        (pool, pump)
    }

    fn specify_feed(pool: &VarPool, pump: &Pump) {
        pool.fix_at(pump.inlet_state().flow_mass_h2o, 0.965);
        pool.fix_at(pump.inlet_state().flow_mass_tds, 0.035);
        pool.fix_at(pump.inlet_state().temperature, 298.15);
        pool.fix_at(pump.inlet_state().pressure, 101325.0);
        pool.fix_at(pump.deltap, 50e5);
        pool.fix_at(pump.efficiency, 0.8);
    }

    #[test]
    fn work_follows_flow_and_pressure_rise() {
        let (pool, mut pump) = build_pump(PumpType::HighPressure);
        specify_feed(&pool, &pump);
        assert_eq!(pump.equations().degrees_of_freedom(), 0);

        pump.calculate_scaling_factors();
        let outcome = pump.initialize(&NewtonSolver::new(), &SolverOptions::default());
        assert!(outcome.status.is_optimal());

        let q = pump.inlet_state().flow_vol(&pool, &SimpleSeawater);
        assert_relative_eq!(
            pool.get(pump.work_mechanical),
            q * 50e5 / 0.8,
            max_relative = 1e-8
        );
        assert_abs_diff_eq!(
            pool.get(pump.outlet_state().pressure),
            101325.0 + 50e5,
            epsilon = 1.0
        );
        assert_abs_diff_eq!(pool.get(pump.outlet_state().temperature), 298.15, epsilon = 1e-8);
    }

    #[test]
    fn costing_attachment_is_idempotent() {
        let (_pool, mut pump) = build_pump(PumpType::HighPressure);
        let params = Rc::new(CostingParams::default());
        pump.add_costing(&params);
        let constraints = pump.equations().num_constraints();
        pump.add_costing(&params);
        assert_eq!(pump.equations().num_constraints(), constraints);
        assert!(pump.costing().is_some());
    }

    #[test]
    fn high_pressure_costing_scales_with_work() {
        let (pool, mut pump) = build_pump(PumpType::HighPressure);
        specify_feed(&pool, &pump);
        let params = Rc::new(CostingParams::default());
        pump.add_costing(&params);

        pump.calculate_scaling_factors();
        let outcome = pump.initialize(&NewtonSolver::new(), &SolverOptions::default());
        assert!(outcome.status.is_optimal());

        let work = pool.get(pump.work_mechanical);
        let block = pump.costing().unwrap();
        assert_relative_eq!(
            pool.get(block.capital_cost),
            params.high_pressure_pump_cost * work,
            max_relative = 1e-8
        );
        assert_relative_eq!(
            pool.get(block.operating_cost),
            work * 24.0 * 365.0 * 0.9 * 0.07 / 1000.0,
            max_relative = 1e-8
        );
    }

    #[test]
    fn energy_recovery_pump_operating_cost_goes_negative() {
        let (pool, mut pump) = build_pump(PumpType::PressureExchanger);
        pool.fix_at(pump.inlet_state().flow_mass_h2o, 0.965);
        pool.fix_at(pump.inlet_state().flow_mass_tds, 0.035);
        pool.fix_at(pump.inlet_state().temperature, 298.15);
        pool.fix_at(pump.inlet_state().pressure, 65e5);
        // Letting the brine down recovers work.
        pool.fix_at(pump.deltap, -60e5);
        pool.fix_at(pump.efficiency, 0.95);
        let params = Rc::new(CostingParams::default());
        pump.add_costing(&params);
        let block = *pump.costing().unwrap();
        assert_eq!(pool.bounds(block.operating_cost).0, Some(-1e6));

        pump.calculate_scaling_factors();
        let outcome = pump.initialize(&NewtonSolver::new(), &SolverOptions::default());
        assert!(outcome.status.is_optimal());

        let work = pool.get(pump.work_mechanical);
        assert!(work < 0.0);
        let operating = pool.get(block.operating_cost);
        assert!(operating < 0.0);
        assert_relative_eq!(
            operating,
            work * 24.0 * 365.0 * 0.9 * 0.07 / 1000.0,
            max_relative = 1e-8
        );

        // Capital still follows the power-law flow correlation.
        let q_hourly = pump.inlet_state().flow_vol(&pool, &SimpleSeawater) * 3600.0;
        assert_relative_eq!(
            pool.get(block.capital_cost),
            params.erd_pump_cost_a * q_hourly.powf(params.erd_pump_cost_b),
            max_relative = 1e-8
        );
    }
}
