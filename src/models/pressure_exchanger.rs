//! Isobaric pressure exchanger unit model.
//!
//! Transfers pressure from a high-pressure brine stream to a low-pressure
//! feed stream at equal volumetric flow. With transfer efficiency `η`:
//!
//! ```text
//! P_low_out  = P_low_in + η · (P_high_in − P_high_out)
//! P_high_out = P_low_in
//! ```

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

/// Rotary pressure exchanger.
pub struct PressureExchanger {
    name: String,
    pool: VarPool,
    model: Rc<dyn SeawaterPropertyModel>,
    high_in_state: SeawaterState,
    high_out_state: SeawaterState,
    low_in_state: SeawaterState,
    low_out_state: SeawaterState,
    high_pressure_inlet: Port,
    high_pressure_outlet: Port,
    low_pressure_inlet: Port,
    low_pressure_outlet: Port,
    /// Pressure transfer efficiency.
    pub efficiency: VarId,
    system: EquationSystem,
    costing: Option<CostingBlock>,
}

impl PressureExchanger {
    /// Builds the exchanger and registers its constraints.
    pub fn build(pool: &VarPool, name: &str, model: Rc<dyn SeawaterPropertyModel>) -> Self {
        let high_in_state =
            SeawaterState::new(pool, &format!("{name}.high_pressure_side.properties_in"), true);
        let high_out_state =
            SeawaterState::new(pool, &format!("{name}.high_pressure_side.properties_out"), false);
        // The low-side inlet water flow is determined by the equal-flow
        // coupling, so the low side is not a defined feed state.
        let low_in_state =
            SeawaterState::new(pool, &format!("{name}.low_pressure_side.properties_in"), false);
        let low_out_state =
            SeawaterState::new(pool, &format!("{name}.low_pressure_side.properties_out"), false);

        let high_pressure_inlet =
            Port::new(format!("{name}.high_pressure_inlet"), high_in_state.port_members());
        let high_pressure_outlet =
            Port::new(format!("{name}.high_pressure_outlet"), high_out_state.port_members());
        let low_pressure_inlet =
            Port::new(format!("{name}.low_pressure_inlet"), low_in_state.port_members());
        let low_pressure_outlet =
            Port::new(format!("{name}.low_pressure_outlet"), low_out_state.port_members());

        let efficiency = pool.add_bounded(
            format!("{name}.efficiency_pressure_exchanger"),
            0.95,
            Some(1e-8),
            Some(1.0),
        );

        let mut system = EquationSystem::new(pool);
        for state in [&high_in_state, &high_out_state, &low_in_state, &low_out_state] {
            system.add_vars(state.state_vars());
        }
        system.add_var(efficiency);

        for (side, s_in, s_out) in [
            ("high_pressure_side", &high_in_state, &high_out_state),
            ("low_pressure_side", &low_in_state, &low_out_state),
        ] {
            for (label, src, dst) in [
                ("H2O", s_in.flow_mass_h2o, s_out.flow_mass_h2o),
                ("TDS", s_in.flow_mass_tds, s_out.flow_mass_tds),
            ] {
                system.add_constraint(format!("{name}.{side}.mass_balance[{label}]"), move |p| {
                    p.get(src) - p.get(dst)
                });
            }
            let (t_in, t_out) = (s_in.temperature, s_out.temperature);
            system.add_constraint(format!("{name}.{side}.isothermal"), move |p| {
                p.get(t_out) - p.get(t_in)
            });
        }

        {
            let (high, low) = (high_in_state.clone(), low_in_state.clone());
            let model = Rc::clone(&model);
            system.add_constraint(format!("{name}.equal_flow_vol"), move |p| {
                low.flow_vol(p, model.as_ref()) - high.flow_vol(p, model.as_ref())
            });
        }
        {
            let (p_high_out, p_low_in) = (high_out_state.pressure, low_in_state.pressure);
            system.add_constraint(format!("{name}.high_pressure_outlet_pressure"), move |p| {
                p.get(p_high_out) - p.get(p_low_in)
            });
        }
        {
            let p_high_in = high_in_state.pressure;
            let p_high_out = high_out_state.pressure;
            let p_low_in = low_in_state.pressure;
            let p_low_out = low_out_state.pressure;
            system.add_constraint(format!("{name}.pressure_transfer"), move |p| {
                p.get(p_low_out)
                    - p.get(p_low_in)
                    - p.get(efficiency) * (p.get(p_high_in) - p.get(p_high_out))
            });
        }

        Self {
            name: name.to_string(),
            pool: pool.clone(),
            model,
            high_in_state,
            high_out_state,
            low_in_state,
            low_out_state,
            high_pressure_inlet,
            high_pressure_outlet,
            low_pressure_inlet,
            low_pressure_outlet,
            efficiency,
            system,
            costing: None,
        }
    }

    /// High-pressure-side inlet port.
    #[must_use]
    pub fn high_pressure_inlet(&self) -> &Port {
        &self.high_pressure_inlet
    }

    /// High-pressure-side outlet port.
    #[must_use]
    pub fn high_pressure_outlet(&self) -> &Port {
        &self.high_pressure_outlet
    }

    /// Low-pressure-side inlet port.
    #[must_use]
    pub fn low_pressure_inlet(&self) -> &Port {
        &self.low_pressure_inlet
    }

    /// Low-pressure-side outlet port.
    #[must_use]
    pub fn low_pressure_outlet(&self) -> &Port {
        &self.low_pressure_outlet
    }

    /// High-pressure-side inlet state.
    #[must_use]
    pub fn high_in_state(&self) -> &SeawaterState {
        &self.high_in_state
    }

    /// Low-pressure-side inlet state.
    #[must_use]
    pub fn low_in_state(&self) -> &SeawaterState {
        &self.low_in_state
    }

    /// Low-pressure-side outlet state.
    #[must_use]
    pub fn low_out_state(&self) -> &SeawaterState {
        &self.low_out_state
    }

    /// Attaches costing: capital proportional to low-pressure-side hourly
    /// flow, zero operating cost. Idempotent.
    pub fn add_costing(&mut self, params: &Rc<CostingParams>) {
        if self.costing.is_some() {
            return;
        }
        let block = CostingBlock::make_vars(&self.pool, &format!("{}.costing", self.name));
        let name = &self.name;

        let unit_cost = params.pressure_exchanger_cost;
        let state = self.low_in_state.clone();
        let model = Rc::clone(&self.model);
        let capital = block.capital_cost;
        self.system
            .add_constraint(format!("{name}.costing.capital_cost_equation"), move |p| {
                p.get(capital) - unit_cost * state.flow_vol(p, model.as_ref()) * 3600.0
            });

        let operating = block.operating_cost;
        self.system.add_constraint(
            format!("{name}.costing.operating_cost_equation"),
            move |p| p.get(operating),
        );

        self.system
            .add_vars([block.capital_cost, block.operating_cost]);
        self.costing = Some(block);
    }
}

impl UnitModel for PressureExchanger {
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
        let flags = self.high_in_state.initialize(None, true);

        let high_args = StateArgs::from_state(&self.pool, &self.high_in_state);
        let low_args = StateArgs::from_state(&self.pool, &self.low_in_state);
        self.high_out_state.initialize(Some(&high_args), false);
        self.low_out_state.initialize(Some(&low_args), false);

        let report = solver.solve(&self.system, options);

        if let Some(flags) = flags {
            release_state(&self.pool, flags);
        }
        report.into()
    }

    fn calculate_scaling_factors(&mut self) {
        for state in [
            &self.high_in_state,
            &self.high_out_state,
            &self.low_in_state,
            &self.low_out_state,
        ] {
            for id in state.state_vars() {
                set_scaling_from_value(&self.pool, id);
            }
        }
        set_scaling_from_value(&self.pool, self.efficiency);
    }

    fn costing(&self) -> Option<&CostingBlock> {
        self.costing.as_ref()
    }

    fn performance_contents(&self) -> PerformanceContents {
        let mut contents = PerformanceContents::default();
        contents.push_var("Pressure Transfer Efficiency", &self.pool, self.efficiency);
        contents
    }

    fn stream_table(&self) -> StreamTable {
        let pool = &self.pool;
        let states = [
            &self.high_in_state,
            &self.high_out_state,
            &self.low_in_state,
            &self.low_out_state,
        ];
        StreamTable {
            columns: vec![
                "HP Inlet".into(),
                "HP Outlet".into(),
                "LP Inlet".into(),
                "LP Outlet".into(),
            ],
            rows: vec![
                StreamRow {
                    label: "Volumetric Flowrate".into(),
                    values: states
                        .iter()
                        .map(|s| s.flow_vol(pool, self.model.as_ref()))
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

    fn specified_exchanger() -> (VarPool, PressureExchanger) {
        let pool = VarPool::new();
        let px = PressureExchanger::build(&pool, "fs.px", Rc::new(SimpleSeawater));

        // High-pressure brine from the membrane retentate.
        pool.fix_at(px.high_in_state().flow_mass_h2o, 0.55);
        pool.fix_at(px.high_in_state().flow_mass_tds, 0.033);
        pool.fix_at(px.high_in_state().temperature, 298.15);
        pool.fix_at(px.high_in_state().pressure, 65e5);

        // Fresh feed on the low-pressure side; its water flow floats to meet
        // the equal-volumetric-flow coupling.
        pool.fix_at(px.low_in_state().flow_mass_tds, 0.021);
        pool.fix_at(px.low_in_state().temperature, 298.15);
        pool.fix_at(px.low_in_state().pressure, 101325.0);
        pool.fix_at(px.efficiency, 0.95);
        (pool, px)
    }

    #[test]
    fn pressure_transfer_with_equal_volumetric_flow() {
        let (pool, mut px) = specified_exchanger();
        assert_eq!(px.equations().degrees_of_freedom(), 0);

        px.calculate_scaling_factors();
        let outcome = px.initialize(&NewtonSolver::new(), &SolverOptions::default());
        assert!(outcome.status.is_optimal());

        let model = SimpleSeawater;
        assert_relative_eq!(
            px.low_in_state().flow_vol(&pool, &model),
            px.high_in_state().flow_vol(&pool, &model),
            max_relative = 1e-8
        );
        let expected = 101325.0 + 0.95 * (65e5 - 101325.0);
        assert_abs_diff_eq!(pool.get(px.low_out_state().pressure), expected, epsilon = 1.0);
    }

    #[test]
    fn costing_has_zero_operating_cost() {
        let (pool, mut px) = specified_exchanger();
        let params = Rc::new(CostingParams::default());
        px.add_costing(&params);
        px.add_costing(&params); // second call is a no-op

        px.calculate_scaling_factors();
        let outcome = px.initialize(&NewtonSolver::new(), &SolverOptions::default());
        assert!(outcome.status.is_optimal());

        let block = px.costing().unwrap();
        let q_hourly = px.low_in_state().flow_vol(&pool, &SimpleSeawater) * 3600.0;
        assert_relative_eq!(
            pool.get(block.capital_cost),
            535.0 * q_hourly,
            max_relative = 1e-8
        );
        assert_abs_diff_eq!(pool.get(block.operating_cost), 0.0, epsilon = 1e-8);
    }
}
