//! Single-effect evaporator unit model.
//!
//! A seawater feed is split into a concentrated brine held at its boiling
//! point and a water vapor overhead in equilibrium with it. The brine
//! operating pressure is tied to the saturation pressure at the brine
//! temperature, and the vapor leaves at the brine temperature and pressure.
//! The heat duty closes the enthalpy balance.

use std::any::Any;
use std::rc::Rc;

use uom::si::f64::ThermodynamicTemperature;
use uom::si::pressure::pascal;
use uom::si::thermodynamic_temperature::kelvin;

use crate::core::port::Port;
use crate::core::report::{PerformanceContents, StreamRow, StreamTable};
use crate::core::scaling::{constraint_scaling_transform, set_scaling_from_value};
use crate::core::solver::{ConstraintId, EquationSystem, SolverAdapter, SolverOptions};
use crate::core::state::{StateArgs, StateBlock, release_state};
use crate::core::variable::{VarId, VarPool};
use crate::models::{InitializeOutcome, UnitModel};
use crate::properties::seawater::{SeawaterPropertyModel, SeawaterState};
use crate::properties::vapor::{VaporPropertyModel, VaporState};
use crate::support::constraint::StrictlyPositive;

/// Single-effect evaporator.
pub struct Evaporator {
    name: String,
    pool: VarPool,
    seawater_model: Rc<dyn SeawaterPropertyModel>,
    vapor_model: Rc<dyn VaporPropertyModel>,
    feed_state: SeawaterState,
    brine_state: SeawaterState,
    vapor_state: VaporState,
    inlet_feed: Port,
    outlet_brine: Port,
    outlet_vapor: Port,
    /// Heat duty, W.
    pub heat_transfer: VarId,
    energy_balance: ConstraintId,
    system: EquationSystem,
}

impl Evaporator {
    /// Builds the evaporator and registers its constraints.
    pub fn build(
        pool: &VarPool,
        name: &str,
        seawater_model: Rc<dyn SeawaterPropertyModel>,
        vapor_model: Rc<dyn VaporPropertyModel>,
    ) -> Self {
        let feed_state = SeawaterState::new(pool, &format!("{name}.properties_feed"), true);
        let brine_state = SeawaterState::new(pool, &format!("{name}.properties_brine"), false);
        let vapor_state = VaporState::new(pool, &format!("{name}.properties_vapor"), false);

        // The overhead's liquid phase is degenerate; pin it at its bound.
        pool.fix(vapor_state.flow_mass_liq);

        let inlet_feed = Port::new(format!("{name}.inlet_feed"), feed_state.port_members());
        let outlet_brine = Port::new(format!("{name}.outlet_brine"), brine_state.port_members());
        let outlet_vapor = Port::new(format!("{name}.outlet_vapor"), vapor_state.port_members());

        let heat_transfer = pool.add(format!("{name}.heat_transfer"), 0.0);

        let mut system = EquationSystem::new(pool);
        system.add_vars(feed_state.state_vars());
        system.add_vars(brine_state.state_vars());
        system.add_vars(vapor_state.state_vars());
        system.add_var(heat_transfer);

        {
            let (f, b) = (feed_state.flow_mass_tds, brine_state.flow_mass_tds);
            system.add_constraint(format!("{name}.mass_balance[TDS]"), move |p| {
                p.get(f) - p.get(b)
            });
        }
        {
            let f = feed_state.flow_mass_h2o;
            let b = brine_state.flow_mass_h2o;
            let (liq, vap) = (vapor_state.flow_mass_liq, vapor_state.flow_mass_vap);
            system.add_constraint(format!("{name}.mass_balance[H2O]"), move |p| {
                p.get(f) - p.get(b) - p.get(liq) - p.get(vap)
            });
        }
        let energy_balance = {
            let feed = feed_state.clone();
            let brine = brine_state.clone();
            let vapor = vapor_state.clone();
            let sw = Rc::clone(&seawater_model);
            let vp = Rc::clone(&vapor_model);
            system.add_constraint(format!("{name}.energy_balance"), move |p| {
                feed.enth_flow(p, sw.as_ref()) + p.get(heat_transfer)
                    - brine.enth_flow(p, sw.as_ref())
                    - vapor.enth_flow_vapor(p, vp.as_ref())
            })
        };
        {
            let (t_brine, p_brine) = (brine_state.temperature, brine_state.pressure);
            let sw = Rc::clone(&seawater_model);
            system.add_constraint(format!("{name}.brine_saturation_pressure"), move |p| {
                let t = ThermodynamicTemperature::new::<kelvin>(p.get(t_brine));
                p.get(p_brine) - sw.saturation_pressure(t).get::<pascal>()
            });
        }
        {
            let (t_vapor, t_brine) = (vapor_state.temperature, brine_state.temperature);
            system.add_constraint(format!("{name}.vapor_temperature"), move |p| {
                p.get(t_vapor) - p.get(t_brine)
            });
        }
        {
            let (p_vapor, p_brine) = (vapor_state.pressure, brine_state.pressure);
            system.add_constraint(format!("{name}.vapor_pressure"), move |p| {
                p.get(p_vapor) - p.get(p_brine)
            });
        }

        Self {
            name: name.to_string(),
            pool: pool.clone(),
            seawater_model,
            vapor_model,
            feed_state,
            brine_state,
            vapor_state,
            inlet_feed,
            outlet_brine,
            outlet_vapor,
            heat_transfer,
            energy_balance,
            system,
        }
    }

    /// Feed inlet port.
    #[must_use]
    pub fn inlet_feed(&self) -> &Port {
        &self.inlet_feed
    }

    /// Brine outlet port.
    #[must_use]
    pub fn outlet_brine(&self) -> &Port {
        &self.outlet_brine
    }

    /// Vapor outlet port.
    #[must_use]
    pub fn outlet_vapor(&self) -> &Port {
        &self.outlet_vapor
    }

    /// Feed state block.
    #[must_use]
    pub fn feed_state(&self) -> &SeawaterState {
        &self.feed_state
    }

    /// Brine state block.
    #[must_use]
    pub fn brine_state(&self) -> &SeawaterState {
        &self.brine_state
    }

    /// Vapor state block.
    #[must_use]
    pub fn vapor_state(&self) -> &VaporState {
        &self.vapor_state
    }
}

impl UnitModel for Evaporator {
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
        let flags = self.feed_state.initialize(None, true);

        let args = StateArgs::from_state(&self.pool, &self.feed_state);
        self.brine_state.initialize(Some(&args), false);

        // The vapor overhead cannot be seeded by copying the feed: its
        // members differ. Start from all feed water taken overhead at feed
        // temperature and pressure, with the degenerate liquid phase at its
        // bound.
        let mut vapor_args = StateArgs::new();
        if let Some(lower) = self.pool.lower(self.vapor_state.flow_mass_liq) {
            vapor_args.insert("flow_mass_liq", lower);
        }
        if let Some(h2o) = args.get("flow_mass_H2O") {
            vapor_args.insert("flow_mass_vap", h2o);
        }
        if let Some(t) = args.get("temperature") {
            vapor_args.insert("temperature", t);
        }
        if let Some(p) = args.get("pressure") {
            vapor_args.insert("pressure", p);
        }
        self.vapor_state.initialize(Some(&vapor_args), false);

        let report = solver.solve(&self.system, options);

        if let Some(flags) = flags {
            release_state(&self.pool, flags);
        }
        report.into()
    }

    fn calculate_scaling_factors(&mut self) {
        for id in self
            .feed_state
            .state_vars()
            .into_iter()
            .chain(self.brine_state.state_vars())
            .chain(self.vapor_state.state_vars())
        {
            set_scaling_from_value(&self.pool, id);
        }

        // The heat duty starts at zero, so its scale cannot come from its own
        // magnitude; derive it from the vapor enthalpy flow it balances, and
        // scale the energy balance to match.
        if self.pool.scaling(self.heat_transfer).is_none() {
            let magnitude = self
                .vapor_state
                .enth_flow_vapor(&self.pool, self.vapor_model.as_ref())
                .abs();
            if magnitude.is_finite() && magnitude > 0.0 {
                let factor = 10f64.powi(-magnitude.log10().round() as i32);
                if let Ok(factor) = StrictlyPositive::new(factor) {
                    let value = factor.into_inner();
                    self.pool.set_scaling(self.heat_transfer, factor);
                    constraint_scaling_transform(&self.system, self.energy_balance, value);
                }
            }
        }
    }

    fn performance_contents(&self) -> PerformanceContents {
        let mut contents = PerformanceContents::default();
        contents.push_var("Heat Duty", &self.pool, self.heat_transfer);
        contents
    }

    fn stream_table(&self) -> StreamTable {
        let pool = &self.pool;
        let feed = &self.feed_state;
        let brine = &self.brine_state;
        let vapor = &self.vapor_state;
        StreamTable {
            columns: vec!["Feed".into(), "Brine".into(), "Vapor".into()],
            rows: vec![
                StreamRow {
                    label: "Mass Flow H2O".into(),
                    values: vec![
                        pool.get(feed.flow_mass_h2o),
                        pool.get(brine.flow_mass_h2o),
                        pool.get(vapor.flow_mass_vap),
                    ],
                },
                StreamRow {
                    label: "Mass Flow TDS".into(),
                    values: vec![
                        pool.get(feed.flow_mass_tds),
                        pool.get(brine.flow_mass_tds),
                        0.0,
                    ],
                },
                StreamRow {
                    label: "Temperature".into(),
                    values: [feed.temperature, brine.temperature, vapor.temperature]
                        .iter()
                        .map(|id| pool.get(*id))
                        .collect(),
                },
                StreamRow {
                    label: "Pressure".into(),
                    values: [feed.pressure, brine.pressure, vapor.pressure]
                        .iter()
                        .map(|id| pool.get(*id))
                        .collect(),
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
