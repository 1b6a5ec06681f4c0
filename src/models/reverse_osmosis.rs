//! Zero-dimensional membrane separation (reverse osmosis / nanofiltration).
//!
//! Solution-diffusion transport over a lumped membrane area:
//!
//! ```text
//! Jw = A · ρw · (ΔP − Δπ)      water flux, kg/(m²·s)
//! Js = B · ΔC                  solute flux, kg/(m²·s)
//! ```
//!
//! with the feed-side driving forces evaluated at the average of inlet and
//! retentate conditions.

use std::any::Any;
use std::rc::Rc;

use uom::si::f64::{MassDensity, ThermodynamicTemperature};
use uom::si::mass_density::kilogram_per_cubic_meter;
use uom::si::pressure::pascal;
use uom::si::thermodynamic_temperature::kelvin;

use crate::core::port::Port;
use crate::core::report::{PerformanceContents, StreamRow, StreamTable};
use crate::core::scaling::set_scaling_from_value;
use crate::core::solver::{EquationSystem, SolverAdapter, SolverOptions};
use crate::core::state::{StateArgs, StateBlock, release_state};
use crate::core::variable::{VarId, VarPool};
use crate::costing::{CostingBlock, CostingParams};
use crate::models::{InitializeOutcome, UnitModel};
use crate::properties::seawater::{SeawaterPropertyModel, SeawaterState};

/// Density of permeating water, kg/m³.
const PERMEATE_DENSITY: f64 = 1000.0;

/// Membrane class; selects the costing basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembraneType {
    /// High-rejection seawater membrane.
    ReverseOsmosis,

    /// Loose membrane for partial softening.
    Nanofiltration,
}

/// 0D membrane unit.
///
/// A typical specification fixes the feed state, membrane `area`, the
/// permeability coefficients `a_comp` and `b_comp`, and the permeate
/// pressure, leaving the retentate, permeate, and fluxes to the solve.
pub struct ReverseOsmosis0D {
    name: String,
    pool: VarPool,
    membrane_type: MembraneType,
    model: Rc<dyn SeawaterPropertyModel>,
    feed_state: SeawaterState,
    retentate_state: SeawaterState,
    permeate_state: SeawaterState,
    inlet: Port,
    retentate: Port,
    permeate: Port,
    /// Membrane area, m².
    pub area: VarId,
    /// Water permeability coefficient, m/(s·Pa).
    pub a_comp: VarId,
    /// Solute permeability coefficient, m/s.
    pub b_comp: VarId,
    /// Water flux, kg/(m²·s).
    pub flux_mass_h2o: VarId,
    /// Solute flux, kg/(m²·s).
    pub flux_mass_tds: VarId,
    system: EquationSystem,
    costing: Option<CostingBlock>,
}

impl ReverseOsmosis0D {
    /// Builds the unit and registers its constraints.
    pub fn build(
        pool: &VarPool,
        name: &str,
        membrane_type: MembraneType,
        model: Rc<dyn SeawaterPropertyModel>,
    ) -> Self {
        let feed_state = SeawaterState::new(pool, &format!("{name}.feed_side.properties_in"), true);
        let retentate_state =
            SeawaterState::new(pool, &format!("{name}.feed_side.properties_out"), false);
        let permeate_state =
            SeawaterState::new(pool, &format!("{name}.properties_permeate"), false);

        let inlet = Port::new(format!("{name}.inlet"), feed_state.port_members());
        let retentate = Port::new(format!("{name}.retentate"), retentate_state.port_members());
        let permeate = Port::new(format!("{name}.permeate"), permeate_state.port_members());

        let area = pool.add_bounded(format!("{name}.area"), 50.0, Some(1e-1), None);
        let a_comp = pool.add_bounded(format!("{name}.A_comp"), 4.2e-12, Some(1e-14), None);
        let b_comp = pool.add_bounded(format!("{name}.B_comp"), 3.5e-8, Some(1e-10), None);
        let flux_mass_h2o =
            pool.add_bounded(format!("{name}.flux_mass_H2O"), 5e-3, Some(0.0), None);
        let flux_mass_tds =
            pool.add_bounded(format!("{name}.flux_mass_TDS"), 1e-6, Some(0.0), None);

        let mut system = EquationSystem::new(pool);
        for state in [&feed_state, &retentate_state, &permeate_state] {
            system.add_vars(state.state_vars());
        }
        system.add_vars([area, a_comp, b_comp, flux_mass_h2o, flux_mass_tds]);

        {
            let feed = feed_state.clone();
            let ret = retentate_state.clone();
            let perm = permeate_state.clone();
            let model = Rc::clone(&model);
            system.add_constraint(format!("{name}.water_flux_equation"), move |p| {
                let t = ThermodynamicTemperature::new::<kelvin>(p.get(feed.temperature));
                let conc_avg = 0.5
                    * (feed.conc_mass_tds(p, model.as_ref())
                        + ret.conc_mass_tds(p, model.as_ref()));
                let pi_feed = model
                    .osmotic_pressure(t, MassDensity::new::<kilogram_per_cubic_meter>(conc_avg))
                    .get::<pascal>();
                let pi_perm = model
                    .osmotic_pressure(
                        t,
                        MassDensity::new::<kilogram_per_cubic_meter>(
                            perm.conc_mass_tds(p, model.as_ref()),
                        ),
                    )
                    .get::<pascal>();
                let delta_p = p.get(feed.pressure) - p.get(perm.pressure);
                p.get(flux_mass_h2o)
                    - p.get(a_comp) * PERMEATE_DENSITY * (delta_p - (pi_feed - pi_perm))
            });
        }
        {
            let feed = feed_state.clone();
            let ret = retentate_state.clone();
            let perm = permeate_state.clone();
            let model = Rc::clone(&model);
            system.add_constraint(format!("{name}.solute_flux_equation"), move |p| {
                let conc_avg = 0.5
                    * (feed.conc_mass_tds(p, model.as_ref())
                        + ret.conc_mass_tds(p, model.as_ref()));
                let conc_perm = perm.conc_mass_tds(p, model.as_ref());
                p.get(flux_mass_tds) - p.get(b_comp) * (conc_avg - conc_perm)
            });
        }
        for (label, flux, perm_flow) in [
            ("H2O", flux_mass_h2o, permeate_state.flow_mass_h2o),
            ("TDS", flux_mass_tds, permeate_state.flow_mass_tds),
        ] {
            system.add_constraint(format!("{name}.permeate_production[{label}]"), move |p| {
                p.get(perm_flow) - p.get(flux) * p.get(area)
            });
        }
        for (label, f, r, m) in [
            (
                "H2O",
                feed_state.flow_mass_h2o,
                retentate_state.flow_mass_h2o,
                permeate_state.flow_mass_h2o,
            ),
            (
                "TDS",
                feed_state.flow_mass_tds,
                retentate_state.flow_mass_tds,
                permeate_state.flow_mass_tds,
            ),
        ] {
            system.add_constraint(format!("{name}.mass_balance[{label}]"), move |p| {
                p.get(f) - p.get(r) - p.get(m)
            });
        }
        for (label, t_out) in [
            ("retentate", retentate_state.temperature),
            ("permeate", permeate_state.temperature),
        ] {
            let t_in = feed_state.temperature;
            system.add_constraint(format!("{name}.isothermal[{label}]"), move |p| {
                p.get(t_out) - p.get(t_in)
            });
        }
        {
            let (p_in, p_ret) = (feed_state.pressure, retentate_state.pressure);
            system.add_constraint(format!("{name}.retentate_pressure"), move |p| {
                p.get(p_ret) - p.get(p_in)
            });
        }

        Self {
            name: name.to_string(),
            pool: pool.clone(),
            membrane_type,
            model,
            feed_state,
            retentate_state,
            permeate_state,
            inlet,
            retentate,
            permeate,
            area,
            a_comp,
            b_comp,
            flux_mass_h2o,
            flux_mass_tds,
            system,
            costing: None,
        }
    }

    /// Membrane class of this unit.
    #[must_use]
    pub fn membrane_type(&self) -> MembraneType {
        self.membrane_type
    }

    /// Feed inlet port.
    #[must_use]
    pub fn inlet(&self) -> &Port {
        &self.inlet
    }

    /// Retentate outlet port.
    #[must_use]
    pub fn retentate(&self) -> &Port {
        &self.retentate
    }

    /// Permeate outlet port.
    #[must_use]
    pub fn permeate(&self) -> &Port {
        &self.permeate
    }

    /// Feed state block.
    #[must_use]
    pub fn feed_state(&self) -> &SeawaterState {
        &self.feed_state
    }

    /// Retentate state block.
    #[must_use]
    pub fn retentate_state(&self) -> &SeawaterState {
        &self.retentate_state
    }

    /// Permeate state block.
    #[must_use]
    pub fn permeate_state(&self) -> &SeawaterState {
        &self.permeate_state
    }

    /// Observed water recovery at current values.
    #[must_use]
    pub fn recovery(&self) -> f64 {
        let feed = self.pool.get(self.feed_state.flow_mass_h2o);
        if feed == 0.0 {
            0.0
        } else {
            self.pool.get(self.permeate_state.flow_mass_h2o) / feed
        }
    }

    /// Attaches membrane costing: capital proportional to area, operating
    /// cost from annual membrane replacement. Idempotent.
    pub fn add_costing(&mut self, params: &Rc<CostingParams>) {
        if self.costing.is_some() {
            return;
        }
        let block = CostingBlock::make_vars(&self.pool, &format!("{}.costing", self.name));
        let membrane_cost = match self.membrane_type {
            MembraneType::ReverseOsmosis => params.ro_membrane_cost,
            MembraneType::Nanofiltration => params.nf_membrane_cost,
        };
        let name = &self.name;
        let area = self.area;

        let capital = block.capital_cost;
        self.system
            .add_constraint(format!("{name}.costing.capital_cost_equation"), move |p| {
                p.get(capital) - membrane_cost * p.get(area)
            });

        let operating = block.operating_cost;
        let replacement = params.factor_membrane_replacement * membrane_cost;
        self.system.add_constraint(
            format!("{name}.costing.operating_cost_equation"),
            move |p| p.get(operating) - replacement * p.get(area),
        );

        self.system
            .add_vars([block.capital_cost, block.operating_cost]);
        self.costing = Some(block);
    }
}

impl UnitModel for ReverseOsmosis0D {
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
        self.retentate_state.initialize(Some(&args), false);

        // Seed the permeate from the feed at modest recovery, near-complete
        // rejection, and atmospheric pressure.
        let mut perm_args = args.clone();
        if let Some(h2o) = args.get("flow_mass_H2O") {
            perm_args.insert("flow_mass_H2O", 0.3 * h2o);
        }
        if let Some(tds) = args.get("flow_mass_TDS") {
            perm_args.insert("flow_mass_TDS", 0.01 * tds);
        }
        perm_args.insert("pressure", 101325.0);
        self.permeate_state.initialize(Some(&perm_args), false);

        let report = solver.solve(&self.system, options);

        if let Some(flags) = flags {
            release_state(&self.pool, flags);
        }
        report.into()
    }

    fn calculate_scaling_factors(&mut self) {
        for state in [&self.feed_state, &self.retentate_state, &self.permeate_state] {
            for id in state.state_vars() {
                set_scaling_from_value(&self.pool, id);
            }
        }
        for id in [
            self.area,
            self.a_comp,
            self.b_comp,
            self.flux_mass_h2o,
            self.flux_mass_tds,
        ] {
            set_scaling_from_value(&self.pool, id);
        }
    }

    fn costing(&self) -> Option<&CostingBlock> {
        self.costing.as_ref()
    }

    fn performance_contents(&self) -> PerformanceContents {
        let mut contents = PerformanceContents::default();
        contents.push_var("Membrane Area", &self.pool, self.area);
        contents.push_var("Water Flux", &self.pool, self.flux_mass_h2o);
        contents.push_var("Solute Flux", &self.pool, self.flux_mass_tds);
        contents
    }

    fn stream_table(&self) -> StreamTable {
        let pool = &self.pool;
        let states = [&self.feed_state, &self.retentate_state, &self.permeate_state];
        StreamTable {
            columns: vec!["Feed".into(), "Retentate".into(), "Permeate".into()],
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
