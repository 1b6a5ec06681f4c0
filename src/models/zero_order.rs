//! Zero-order treatment models.
//!
//! Zero-order units describe a treatment technology by performance data
//! rather than first principles: a water recovery fraction, a removal
//! fraction per solute, and (per technology) energy relations, all sourced
//! from the parameter [`Database`](crate::core::database::Database). The
//! shared skeleton here is single-inlet double-outlet: an inlet stream split
//! into a treated stream and a byproduct stream under component mass
//! balances.

use std::collections::BTreeMap;
use std::rc::Rc;

use thiserror::Error;

use crate::core::database::{DatabaseError, TechnologyParameters};
use crate::core::error::ConfigurationError;
use crate::core::port::Port;
use crate::core::scaling::set_scaling_from_value;
use crate::core::solver::{EquationSystem, SolverAdapter, SolverOptions};
use crate::core::state::{StateArgs, StateBlock, release_state};
use crate::core::variable::{VarId, VarPool};
use crate::models::InitializeOutcome;
use crate::properties::water::{LIQUID_DENSITY, WaterPropertyPackage, WaterState};
use crate::support::constraint::{ConstraintError, NonNegative, UnitInterval};

pub mod aeration_basin;

/// Failure while applying database parameters to a zero-order unit.
#[derive(Debug, Error)]
pub enum ParameterError {
    /// The database lookup itself failed.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// A parameter the unit requires is absent from the technology data.
    #[error("{unit}: required database parameter {parameter} is missing")]
    MissingParameter {
        /// Unit being parameterized.
        unit: String,
        /// Name of the missing parameter.
        parameter: String,
    },

    /// No removal fraction is recorded for a solute and default removal is
    /// disabled.
    #[error(
        "{unit}: no removal fraction recorded for solute {solute}; \
         pass use_default_removal = true to assume the default"
    )]
    MissingSoluteRemoval {
        /// Unit being parameterized.
        unit: String,
        /// Solute with no recorded removal fraction.
        solute: String,
    },

    /// A recorded value lies outside the range its parameter allows.
    #[error("{unit}: database parameter {parameter} = {value}: {source}")]
    InvalidValue {
        /// Unit being parameterized.
        unit: String,
        /// Name of the offending parameter.
        parameter: String,
        /// Value found in the database.
        value: f64,
        /// The violated range.
        source: ConstraintError,
    },
}

/// Single-inlet double-outlet mass balance skeleton.
///
/// Declares the inlet, treated, and byproduct state blocks with their ports,
/// the water recovery and per-solute removal variables, and the balance
/// constraints. Concrete zero-order units embed this and add their own
/// performance relations.
#[derive(Debug)]
pub struct Sido {
    name: String,
    pool: VarPool,
    package: Rc<WaterPropertyPackage>,
    inlet_state: WaterState,
    treated_state: WaterState,
    byproduct_state: WaterState,
    inlet: Port,
    treated: Port,
    byproduct: Port,
    recovery_frac_mass_h2o: VarId,
    removal_frac_mass_solute: BTreeMap<String, VarId>,
    system: EquationSystem,
}

impl Sido {
    /// Declares the skeleton's variables and constraints under `name`.
    pub fn new(pool: &VarPool, name: &str, package: Rc<WaterPropertyPackage>) -> Self {
        let inlet_state =
            WaterState::new(pool, &format!("{name}.properties_in"), &package, true);
        let treated_state =
            WaterState::new(pool, &format!("{name}.properties_treated"), &package, false);
        let byproduct_state =
            WaterState::new(pool, &format!("{name}.properties_byproduct"), &package, false);

        let inlet = Port::new(format!("{name}.inlet"), inlet_state.port_members());
        let treated = Port::new(format!("{name}.treated"), treated_state.port_members());
        let byproduct = Port::new(format!("{name}.byproduct"), byproduct_state.port_members());

        let recovery_frac_mass_h2o = pool.add_bounded(
            format!("{name}.recovery_frac_mass_H2O"),
            0.8,
            Some(1e-8),
            Some(1.000_000_1),
        );
        let removal_frac_mass_solute: BTreeMap<String, VarId> = package
            .solutes()
            .iter()
            .map(|solute| {
                let id = pool.add_bounded(
                    format!("{name}.removal_frac_mass_solute[{solute}]"),
                    0.01,
                    Some(0.0),
                    None,
                );
                (solute.clone(), id)
            })
            .collect();

        let mut system = EquationSystem::new(pool);
        for state in [&inlet_state, &treated_state, &byproduct_state] {
            system.add_vars(state.state_vars());
        }
        system.add_var(recovery_frac_mass_h2o);
        system.add_vars(removal_frac_mass_solute.values().copied());

        let recovery = recovery_frac_mass_h2o;
        let inlet_h2o = inlet_state
            .flow_mass("H2O")
            .expect("water is always a component");
        let treated_h2o = treated_state
            .flow_mass("H2O")
            .expect("water is always a component");
        system.add_constraint(format!("{name}.water_recovery_equation"), move |p| {
            p.get(recovery) * p.get(inlet_h2o) - p.get(treated_h2o)
        });

        for comp in package.component_list() {
            let i = inlet_state.flow_mass(&comp).expect("component declared");
            let t = treated_state.flow_mass(&comp).expect("component declared");
            let b = byproduct_state.flow_mass(&comp).expect("component declared");
            system.add_constraint(format!("{name}.mass_balance[{comp}]"), move |p| {
                p.get(i) - p.get(t) - p.get(b)
            });
        }

        for (solute, &removal) in &removal_frac_mass_solute {
            let i = inlet_state.flow_mass(solute).expect("solute declared");
            let b = byproduct_state.flow_mass(solute).expect("solute declared");
            system.add_constraint(
                format!("{name}.solute_removal_equation[{solute}]"),
                move |p| p.get(removal) * p.get(i) - p.get(b),
            );
        }

        Self {
            name: name.to_string(),
            pool: pool.clone(),
            package,
            inlet_state,
            treated_state,
            byproduct_state,
            inlet,
            treated,
            byproduct,
            recovery_frac_mass_h2o,
            removal_frac_mass_solute,
            system,
        }
    }

    /// Unit name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The property package this unit was built against.
    #[must_use]
    pub fn package(&self) -> &WaterPropertyPackage {
        &self.package
    }

    /// The unit's equation system.
    #[must_use]
    pub fn system(&self) -> &EquationSystem {
        &self.system
    }

    /// Mutable access for subclasses adding performance relations.
    pub(crate) fn system_mut(&mut self) -> &mut EquationSystem {
        &mut self.system
    }

    /// Inlet port.
    #[must_use]
    pub fn inlet(&self) -> &Port {
        &self.inlet
    }

    /// Treated-water outlet port.
    #[must_use]
    pub fn treated(&self) -> &Port {
        &self.treated
    }

    /// Byproduct outlet port.
    #[must_use]
    pub fn byproduct(&self) -> &Port {
        &self.byproduct
    }

    /// Inlet state block.
    #[must_use]
    pub fn inlet_state(&self) -> &WaterState {
        &self.inlet_state
    }

    /// Treated state block.
    #[must_use]
    pub fn treated_state(&self) -> &WaterState {
        &self.treated_state
    }

    /// Byproduct state block.
    #[must_use]
    pub fn byproduct_state(&self) -> &WaterState {
        &self.byproduct_state
    }

    /// Water recovery variable.
    #[must_use]
    pub fn recovery_frac_mass_h2o(&self) -> VarId {
        self.recovery_frac_mass_h2o
    }

    /// Removal fraction variables in solute name order.
    pub fn removal_fractions(&self) -> impl Iterator<Item = (&str, VarId)> {
        self.removal_frac_mass_solute
            .iter()
            .map(|(solute, id)| (solute.as_str(), *id))
    }

    /// Inlet volumetric flow at current values, m³/s.
    #[must_use]
    pub fn inlet_flow_vol(&self) -> f64 {
        self.inlet_state.flow_vol(&self.pool)
    }

    /// Ids of the inlet component flows, for performance constraints.
    pub(crate) fn inlet_flow_ids(&self) -> Vec<VarId> {
        self.inlet_state.state_vars()
    }

    /// Liquid density assumed by the package, kg/m³.
    pub(crate) fn density(&self) -> f64 {
        LIQUID_DENSITY
    }

    /// Fixes one inlet component mass flow.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the component is not declared by
    /// the property package.
    pub fn fix_inlet_flow(&self, component: &str, value: f64) -> Result<(), ConfigurationError> {
        let id = self.inlet_state.flow_mass(component).ok_or_else(|| {
            ConfigurationError::new(
                self.name.clone(),
                format!("component {component} is not declared by the property package"),
            )
        })?;
        self.pool.fix_at(id, value);
        Ok(())
    }

    /// Fixes recovery and removal fractions from a technology parameter set.
    ///
    /// # Errors
    ///
    /// Returns a [`ParameterError`] if required parameters are absent, if a
    /// recorded fraction lies outside the unit interval, or if a solute has
    /// no recorded removal fraction and `use_default_removal` is `false`.
    pub fn load_parameters(
        &self,
        params: &TechnologyParameters,
        use_default_removal: bool,
    ) -> Result<(), ParameterError> {
        let recovery = self.require_scalar(params, "recovery_frac_mass_H2O")?;
        let recovery = self.unit_fraction("recovery_frac_mass_H2O", recovery)?;
        self.pool.fix_at(self.recovery_frac_mass_h2o, recovery);

        for (solute, &id) in &self.removal_frac_mass_solute {
            if let Some(entry) = params.solute_removal(solute) {
                let removal = self
                    .unit_fraction(&format!("removal_frac_mass_solute[{solute}]"), entry.value)?;
                self.pool.fix_at(id, removal);
            } else if use_default_removal {
                let default = params
                    .scalar("default_removal_frac_mass_solute")
                    .map_or(0.0, |entry| entry.value);
                let default = self.unit_fraction("default_removal_frac_mass_solute", default)?;
                self.pool.fix_at(id, default);
            } else {
                return Err(ParameterError::MissingSoluteRemoval {
                    unit: self.name.clone(),
                    solute: solute.clone(),
                });
            }
        }
        Ok(())
    }

    /// Validates a fraction parameter against the closed unit interval.
    pub(crate) fn unit_fraction(&self, parameter: &str, value: f64) -> Result<f64, ParameterError> {
        UnitInterval::new(value)
            .map(|checked| checked.into_inner())
            .map_err(|source| ParameterError::InvalidValue {
                unit: self.name.clone(),
                parameter: parameter.to_string(),
                value,
                source,
            })
    }

    /// Validates a rate or intensity parameter that must not be negative.
    pub(crate) fn non_negative(&self, parameter: &str, value: f64) -> Result<f64, ParameterError> {
        NonNegative::new(value)
            .map(|checked| checked.into_inner())
            .map_err(|source| ParameterError::InvalidValue {
                unit: self.name.clone(),
                parameter: parameter.to_string(),
                value,
                source,
            })
    }

    pub(crate) fn require_scalar(
        &self,
        params: &TechnologyParameters,
        parameter: &str,
    ) -> Result<f64, ParameterError> {
        params
            .scalar(parameter)
            .map(|entry| entry.value)
            .ok_or_else(|| ParameterError::MissingParameter {
                unit: self.name.clone(),
                parameter: parameter.to_string(),
            })
    }

    /// Staged initialization: hold the inlet, seed the outlets from it, solve,
    /// release the hold.
    pub fn initialize(
        &mut self,
        solver: &dyn SolverAdapter,
        options: &SolverOptions,
    ) -> InitializeOutcome {
        let flags = self.inlet_state.initialize(None, true);
        let args = StateArgs::from_state(&self.pool, &self.inlet_state);
        self.treated_state.initialize(Some(&args), false);
        self.byproduct_state.initialize(Some(&args), false);

        let report = solver.solve(&self.system, options);

        if let Some(flags) = flags {
            release_state(&self.pool, flags);
        }
        report.into()
    }

    /// Magnitude-based scaling pass over the skeleton's variables.
    pub fn calculate_scaling_factors(&self) {
        for state in [&self.inlet_state, &self.treated_state, &self.byproduct_state] {
            for id in state.state_vars() {
                set_scaling_from_value(&self.pool, id);
            }
        }
        set_scaling_from_value(&self.pool, self.recovery_frac_mass_h2o);
        for (_, id) in self.removal_fractions() {
            set_scaling_from_value(&self.pool, id);
        }
    }
}
