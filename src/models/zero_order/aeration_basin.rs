//! Aeration basin unit model.

use std::any::Any;
use std::rc::Rc;

use crate::core::database::{Database, TechnologyParameters};
use crate::core::error::ConfigurationError;
use crate::core::port::Port;
use crate::core::report::{PerformanceContents, StreamRow, StreamTable};
use crate::core::scaling::set_scaling_from_value;
use crate::core::solver::{EquationSystem, SolverAdapter, SolverOptions};
use crate::core::variable::{VarId, VarPool};
use crate::models::zero_order::{ParameterError, Sido};
use crate::models::{InitializeOutcome, UnitModel};
use crate::properties::water::WaterPropertyPackage;

const TECHNOLOGY: &str = "aeration_basin";

/// Construction arguments for an [`AerationBasin`].
#[derive(Debug, Clone)]
pub struct AerationBasinConfig {
    /// Fully qualified unit name, e.g. `fs.unit`.
    pub name: String,

    /// Property package declaring the solute list. Required.
    pub property_package: Option<Rc<WaterPropertyPackage>>,

    /// Process subtype to look up in the parameter database, if any.
    pub process_subtype: Option<String>,
}

/// Zero-order aeration basin.
///
/// Extends the single-inlet double-outlet skeleton with an electricity
/// demand proportional to inlet volumetric flow:
///
/// ```text
/// electricity [kW] = energy_electric_flow_vol_inlet [kWh/m³] · Q_in [m³/s] · 3600 [s/h]
/// ```
///
/// Performance parameters come from the `aeration_basin` entry of the
/// parameter database via [`AerationBasin::load_parameters_from_database`].
#[derive(Debug)]
pub struct AerationBasin {
    sido: Sido,
    pool: VarPool,
    process_subtype: Option<String>,
    electricity: VarId,
    energy_electric_flow_vol_inlet: VarId,
}

impl AerationBasin {
    /// Builds the unit and registers its constraints.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the property package is missing.
    pub fn build(pool: &VarPool, config: AerationBasinConfig) -> Result<Self, ConfigurationError> {
        let package = config
            .property_package
            .ok_or_else(|| ConfigurationError::missing_parameter(&config.name, "property_package"))?;
        let name = config.name;
        let mut sido = Sido::new(pool, &name, package);

        let electricity = pool.add(format!("{name}.electricity"), 0.0);
        let energy_electric_flow_vol_inlet =
            pool.add(format!("{name}.energy_electric_flow_vol_inlet"), 0.0);

        let inlet_flows = sido.inlet_flow_ids();
        let density = sido.density();
        let intensity = energy_electric_flow_vol_inlet;
        let system = sido.system_mut();
        system.add_vars([electricity, energy_electric_flow_vol_inlet]);
        system.add_constraint(format!("{name}.electricity_consumption"), move |p| {
            let flow_vol: f64 = inlet_flows.iter().map(|id| p.get(*id)).sum::<f64>() / density;
            p.get(electricity) - p.get(intensity) * flow_vol * 3600.0
        });

        Ok(Self {
            sido,
            pool: pool.clone(),
            process_subtype: config.process_subtype,
            electricity,
            energy_electric_flow_vol_inlet,
        })
    }

    /// Fixes one inlet component mass flow, kg/s.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the component is not declared by
    /// the property package.
    pub fn fix_inlet_flow(&self, component: &str, value: f64) -> Result<(), ConfigurationError> {
        self.sido.fix_inlet_flow(component, value)
    }

    /// Fixes recovery, removal fractions, and energy intensity from the
    /// database, using this unit's process subtype if one was configured.
    ///
    /// # Errors
    ///
    /// Returns a [`ParameterError`] if the lookup fails, required parameters
    /// are absent or out of range, or a solute has no recorded removal
    /// fraction and `use_default_removal` is `false`.
    pub fn load_parameters_from_database(
        &self,
        database: &Database,
        use_default_removal: bool,
    ) -> Result<(), ParameterError> {
        let params = database
            .get_unit_operation_parameters(TECHNOLOGY, self.process_subtype.as_deref())?;
        self.load_parameters(&params, use_default_removal)
    }

    /// Applies an already-retrieved technology parameter set.
    ///
    /// # Errors
    ///
    /// Returns a [`ParameterError`] if required parameters are absent, a
    /// fraction lies outside the unit interval, or the energy intensity is
    /// negative.
    pub fn load_parameters(
        &self,
        params: &TechnologyParameters,
        use_default_removal: bool,
    ) -> Result<(), ParameterError> {
        self.sido.load_parameters(params, use_default_removal)?;
        let intensity = self
            .sido
            .require_scalar(params, "energy_electric_flow_vol_inlet")?;
        let intensity = self
            .sido
            .non_negative("energy_electric_flow_vol_inlet", intensity)?;
        self.pool
            .fix_at(self.energy_electric_flow_vol_inlet, intensity);
        Ok(())
    }

    /// Electricity demand variable, kW.
    #[must_use]
    pub fn electricity(&self) -> VarId {
        self.electricity
    }

    /// Electricity intensity variable, kWh/m³.
    #[must_use]
    pub fn energy_electric_flow_vol_inlet(&self) -> VarId {
        self.energy_electric_flow_vol_inlet
    }

    /// Inlet port.
    #[must_use]
    pub fn inlet(&self) -> &Port {
        self.sido.inlet()
    }

    /// Treated-water outlet port.
    #[must_use]
    pub fn treated(&self) -> &Port {
        self.sido.treated()
    }

    /// Byproduct outlet port.
    #[must_use]
    pub fn byproduct(&self) -> &Port {
        self.sido.byproduct()
    }

    /// The underlying single-inlet double-outlet skeleton.
    #[must_use]
    pub fn sido(&self) -> &Sido {
        &self.sido
    }
}

impl UnitModel for AerationBasin {
    fn name(&self) -> &str {
        self.sido.name()
    }

    fn equations(&self) -> &EquationSystem {
        self.sido.system()
    }

    fn initialize(
        &mut self,
        solver: &dyn SolverAdapter,
        options: &SolverOptions,
    ) -> InitializeOutcome {
        self.sido.initialize(solver, options)
    }

    fn calculate_scaling_factors(&mut self) {
        self.sido.calculate_scaling_factors();
        set_scaling_from_value(&self.pool, self.electricity);
        set_scaling_from_value(&self.pool, self.energy_electric_flow_vol_inlet);
    }

    fn performance_contents(&self) -> PerformanceContents {
        let mut contents = PerformanceContents::default();
        contents.push_var("Electricity Demand", &self.pool, self.electricity);
        contents.push_var(
            "Electricity Intensity",
            &self.pool,
            self.energy_electric_flow_vol_inlet,
        );
        contents.push_var("Water Recovery", &self.pool, self.sido.recovery_frac_mass_h2o());
        for (solute, id) in self.sido.removal_fractions() {
            contents.push_var(format!("Solute Removal [{solute}]"), &self.pool, id);
        }
        contents
    }

    fn stream_table(&self) -> StreamTable {
        let pool = &self.pool;
        let states = [
            self.sido.inlet_state(),
            self.sido.treated_state(),
            self.sido.byproduct_state(),
        ];
        let mut rows = vec![StreamRow {
            label: "Volumetric Flowrate".into(),
            values: states.iter().map(|s| s.flow_vol(pool)).collect(),
        }];
        for comp in self.sido.package().component_list() {
            rows.push(StreamRow {
                label: format!("Mass Concentration {comp}"),
                values: states.iter().map(|s| s.conc_mass(pool, &comp)).collect(),
            });
        }
        StreamTable {
            columns: vec!["Inlet".into(), "Treated".into(), "Byproduct".into()],
            rows,
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
    use approx::assert_abs_diff_eq;

    fn build(solutes: &[&str], subtype: Option<&str>) -> (VarPool, AerationBasin) {
        let pool = VarPool::new();
        let config = AerationBasinConfig {
            name: "fs.unit".into(),
            property_package: Some(Rc::new(WaterPropertyPackage::new(solutes.iter().copied()))),
            process_subtype: subtype.map(Into::into),
        };
        let unit = AerationBasin::build(&pool, config).unwrap();
        (pool, unit)
    }

    #[test]
    fn missing_property_package_is_fatal() {
        let pool = VarPool::new();
        let config = AerationBasinConfig {
            name: "fs.unit".into(),
            property_package: None,
            process_subtype: None,
        };
        let err = AerationBasin::build(&pool, config).unwrap_err();
        assert!(err.to_string().contains("property_package"));
    }

    #[test]
    fn electricity_tracks_inlet_volumetric_flow() {
        let (pool, mut unit) = build(&["viruses_enteric", "bod"], None);
        unit.fix_inlet_flow("H2O", 10.0).unwrap();
        unit.fix_inlet_flow("viruses_enteric", 1.0).unwrap();
        unit.fix_inlet_flow("bod", 1.0).unwrap();
        unit.load_parameters_from_database(&Database::new(), false)
            .unwrap();
        assert_eq!(unit.equations().degrees_of_freedom(), 0);

        unit.calculate_scaling_factors();
        let outcome = unit.initialize(&NewtonSolver::new(), &SolverOptions::default());
        assert!(outcome.status.is_optimal());

        assert_abs_diff_eq!(pool.get(unit.electricity()), 17.80995, epsilon = 1e-5);
        assert_abs_diff_eq!(
            unit.sido().treated_state().flow_vol(&pool),
            0.0103100,
            epsilon = 1e-6
        );
        assert_abs_diff_eq!(
            unit.sido().byproduct_state().flow_vol(&pool),
            0.0016900,
            epsilon = 1e-6
        );
    }

    #[test]
    fn negative_energy_intensity_is_rejected() {
        let (_pool, unit) = build(&["bod"], None);
        let params: TechnologyParameters = serde_json::from_value(serde_json::json!({
            "recovery_frac_mass_H2O": {"value": 1.0, "units": "dimensionless"},
            "energy_electric_flow_vol_inlet": {"value": -0.05, "units": "kWh/m^3"},
            "removal_frac_mass_solute": {
                "bod": {"value": 0.7, "units": "dimensionless"}
            }
        }))
        .unwrap();
        assert!(matches!(
            unit.load_parameters(&params, false),
            Err(ParameterError::InvalidValue { parameter, .. })
                if parameter == "energy_electric_flow_vol_inlet"
        ));
    }

    #[test]
    fn subtype_changes_the_energy_intensity() {
        let (pool, base) = build(&["bod"], None);
        base.load_parameters_from_database(&Database::new(), false)
            .unwrap();
        let (sub_pool, sub) = build(&["bod"], Some("diffused_aeration"));
        sub.load_parameters_from_database(&Database::new(), false)
            .unwrap();
        assert_ne!(
            pool.get(base.energy_electric_flow_vol_inlet()),
            sub_pool.get(sub.energy_electric_flow_vol_inlet())
        );
    }
}
