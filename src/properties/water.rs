//! Zero-order water property package.
//!
//! Streams are described by one mass flow per component (`H2O` plus a
//! configured solute list). The liquid density is a process-wide constant, so
//! volumetric flow and mass concentrations are derived quantities rather than
//! state variables.

use std::collections::BTreeMap;

use uom::si::f64::MassDensity;
use uom::si::mass_density::kilogram_per_cubic_meter;

use crate::core::state::StateBlock;
use crate::core::variable::{VarId, VarPool};

/// Constant liquid density assumed by zero-order models, kg/m³.
pub(crate) const LIQUID_DENSITY: f64 = 1000.0;

/// A solute list defining the components of a zero-order stream.
///
/// # Example
///
/// ```
/// use aquasheet::properties::water::WaterPropertyPackage;
///
/// let package = WaterPropertyPackage::new(["bod", "tss"]);
/// assert_eq!(package.component_list(), ["H2O", "bod", "tss"]);
/// ```
#[derive(Debug, Clone)]
pub struct WaterPropertyPackage {
    solutes: Vec<String>,
}

impl WaterPropertyPackage {
    /// Creates a package for the given solutes (water is always present).
    pub fn new(solutes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            solutes: solutes.into_iter().map(Into::into).collect(),
        }
    }

    /// The configured solutes, in construction order.
    #[must_use]
    pub fn solutes(&self) -> &[String] {
        &self.solutes
    }

    /// All components: water followed by the solutes.
    #[must_use]
    pub fn component_list(&self) -> Vec<String> {
        std::iter::once("H2O".to_string())
            .chain(self.solutes.iter().cloned())
            .collect()
    }

    /// Constant liquid density.
    #[must_use]
    pub fn density(&self) -> MassDensity {
        MassDensity::new::<kilogram_per_cubic_meter>(LIQUID_DENSITY)
    }
}

/// One zero-order stream: a mass flow per component, kg/s.
#[derive(Debug, Clone)]
pub struct WaterState {
    pool: VarPool,
    defined: bool,
    flow_mass_comp: BTreeMap<String, VarId>,
}

impl WaterState {
    /// Declares the state variables for one stream under `prefix`.
    pub fn new(
        pool: &VarPool,
        prefix: &str,
        package: &WaterPropertyPackage,
        defined: bool,
    ) -> Self {
        let flow_mass_comp = package
            .component_list()
            .into_iter()
            .map(|comp| {
                let id = pool.add_bounded(
                    format!("{prefix}.flow_mass_comp[{comp}]"),
                    1.0,
                    Some(0.0),
                    None,
                );
                (comp, id)
            })
            .collect();
        Self {
            pool: pool.clone(),
            defined,
            flow_mass_comp,
        }
    }

    /// Mass flow variable of one component.
    #[must_use]
    pub fn flow_mass(&self, component: &str) -> Option<VarId> {
        self.flow_mass_comp.get(component).copied()
    }

    /// Component mass flow variables in component name order.
    pub fn flows(&self) -> impl Iterator<Item = (&str, VarId)> {
        self.flow_mass_comp
            .iter()
            .map(|(comp, id)| (comp.as_str(), *id))
    }

    /// Volumetric flow at current values, m³/s.
    #[must_use]
    pub fn flow_vol(&self, pool: &VarPool) -> f64 {
        let total: f64 = self.flow_mass_comp.values().map(|id| pool.get(*id)).sum();
        total / LIQUID_DENSITY
    }

    /// Mass concentration of one component at current values, kg/m³.
    ///
    /// A zero-flow stream reports zero concentration.
    #[must_use]
    pub fn conc_mass(&self, pool: &VarPool, component: &str) -> f64 {
        let Some(id) = self.flow_mass(component) else {
            return 0.0;
        };
        let flow_vol = self.flow_vol(pool);
        if flow_vol == 0.0 {
            0.0
        } else {
            pool.get(id) / flow_vol
        }
    }
}

impl StateBlock for WaterState {
    fn defined_state(&self) -> bool {
        self.defined
    }

    fn state_vars(&self) -> Vec<VarId> {
        self.flow_mass_comp.values().copied().collect()
    }

    fn port_members(&self) -> Vec<(String, VarId)> {
        self.flow_mass_comp
            .iter()
            .map(|(comp, id)| (format!("flow_mass_comp[{comp}]"), *id))
            .collect()
    }

    fn pool(&self) -> &VarPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn derived_quantities_follow_constant_density() {
        let pool = VarPool::new();
        let package = WaterPropertyPackage::new(["bod"]);
        let state = WaterState::new(&pool, "fs.inlet", &package, true);

        pool.set(state.flow_mass("H2O").unwrap(), 10.0);
        pool.set(state.flow_mass("bod").unwrap(), 2.0);

        assert_relative_eq!(state.flow_vol(&pool), 0.012);
        assert_relative_eq!(state.conc_mass(&pool, "H2O"), 10.0 / 0.012);
        assert_relative_eq!(state.conc_mass(&pool, "bod"), 2.0 / 0.012);
    }

    #[test]
    fn zero_flow_stream_has_zero_concentration() {
        let pool = VarPool::new();
        let package = WaterPropertyPackage::new(["bod"]);
        let state = WaterState::new(&pool, "fs.byproduct", &package, false);
        for (_, id) in state.flows() {
            pool.set(id, 0.0);
        }
        assert_eq!(state.conc_mass(&pool, "bod"), 0.0);
    }

    #[test]
    fn port_members_are_named_per_component() {
        let pool = VarPool::new();
        let package = WaterPropertyPackage::new(["tss"]);
        let state = WaterState::new(&pool, "s", &package, true);
        let names: Vec<String> = state.port_members().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["flow_mass_comp[H2O]", "flow_mass_comp[tss]"]);
    }
}
