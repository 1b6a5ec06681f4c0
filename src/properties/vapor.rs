//! Water vapor property package.
//!
//! Evaporator overheads are two-phase water streams; in normal operation the
//! liquid phase is degenerate and its flow sits at the variable's lower
//! bound. [`SimpleWaterVapor`] provides the steam-side correlations.

use uom::si::available_energy::joule_per_kilogram;
use uom::si::f64::{AvailableEnergy, Pressure, ThermodynamicTemperature};
use uom::si::pressure::pascal;
use uom::si::thermodynamic_temperature::kelvin;

use crate::core::state::StateBlock;
use crate::core::variable::{VarId, VarPool};

/// Physical properties of water vapor.
pub trait VaporPropertyModel {
    /// Specific enthalpy of saturated vapor relative to liquid at 0 °C.
    fn specific_enthalpy_vapor(&self, temperature: ThermodynamicTemperature) -> AvailableEnergy;

    /// Saturation pressure of pure water.
    fn saturation_pressure(&self, temperature: ThermodynamicTemperature) -> Pressure;
}

/// Simple steam correlations: constant latent heat plus a linear superheat
/// term, Antoine saturation pressure.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleWaterVapor;

/// Latent heat of vaporization at 0 °C, J/kg.
const LATENT_HEAT: f64 = 2.501e6;

/// Vapor heat capacity, J/(kg·K).
const CP_VAPOR: f64 = 1880.0;

impl VaporPropertyModel for SimpleWaterVapor {
    fn specific_enthalpy_vapor(&self, temperature: ThermodynamicTemperature) -> AvailableEnergy {
        let t_celsius = temperature.get::<kelvin>() - 273.15;
        AvailableEnergy::new::<joule_per_kilogram>(LATENT_HEAT + CP_VAPOR * t_celsius)
    }

    fn saturation_pressure(&self, temperature: ThermodynamicTemperature) -> Pressure {
        let t_celsius = temperature.get::<kelvin>() - 273.15;
        let p_mmhg = 10f64.powf(8.07131 - 1730.63 / (233.426 + t_celsius));
        Pressure::new::<pascal>(p_mmhg * 133.322)
    }
}

/// A two-phase water stream.
#[derive(Debug, Clone)]
pub struct VaporState {
    pool: VarPool,
    defined: bool,
    /// Liquid-phase water mass flow, kg/s. Degenerate in normal operation.
    pub flow_mass_liq: VarId,
    /// Vapor-phase water mass flow, kg/s.
    pub flow_mass_vap: VarId,
    /// Temperature, K.
    pub temperature: VarId,
    /// Pressure, Pa.
    pub pressure: VarId,
}

impl VaporState {
    /// Declares the state variables for one stream under `prefix`.
    pub fn new(pool: &VarPool, prefix: &str, defined: bool) -> Self {
        Self {
            pool: pool.clone(),
            defined,
            flow_mass_liq: pool.add_bounded(
                format!("{prefix}.flow_mass_liq"),
                1e-8,
                Some(1e-8),
                None,
            ),
            flow_mass_vap: pool.add_bounded(
                format!("{prefix}.flow_mass_vap"),
                1.0,
                Some(0.0),
                None,
            ),
            temperature: pool.add_bounded(
                format!("{prefix}.temperature"),
                298.15,
                Some(273.15),
                Some(473.15),
            ),
            pressure: pool.add_bounded(format!("{prefix}.pressure"), 101325.0, Some(1e3), None),
        }
    }

    /// Enthalpy flow of the vapor phase at current values, W.
    #[must_use]
    pub fn enth_flow_vapor(&self, pool: &VarPool, model: &dyn VaporPropertyModel) -> f64 {
        let t = ThermodynamicTemperature::new::<kelvin>(pool.get(self.temperature));
        let h = model.specific_enthalpy_vapor(t);
        pool.get(self.flow_mass_vap) * h.get::<joule_per_kilogram>()
    }
}

impl StateBlock for VaporState {
    fn defined_state(&self) -> bool {
        self.defined
    }

    fn state_vars(&self) -> Vec<VarId> {
        vec![
            self.flow_mass_liq,
            self.flow_mass_vap,
            self.temperature,
            self.pressure,
        ]
    }

    fn port_members(&self) -> Vec<(String, VarId)> {
        vec![
            ("flow_mass_liq".into(), self.flow_mass_liq),
            ("flow_mass_vap".into(), self.flow_mass_vap),
            ("temperature".into(), self.temperature),
            ("pressure".into(), self.pressure),
        ]
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
    fn vapor_enthalpy_exceeds_latent_heat_above_freezing() {
        let model = SimpleWaterVapor;
        let t = ThermodynamicTemperature::new::<kelvin>(323.15);
        let h = model.specific_enthalpy_vapor(t).get::<joule_per_kilogram>();
        assert_relative_eq!(h, 2.501e6 + 1880.0 * 50.0);
    }

    #[test]
    fn liquid_flow_starts_at_its_lower_bound() {
        let pool = VarPool::new();
        let state = VaporState::new(&pool, "fs.vapor", false);
        assert_eq!(pool.get(state.flow_mass_liq), pool.lower(state.flow_mass_liq).unwrap());
    }
}
