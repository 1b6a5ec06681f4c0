//! Seawater property package.
//!
//! Desalination units describe streams by H2O and TDS mass flows plus
//! temperature and pressure. The physical property correlations sit behind
//! [`SeawaterPropertyModel`]; [`SimpleSeawater`] provides engineering
//! approximations adequate for flowsheet-level balances.

use uom::si::available_energy::joule_per_kilogram;
use uom::si::f64::{AvailableEnergy, MassDensity, Pressure, ThermodynamicTemperature};
use uom::si::mass_density::kilogram_per_cubic_meter;
use uom::si::pressure::pascal;
use uom::si::thermodynamic_temperature::kelvin;

use crate::core::state::StateBlock;
use crate::core::variable::{VarId, VarPool};

/// Physical properties of seawater as a function of state.
///
/// All signatures use dimensioned quantities; implementations cannot confuse
/// a temperature for a pressure.
pub trait SeawaterPropertyModel {
    /// Liquid density at the given temperature and TDS mass fraction.
    fn density(&self, temperature: ThermodynamicTemperature, mass_frac_tds: f64) -> MassDensity;

    /// Specific enthalpy of the liquid relative to 0 °C.
    fn specific_enthalpy(
        &self,
        temperature: ThermodynamicTemperature,
        mass_frac_tds: f64,
    ) -> AvailableEnergy;

    /// Vapor pressure of water over the solution.
    fn saturation_pressure(&self, temperature: ThermodynamicTemperature) -> Pressure;

    /// Osmotic pressure at the given TDS mass concentration.
    fn osmotic_pressure(
        &self,
        temperature: ThermodynamicTemperature,
        conc_mass_tds: MassDensity,
    ) -> Pressure;
}

/// Simple seawater correlations.
///
/// Density is linear in salinity with a small thermal-expansion term,
/// enthalpy uses a salinity-corrected constant heat capacity, saturation
/// pressure follows the Antoine equation for pure water, and osmotic pressure
/// follows the van 't Hoff relation for fully dissociated NaCl.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleSeawater;

/// Universal gas constant, J/(mol·K).
const GAS_CONSTANT: f64 = 8.314;

/// Molar mass of NaCl, kg/mol.
const MOLAR_MASS_NACL: f64 = 0.0585;

impl SeawaterPropertyModel for SimpleSeawater {
    fn density(&self, temperature: ThermodynamicTemperature, mass_frac_tds: f64) -> MassDensity {
        let t = temperature.get::<kelvin>();
        let rho = 999.7 * (1.0 - 2.5e-4 * (t - 298.15)) + 756.0 * mass_frac_tds;
        MassDensity::new::<kilogram_per_cubic_meter>(rho)
    }

    fn specific_enthalpy(
        &self,
        temperature: ThermodynamicTemperature,
        mass_frac_tds: f64,
    ) -> AvailableEnergy {
        let t = temperature.get::<kelvin>();
        let cp = 4186.0 * (1.0 - 0.7 * mass_frac_tds);
        AvailableEnergy::new::<joule_per_kilogram>(cp * (t - 273.15))
    }

    fn saturation_pressure(&self, temperature: ThermodynamicTemperature) -> Pressure {
        let t_celsius = temperature.get::<kelvin>() - 273.15;
        // Antoine equation for water, 1..100 °C, coefficients in mmHg.
        let p_mmhg = 10f64.powf(8.07131 - 1730.63 / (233.426 + t_celsius));
        Pressure::new::<pascal>(p_mmhg * 133.322)
    }

    fn osmotic_pressure(
        &self,
        temperature: ThermodynamicTemperature,
        conc_mass_tds: MassDensity,
    ) -> Pressure {
        let t = temperature.get::<kelvin>();
        let c = conc_mass_tds.get::<kilogram_per_cubic_meter>();
        // van 't Hoff with i = 2 for NaCl.
        Pressure::new::<pascal>(2.0 * (c / MOLAR_MASS_NACL) * GAS_CONSTANT * t)
    }
}

/// One seawater stream: component mass flows, temperature, and pressure.
#[derive(Debug, Clone)]
pub struct SeawaterState {
    pool: VarPool,
    defined: bool,
    /// Water mass flow, kg/s.
    pub flow_mass_h2o: VarId,
    /// Dissolved-solids mass flow, kg/s.
    pub flow_mass_tds: VarId,
    /// Temperature, K.
    pub temperature: VarId,
    /// Pressure, Pa.
    pub pressure: VarId,
}

impl SeawaterState {
    /// Declares the state variables for one stream under `prefix`.
    pub fn new(pool: &VarPool, prefix: &str, defined: bool) -> Self {
        Self {
            pool: pool.clone(),
            defined,
            flow_mass_h2o: pool.add_bounded(
                format!("{prefix}.flow_mass_H2O"),
                1.0,
                Some(0.0),
                None,
            ),
            flow_mass_tds: pool.add_bounded(
                format!("{prefix}.flow_mass_TDS"),
                0.035,
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

    /// Total mass flow at current values, kg/s.
    #[must_use]
    pub fn flow_mass_total(&self, pool: &VarPool) -> f64 {
        pool.get(self.flow_mass_h2o) + pool.get(self.flow_mass_tds)
    }

    /// TDS mass fraction at current values.
    #[must_use]
    pub fn mass_frac_tds(&self, pool: &VarPool) -> f64 {
        let total = self.flow_mass_total(pool);
        if total == 0.0 {
            0.0
        } else {
            pool.get(self.flow_mass_tds) / total
        }
    }

    /// Volumetric flow at current values, m³/s.
    #[must_use]
    pub fn flow_vol(&self, pool: &VarPool, model: &dyn SeawaterPropertyModel) -> f64 {
        let t = ThermodynamicTemperature::new::<kelvin>(pool.get(self.temperature));
        let rho = model.density(t, self.mass_frac_tds(pool));
        self.flow_mass_total(pool) / rho.get::<kilogram_per_cubic_meter>()
    }

    /// TDS mass concentration at current values, kg/m³.
    #[must_use]
    pub fn conc_mass_tds(&self, pool: &VarPool, model: &dyn SeawaterPropertyModel) -> f64 {
        let flow_vol = self.flow_vol(pool, model);
        if flow_vol == 0.0 {
            0.0
        } else {
            pool.get(self.flow_mass_tds) / flow_vol
        }
    }

    /// Enthalpy flow at current values, W.
    #[must_use]
    pub fn enth_flow(&self, pool: &VarPool, model: &dyn SeawaterPropertyModel) -> f64 {
        let t = ThermodynamicTemperature::new::<kelvin>(pool.get(self.temperature));
        let h = model.specific_enthalpy(t, self.mass_frac_tds(pool));
        self.flow_mass_total(pool) * h.get::<joule_per_kilogram>()
    }
}

impl StateBlock for SeawaterState {
    fn defined_state(&self) -> bool {
        self.defined
    }

    fn state_vars(&self) -> Vec<VarId> {
        vec![
            self.flow_mass_h2o,
            self.flow_mass_tds,
            self.temperature,
            self.pressure,
        ]
    }

    fn port_members(&self) -> Vec<(String, VarId)> {
        vec![
            ("flow_mass_H2O".into(), self.flow_mass_h2o),
            ("flow_mass_TDS".into(), self.flow_mass_tds),
            ("temperature".into(), self.temperature),
            ("pressure".into(), self.pressure),
        ]
    }

    fn pool(&self) -> &VarPool {
        &self.pool
    }
}
