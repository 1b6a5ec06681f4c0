//! Scaling-factor calculation and propagation.
//!
//! The nonlinear solver is sensitive to variable magnitude, so every variable
//! and constraint should carry a positive scale before a solve. The
//! convention follows two passes:
//!
//! 1. A *default* pass assigns magnitude-based factors to state variables
//!    that have none ([`set_scaling_from_value`]).
//! 2. Each unit model's own `calculate_scaling_factors` runs afterwards and
//!    derives factors for its remaining variables from structurally related,
//!    already-scaled variables (a heat duty inherits the scale of the
//!    enthalpy flow it balances against) and applies the same factor to the
//!    constraint tying them together ([`constraint_scaling_transform`]).
//!
//! A missing factor is never fatal; the solver falls back to 1.0.

use crate::core::solver::{ConstraintId, EquationSystem};
use crate::core::variable::{VarId, VarPool};
use crate::support::constraint::StrictlyPositive;

/// Assigns `1 / |value|`, rounded to a power of ten, if the variable has no
/// scaling factor yet.
///
/// Variables currently at zero keep no factor (the solver default applies).
pub fn set_scaling_from_value(pool: &VarPool, id: VarId) {
    if pool.scaling(id).is_some() {
        return;
    }
    let magnitude = pool.get(id).abs();
    if magnitude == 0.0 || !magnitude.is_finite() {
        return;
    }
    let factor = 10f64.powi(-magnitude.log10().round() as i32);
    if let Ok(factor) = StrictlyPositive::new(factor) {
        pool.set_scaling(id, factor);
    }
}

/// Copies the scale of `source` onto `target` if `target` has none.
///
/// Returns the factor applied, if any, so the caller can forward it to the
/// related constraint.
pub fn propagate_scaling(pool: &VarPool, target: VarId, source: VarId) -> Option<f64> {
    if pool.scaling(target).is_some() {
        return pool.scaling(target);
    }
    let factor = pool.scaling(source)?;
    if let Ok(checked) = StrictlyPositive::new(factor) {
        pool.set_scaling(target, checked);
        Some(factor)
    } else {
        None
    }
}

/// Multiplies a constraint's residual scale by `factor`.
///
/// Non-positive factors are ignored: a bad factor must not corrupt an
/// otherwise well-scaled system.
pub fn constraint_scaling_transform(system: &EquationSystem, id: ConstraintId, factor: f64) {
    if StrictlyPositive::new(factor).is_ok() {
        system.scale_constraint(id, factor);
    }
}
