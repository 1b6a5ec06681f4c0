//! Shared pool of scalar model variables.
//!
//! Every variable in a flowsheet (state variables, unit performance
//! variables, cost variables) lives in one [`VarPool`] so that solvers can
//! update values that unit models, ports, and costing blocks all observe.
//! The pool is a cheaply cloneable handle; flowsheet execution is
//! single-threaded batch work, so interior mutability via `RefCell` is
//! sufficient.
//!
//! A variable carries a name (for diagnostics and reports), a current value
//! in SI units, optional lower/upper bounds, a `fixed` flag, and an optional
//! scaling factor. A fixed variable is excluded from the free-variable set of
//! any [`EquationSystem`](crate::core::solver::EquationSystem) it belongs to;
//! exactly one of {fixed, determined by an equation} must hold for each
//! variable at solve time.

use std::{cell::RefCell, rc::Rc};

use crate::support::constraint::{Constrained, StrictlyPositive};

/// Unique identifier of a variable within its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(usize);

impl VarId {
    /// Index of the variable within its pool.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct VarRecord {
    name: String,
    value: f64,
    lower: Option<f64>,
    upper: Option<f64>,
    fixed: bool,
    scaling: Option<f64>,
}

/// Shared registry of scalar variables.
///
/// # Example
///
/// ```
/// use aquasheet::core::variable::VarPool;
///
/// let pool = VarPool::new();
/// let flow = pool.add("flow_mass", 1.0);
/// pool.fix_at(flow, 2.5);
/// assert_eq!(pool.get(flow), 2.5);
/// assert!(pool.is_fixed(flow));
/// ```
#[derive(Debug, Clone, Default)]
pub struct VarPool {
    records: Rc<RefCell<Vec<VarRecord>>>,
}

impl VarPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an unbounded variable and returns its id.
    pub fn add(&self, name: impl Into<String>, value: f64) -> VarId {
        self.add_bounded(name, value, None, None)
    }

    /// Adds a variable with the given bounds and returns its id.
    pub fn add_bounded(
        &self,
        name: impl Into<String>,
        value: f64,
        lower: Option<f64>,
        upper: Option<f64>,
    ) -> VarId {
        let mut records = self.records.borrow_mut();
        let id = VarId(records.len());
        records.push(VarRecord {
            name: name.into(),
            value,
            lower,
            upper,
            fixed: false,
            scaling: None,
        });
        id
    }

    /// Current value of a variable.
    #[must_use]
    pub fn get(&self, id: VarId) -> f64 {
        self.records.borrow()[id.0].value
    }

    /// Sets the value of a variable.
    pub fn set(&self, id: VarId, value: f64) {
        self.records.borrow_mut()[id.0].value = value;
    }

    /// Fixes a variable at its current value.
    pub fn fix(&self, id: VarId) {
        self.records.borrow_mut()[id.0].fixed = true;
    }

    /// Sets a variable to `value` and fixes it there.
    pub fn fix_at(&self, id: VarId, value: f64) {
        let mut records = self.records.borrow_mut();
        records[id.0].value = value;
        records[id.0].fixed = true;
    }

    /// Releases a fixed variable back to the free set.
    pub fn unfix(&self, id: VarId) {
        self.records.borrow_mut()[id.0].fixed = false;
    }

    /// Whether the variable is currently fixed.
    #[must_use]
    pub fn is_fixed(&self, id: VarId) -> bool {
        self.records.borrow()[id.0].fixed
    }

    /// Name of the variable.
    #[must_use]
    pub fn name(&self, id: VarId) -> String {
        self.records.borrow()[id.0].name.clone()
    }

    /// Bounds of the variable as `(lower, upper)`.
    #[must_use]
    pub fn bounds(&self, id: VarId) -> (Option<f64>, Option<f64>) {
        let records = self.records.borrow();
        (records[id.0].lower, records[id.0].upper)
    }

    /// Lower bound of the variable, if any.
    #[must_use]
    pub fn lower(&self, id: VarId) -> Option<f64> {
        self.records.borrow()[id.0].lower
    }

    /// Replaces the lower bound of a variable.
    ///
    /// Used by costing branches that relax a bound, e.g. allowing a negative
    /// operating cost for an energy-recovery device.
    pub fn set_lower(&self, id: VarId, lower: Option<f64>) {
        self.records.borrow_mut()[id.0].lower = lower;
    }

    /// Clips `value` into the variable's bounds.
    #[must_use]
    pub fn clip(&self, id: VarId, value: f64) -> f64 {
        let (lower, upper) = self.bounds(id);
        let mut v = value;
        if let Some(lb) = lower {
            v = v.max(lb);
        }
        if let Some(ub) = upper {
            v = v.min(ub);
        }
        v
    }

    /// Assigns a scaling factor to the variable.
    ///
    /// The type-level constraint guarantees the factor is strictly positive.
    pub fn set_scaling(&self, id: VarId, factor: Constrained<f64, StrictlyPositive>) {
        self.records.borrow_mut()[id.0].scaling = Some(factor.into_inner());
    }

    /// Scaling factor of the variable, if one has been assigned.
    #[must_use]
    pub fn scaling(&self, id: VarId) -> Option<f64> {
        self.records.borrow()[id.0].scaling
    }

    /// Scaling factor of the variable, falling back to the solver default.
    #[must_use]
    pub fn scaling_or_default(&self, id: VarId) -> f64 {
        self.scaling(id).unwrap_or(1.0)
    }

    /// Number of variables in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    /// Whether the pool holds no variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }
}
