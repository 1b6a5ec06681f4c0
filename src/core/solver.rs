//! Equation systems and the nonlinear solver adapter.
//!
//! Unit models register their variables and equality constraints in an
//! [`EquationSystem`]. A [`SolverAdapter`] drives the system's free variables
//! (members that are not fixed) until every scaled residual vanishes.
//!
//! Solver failure is a *status*, not an error: a non-optimal
//! [`TerminationStatus`] is reported upward so the caller can retry with
//! different guesses, while the model itself stays usable. Only programming
//! mistakes (e.g. indexing a foreign pool) would panic.
//!
//! The built-in [`NewtonSolver`] is a damped Newton iteration with a
//! finite-difference Jacobian, working in the scaled space defined by the
//! variable and constraint scaling factors and clipping steps into variable
//! bounds.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;

use nalgebra::{DMatrix, DVector};

use crate::core::variable::{VarId, VarPool};

/// A named scalar equality constraint, `residual(x) == 0`.
///
/// The scaling factor multiplies the residual before it reaches the solver;
/// it lives in a [`Cell`] so that a scaling pass can run after systems have
/// been aggregated.
#[derive(Clone)]
pub struct Constraint {
    name: String,
    scaling: Rc<Cell<f64>>,
    residual: Rc<dyn Fn(&VarPool) -> f64>,
}

impl Constraint {
    /// Name of the constraint.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current scaling factor.
    #[must_use]
    pub fn scaling(&self) -> f64 {
        self.scaling.get()
    }

    /// Unscaled residual at the pool's current values.
    #[must_use]
    pub fn residual(&self, pool: &VarPool) -> f64 {
        (self.residual)(pool)
    }
}

impl std::fmt::Debug for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constraint")
            .field("name", &self.name)
            .field("scaling", &self.scaling.get())
            .finish_non_exhaustive()
    }
}

/// Identifier of a constraint within one [`EquationSystem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintId(usize);

/// A set of variables and equality constraints forming one solvable unit.
#[derive(Debug, Clone)]
pub struct EquationSystem {
    pool: VarPool,
    vars: BTreeSet<VarId>,
    constraints: Vec<Constraint>,
}

impl EquationSystem {
    /// Creates an empty system over the given pool.
    #[must_use]
    pub fn new(pool: &VarPool) -> Self {
        Self {
            pool: pool.clone(),
            vars: BTreeSet::new(),
            constraints: Vec::new(),
        }
    }

    /// The pool this system's variables live in.
    #[must_use]
    pub fn pool(&self) -> &VarPool {
        &self.pool
    }

    /// Registers a variable as belonging to this system.
    pub fn add_var(&mut self, id: VarId) {
        self.vars.insert(id);
    }

    /// Registers several variables.
    pub fn add_vars(&mut self, ids: impl IntoIterator<Item = VarId>) {
        self.vars.extend(ids);
    }

    /// Adds an equality constraint and returns its id.
    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        residual: impl Fn(&VarPool) -> f64 + 'static,
    ) -> ConstraintId {
        let id = ConstraintId(self.constraints.len());
        self.constraints.push(Constraint {
            name: name.into(),
            scaling: Rc::new(Cell::new(1.0)),
            residual: Rc::new(residual),
        });
        id
    }

    /// Multiplies the scaling factor of a constraint.
    pub(crate) fn scale_constraint(&self, id: ConstraintId, factor: f64) {
        let cell = &self.constraints[id.0].scaling;
        cell.set(cell.get() * factor);
    }

    /// Looks up a constraint by id.
    #[must_use]
    pub fn constraint(&self, id: ConstraintId) -> &Constraint {
        &self.constraints[id.0]
    }

    /// All constraints in insertion order.
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Number of constraints.
    #[must_use]
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Member variables that are currently free.
    #[must_use]
    pub fn free_vars(&self) -> Vec<VarId> {
        self.vars
            .iter()
            .copied()
            .filter(|id| !self.pool.is_fixed(*id))
            .collect()
    }

    /// Free variables minus independent equality constraints.
    ///
    /// Must be zero for a well-posed solve. Production code does not enforce
    /// this before calling a solver; the solver reports
    /// [`TerminationStatus::IllPosed`] instead.
    #[must_use]
    pub fn degrees_of_freedom(&self) -> isize {
        self.free_vars().len() as isize - self.constraints.len() as isize
    }

    /// Infinity norm of the scaled residual vector at current values.
    #[must_use]
    pub fn residual_norm(&self) -> f64 {
        self.constraints
            .iter()
            .map(|c| (c.residual(&self.pool) * c.scaling()).abs())
            .fold(0.0, f64::max)
    }

    /// Absorbs another system's variables and constraints.
    ///
    /// Constraint closures are shared, so a later scaling pass on either
    /// handle is observed by both.
    pub fn extend_from(&mut self, other: &EquationSystem) {
        self.vars.extend(other.vars.iter().copied());
        self.constraints.extend(other.constraints.iter().cloned());
    }
}

/// Options forwarded to a [`SolverAdapter`].
#[derive(Debug, Clone, Copy)]
pub struct SolverOptions {
    /// Maximum Newton iterations.
    pub max_iters: usize,

    /// Convergence tolerance on the scaled residual infinity norm.
    pub residual_tol: f64,

    /// Relative perturbation for finite-difference Jacobians.
    pub fd_step: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iters: 50,
            residual_tol: 1e-10,
            fd_step: 1e-7,
        }
    }
}

/// How a solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStatus {
    /// Converged to the requested tolerance.
    Optimal,

    /// Iteration limit reached before convergence.
    MaxIterationsExceeded,

    /// The Jacobian lost rank; usually a modeling error or a poor guess.
    SingularJacobian,

    /// The system is not square (degrees of freedom ≠ 0).
    IllPosed,
}

impl TerminationStatus {
    /// Whether the solve converged.
    #[must_use]
    pub fn is_optimal(self) -> bool {
        matches!(self, Self::Optimal)
    }
}

impl std::fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Optimal => "optimal",
            Self::MaxIterationsExceeded => "maximum iterations exceeded",
            Self::SingularJacobian => "singular Jacobian",
            Self::IllPosed => "ill-posed system",
        };
        f.write_str(text)
    }
}

/// Outcome of one solver invocation.
#[derive(Debug, Clone, Copy)]
pub struct SolveReport {
    /// Termination condition.
    pub status: TerminationStatus,

    /// Iterations performed.
    pub iterations: usize,

    /// Scaled residual infinity norm at exit.
    pub residual_norm: f64,
}

/// External nonlinear solver seam.
///
/// Unit and flowsheet initialization call through this trait; swapping the
/// implementation swaps the solver for the whole flowsheet.
pub trait SolverAdapter {
    /// Drives the system's free variables toward zero residual.
    fn solve(&self, system: &EquationSystem, options: &SolverOptions) -> SolveReport;
}

/// Damped Newton iteration with a finite-difference Jacobian.
///
/// Variables and residuals are scaled by their assigned factors before the
/// linear solve, and each step is clipped into the variables' bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewtonSolver;

impl NewtonSolver {
    /// Creates a solver with default behavior.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn scaled_residuals(system: &EquationSystem) -> DVector<f64> {
        let pool = system.pool();
        DVector::from_iterator(
            system.num_constraints(),
            system
                .constraints()
                .iter()
                .map(|c| c.residual(pool) * c.scaling()),
        )
    }

    /// Forward-difference Jacobian of scaled residuals w.r.t. scaled variables.
    fn jacobian(
        system: &EquationSystem,
        free: &[VarId],
        base: &DVector<f64>,
        fd_step: f64,
    ) -> DMatrix<f64> {
        let pool = system.pool();
        let m = system.num_constraints();
        let n = free.len();
        let mut jac = DMatrix::zeros(m, n);
        for (j, &id) in free.iter().enumerate() {
            let x = pool.get(id);
            let sf = pool.scaling_or_default(id);
            let h = fd_step * x.abs().max(1.0);
            // Perturb within bounds: at an upper bound the forward point may
            // leave the residual's domain, so difference backward instead.
            let mut trial = pool.clip(id, x + h);
            if trial == x {
                trial = pool.clip(id, x - h);
            }
            let step = trial - x;
            if step == 0.0 {
                continue;
            }
            pool.set(id, trial);
            let perturbed = Self::scaled_residuals(system);
            pool.set(id, x);
            // d r_scaled / d x_scaled = (dr/dx) / sf_v
            let column = (perturbed - base) / (step * sf);
            jac.set_column(j, &column);
        }
        jac
    }
}

impl SolverAdapter for NewtonSolver {
    fn solve(&self, system: &EquationSystem, options: &SolverOptions) -> SolveReport {
        let pool = system.pool();
        let free = system.free_vars();

        if free.len() != system.num_constraints() {
            return SolveReport {
                status: TerminationStatus::IllPosed,
                iterations: 0,
                residual_norm: system.residual_norm(),
            };
        }
        if free.is_empty() {
            return SolveReport {
                status: TerminationStatus::Optimal,
                iterations: 0,
                residual_norm: 0.0,
            };
        }

        for iteration in 0..options.max_iters {
            let residuals = Self::scaled_residuals(system);
            let norm = residuals.amax();
            if !norm.is_finite() {
                return SolveReport {
                    status: TerminationStatus::SingularJacobian,
                    iterations: iteration,
                    residual_norm: norm,
                };
            }
            if norm < options.residual_tol {
                return SolveReport {
                    status: TerminationStatus::Optimal,
                    iterations: iteration,
                    residual_norm: norm,
                };
            }

            let jac = Self::jacobian(system, &free, &residuals, options.fd_step);
            let Some(step) = jac.lu().solve(&-&residuals) else {
                return SolveReport {
                    status: TerminationStatus::SingularJacobian,
                    iterations: iteration,
                    residual_norm: norm,
                };
            };

            // Backtracking line search on the scaled residual norm.
            let current: Vec<f64> = free.iter().map(|id| pool.get(*id)).collect();
            let mut damping = 1.0;
            loop {
                for ((j, &id), x0) in free.iter().enumerate().zip(&current) {
                    let sf = pool.scaling_or_default(id);
                    let trial = x0 + damping * step[j] / sf;
                    pool.set(id, pool.clip(id, trial));
                }
                let trial_norm = Self::scaled_residuals(system).amax();
                if trial_norm.is_finite() && (trial_norm < norm || damping < 1.0 / 64.0) {
                    break;
                }
                damping *= 0.5;
            }
        }

        SolveReport {
            status: TerminationStatus::MaxIterationsExceeded,
            iterations: options.max_iters,
            residual_norm: system.residual_norm(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn solve_default(system: &EquationSystem) -> SolveReport {
        NewtonSolver::new().solve(system, &SolverOptions::default())
    }

    #[test]
    fn linear_system_converges_in_one_step() {
        let pool = VarPool::new();
        let x = pool.add("x", 0.0);
        let y = pool.add("y", 0.0);
        let mut system = EquationSystem::new(&pool);
        system.add_vars([x, y]);
        system.add_constraint("sum", move |p: &VarPool| p.get(x) + p.get(y) - 3.0);
        system.add_constraint("diff", move |p: &VarPool| p.get(x) - p.get(y) - 1.0);

        let report = solve_default(&system);
        assert!(report.status.is_optimal());
        assert_relative_eq!(pool.get(x), 2.0, max_relative = 1e-10);
        assert_relative_eq!(pool.get(y), 1.0, max_relative = 1e-10);
    }

    #[test]
    fn nonlinear_system_converges() {
        let pool = VarPool::new();
        let x = pool.add_bounded("x", 2.0, Some(0.0), None);
        let mut system = EquationSystem::new(&pool);
        system.add_var(x);
        system.add_constraint("sqrt", move |p: &VarPool| p.get(x) * p.get(x) - 2.0);

        let report = solve_default(&system);
        assert!(report.status.is_optimal());
        assert_relative_eq!(pool.get(x), 2f64.sqrt(), max_relative = 1e-8);
    }

    #[test]
    fn fixed_vars_are_excluded_from_the_free_set() {
        let pool = VarPool::new();
        let x = pool.add("x", 0.0);
        let y = pool.add("y", 0.0);
        let mut system = EquationSystem::new(&pool);
        system.add_vars([x, y]);
        pool.fix_at(x, 4.0);
        system.add_constraint("tie", move |p: &VarPool| p.get(y) - 2.0 * p.get(x));

        assert_eq!(system.degrees_of_freedom(), 0);
        let report = solve_default(&system);
        assert!(report.status.is_optimal());
        assert_relative_eq!(pool.get(y), 8.0, max_relative = 1e-10);
    }

    #[test]
    fn non_square_system_reports_ill_posed() {
        let pool = VarPool::new();
        let x = pool.add("x", 0.0);
        let y = pool.add("y", 0.0);
        let mut system = EquationSystem::new(&pool);
        system.add_vars([x, y]);
        system.add_constraint("only", move |p: &VarPool| p.get(x) + p.get(y));

        assert_eq!(system.degrees_of_freedom(), 1);
        let report = solve_default(&system);
        assert_eq!(report.status, TerminationStatus::IllPosed);
    }

    #[test]
    fn iteration_limit_is_a_status_not_an_error() {
        let pool = VarPool::new();
        let x = pool.add("x", 10.0);
        let mut system = EquationSystem::new(&pool);
        system.add_var(x);
        system.add_constraint("hard", move |p: &VarPool| p.get(x).exp() - 2.0);

        let options = SolverOptions {
            max_iters: 1,
            ..SolverOptions::default()
        };
        let report = NewtonSolver::new().solve(&system, &options);
        assert_eq!(report.status, TerminationStatus::MaxIterationsExceeded);
        assert_eq!(report.iterations, 1);
    }

    #[test]
    fn steps_respect_variable_bounds() {
        let pool = VarPool::new();
        // Solution of ln(x) = -1 is e^-1; an unclipped first Newton step from
        // x0 = 3 would overshoot into negative territory.
        let x = pool.add_bounded("x", 3.0, Some(1e-12), None);
        let mut system = EquationSystem::new(&pool);
        system.add_var(x);
        system.add_constraint("log", move |p: &VarPool| p.get(x).ln() + 1.0);

        let report = solve_default(&system);
        assert!(report.status.is_optimal());
        assert_relative_eq!(pool.get(x), (-1f64).exp(), max_relative = 1e-8);
    }

    #[test]
    fn jacobian_differences_backward_at_an_upper_bound() {
        let pool = VarPool::new();
        // Starting on the upper bound, a forward perturbation would take the
        // square root of a negative number and poison the Jacobian.
        let x = pool.add_bounded("x", 2.0, None, Some(2.0));
        let mut system = EquationSystem::new(&pool);
        system.add_var(x);
        system.add_constraint("sqrt_gap", move |p: &VarPool| {
            (2.0 - p.get(x)).sqrt() - 1.0
        });

        let report = solve_default(&system);
        assert!(report.status.is_optimal());
        assert_relative_eq!(pool.get(x), 1.0, max_relative = 1e-8);
    }

    #[test]
    fn extend_from_shares_constraint_scaling() {
        let pool = VarPool::new();
        let x = pool.add("x", 1.0);
        let mut unit = EquationSystem::new(&pool);
        unit.add_var(x);
        let cid = unit.add_constraint("c", move |p: &VarPool| p.get(x) - 1.0);

        let mut flowsheet = EquationSystem::new(&pool);
        flowsheet.extend_from(&unit);
        unit.scale_constraint(cid, 100.0);
        assert_eq!(flowsheet.constraints()[0].scaling(), 100.0);
    }
}
