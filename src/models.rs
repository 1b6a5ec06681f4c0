//! Unit model implementations.
//!
//! Each unit model owns its state blocks, performance variables, and an
//! [`EquationSystem`] tying them together. Models are built fully configured
//! (construction returns `Result`, so a half-built unit never exists as a
//! value), then initialized through the staged protocol: hold the feed state,
//! seed downstream states from it, solve, and always release the hold.

use std::any::Any;

use crate::core::report::{self, PerformanceContents, StreamTable};
use crate::core::solver::{
    EquationSystem, SolveReport, SolverAdapter, SolverOptions, TerminationStatus,
};
use crate::costing::CostingBlock;

pub mod evaporator;
pub mod pressure_exchanger;
pub mod pump;
pub mod reverse_osmosis;
pub mod zero_order;

/// Outcome of a unit (or flowsheet) initialization.
///
/// Initialization never fails as an `Err`; a solver that did not converge is
/// reported through [`TerminationStatus`] so the caller can retry with better
/// guesses while the model stays usable.
#[derive(Debug, Clone, Copy)]
pub struct InitializeOutcome {
    /// How the embedded solve ended.
    pub status: TerminationStatus,

    /// Solver iterations performed.
    pub iterations: usize,

    /// Scaled residual infinity norm at exit.
    pub residual_norm: f64,
}

impl From<SolveReport> for InitializeOutcome {
    fn from(report: SolveReport) -> Self {
        Self {
            status: report.status,
            iterations: report.iterations,
            residual_norm: report.residual_norm,
        }
    }
}

/// Common interface of all unit models.
pub trait UnitModel {
    /// Fully qualified unit name, e.g. `fs.unit`.
    fn name(&self) -> &str;

    /// The unit's variables and constraints.
    fn equations(&self) -> &EquationSystem;

    /// Runs the staged initialization protocol and solves the unit.
    fn initialize(&mut self, solver: &dyn SolverAdapter, options: &SolverOptions)
    -> InitializeOutcome;

    /// Runs the unit's scaling pass after the default magnitude-based pass.
    fn calculate_scaling_factors(&mut self);

    /// The unit's costing block, if costing has been attached.
    fn costing(&self) -> Option<&CostingBlock> {
        None
    }

    /// Rows for the performance section of [`UnitModel::report`].
    fn performance_contents(&self) -> PerformanceContents;

    /// Columns and rows for the stream section of [`UnitModel::report`].
    fn stream_table(&self) -> StreamTable;

    /// Upcast for typed access through a flowsheet handle.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for typed access through a flowsheet handle.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Renders the fixed-format unit report.
    fn report(&self) -> String {
        report::render(self.name(), &self.performance_contents(), &self.stream_table())
    }
}
