//! Modeling machinery shared by every unit model.
//!
//! The pieces here mirror the layered design of the flowsheet: scalar
//! variables live in a [`variable::VarPool`]; [`state`] blocks group the
//! variables describing one material stream; [`port`]s bundle state variables
//! for unit-to-unit connections; [`solver`] defines equation systems and the
//! adapter seam to the nonlinear solver; [`scaling`] conditions systems before
//! a solve; [`report`] renders the fixed-format unit reports; and
//! [`database`] supplies technology parameter sets.

pub mod database;
pub mod error;
pub mod port;
pub mod report;
pub mod scaling;
pub mod solver;
pub mod state;
pub mod variable;
