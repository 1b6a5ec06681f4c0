//! # Aquasheet
//!
//! Flowsheet models and model-building tools for water-treatment systems.
//!
//! Process units (reverse osmosis, evaporators, pumps, aeration basins) are
//! expressed as coupled nonlinear equation systems over a shared pool of
//! scalar variables and solved by a pluggable nonlinear solver. Costing
//! extensions derive capital and operating costs from solved unit state and
//! roll up into flowsheet-level metrics such as the levelized cost of water.
//!
//! ## Crate layout
//!
//! - [`core`]: Modeling machinery: variable pool, state blocks, ports,
//!   equation systems, the solver adapter, scaling, reporting, and the unit
//!   parameter database.
//! - [`properties`]: Property packages consumed by unit models through narrow
//!   trait seams.
//! - [`models`]: Unit model implementations, the primary public interface.
//! - [`costing`]: Per-unit costing extensions and system-level costing.
//! - [`flowsheet`]: Container composing unit models into a solvable system.
//! - [`support`]: Type-level numeric constraints shared across the crate.
//!
//! ## Example
//!
//! ```
//! use aquasheet::core::database::Database;
//! use aquasheet::core::solver::{NewtonSolver, SolverOptions};
//! use aquasheet::core::variable::VarPool;
//! use aquasheet::models::UnitModel;
//! use aquasheet::models::zero_order::aeration_basin::{AerationBasin, AerationBasinConfig};
//! use aquasheet::properties::water::WaterPropertyPackage;
//! use std::rc::Rc;
//!
//! let pool = VarPool::new();
//! let package = Rc::new(WaterPropertyPackage::new(["bod"]));
//! let config = AerationBasinConfig {
//!     name: "fs.unit".into(),
//!     property_package: Some(package),
//!     process_subtype: None,
//! };
//! let mut unit = AerationBasin::build(&pool, config).unwrap();
//!
//! unit.fix_inlet_flow("H2O", 10.0).unwrap();
//! unit.fix_inlet_flow("bod", 1.0).unwrap();
//! unit.load_parameters_from_database(&Database::new(), false).unwrap();
//! assert_eq!(unit.equations().degrees_of_freedom(), 0);
//!
//! unit.calculate_scaling_factors();
//! let outcome = unit.initialize(&NewtonSolver::new(), &SolverOptions::default());
//! assert!(outcome.status.is_optimal());
//! ```

pub mod core;
pub mod costing;
pub mod flowsheet;
pub mod models;
pub mod properties;
pub mod support;
