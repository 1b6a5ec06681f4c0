//! Property packages and their state blocks.
//!
//! Property calculations sit behind traits so unit models never embed a
//! particular correlation set. Each package pairs a property model with a
//! state block type implementing [`StateBlock`](crate::core::state::StateBlock)
//! for the streams it describes:
//!
//! - [`water`]: per-component mass flows with constant liquid density, for
//!   zero-order treatment units.
//! - [`seawater`]: H2O/TDS mass flows plus temperature and pressure, for
//!   desalination units.
//! - [`vapor`]: two-phase water, for evaporators.

pub mod seawater;
pub mod vapor;
pub mod water;
