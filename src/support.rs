//! Supporting utilities shared across the crate.
//!
//! Currently this is the type-level numeric [`constraint`] module. Utility
//! code starts inside the model that needs it and moves here once a second
//! domain reaches for it.

pub mod constraint;
