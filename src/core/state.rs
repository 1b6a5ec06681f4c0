//! State blocks and the hold/release initialization protocol.
//!
//! A state block is the set of variables describing a material stream's
//! thermodynamic state at one point. Concrete blocks live with their property
//! packages in [`crate::properties`]; this module defines the trait they
//! share and the initialization contract of the staged protocol:
//!
//! 1. The feed (defined) block is initialized with `hold = true`, which fixes
//!    every state variable that is not already fixed and returns
//!    [`HoldFlags`] recording exactly those variables.
//! 2. Downstream (undefined) blocks are initialized from [`StateArgs`]
//!    derived from the feed, without holding, so their variables stay free
//!    for the solve.
//! 3. After the unit solve, regardless of its outcome, the flags are passed
//!    to [`release_state`], restoring mutability of exactly the variables the
//!    hold fixed.
//!
//! `HoldFlags` is consumed by value on release, so double-release and
//! release-without-hold are compile errors rather than runtime ones.

use std::collections::BTreeMap;

use crate::core::variable::{VarId, VarPool};

/// Starting guesses for a state block's state variables, keyed by member name.
///
/// When a unit initializes a downstream block it derives the arguments by
/// copying the current numeric values of the feed block's port members; a
/// state block cannot initialize itself without some starting guess.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateArgs {
    values: BTreeMap<String, f64>,
}

impl StateArgs {
    /// Creates an empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies the current values of a state's port members.
    #[must_use]
    pub fn from_state(pool: &VarPool, state: &dyn StateBlock) -> Self {
        let values = state
            .port_members()
            .into_iter()
            .map(|(name, id)| (name, pool.get(id)))
            .collect();
        Self { values }
    }

    /// Inserts or replaces one member value.
    pub fn insert(&mut self, member: impl Into<String>, value: f64) -> &mut Self {
        self.values.insert(member.into(), value);
        self
    }

    /// Looks up the value for one member, if present.
    #[must_use]
    pub fn get(&self, member: &str) -> Option<f64> {
        self.values.get(member).copied()
    }
}

/// Record of the variables fixed by an `initialize(.., hold = true)` call.
///
/// Opaque to callers; the only thing to do with it is hand it back to
/// [`release_state`]. Dropping it without releasing leaves the model
/// over-constrained for downstream units.
#[derive(Debug)]
#[must_use = "held state variables must be released after the solve"]
pub struct HoldFlags {
    fixed: Vec<VarId>,
}

impl HoldFlags {
    pub(crate) fn new(fixed: Vec<VarId>) -> Self {
        Self { fixed }
    }

    /// Number of variables fixed by the hold.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fixed.len()
    }

    /// Whether the hold fixed no variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fixed.is_empty()
    }
}

/// Releases the variables fixed by a hold, consuming the flags.
pub fn release_state(pool: &VarPool, flags: HoldFlags) {
    for id in flags.fixed {
        pool.unfix(id);
    }
}

/// The variables describing one material stream at one point.
pub trait StateBlock {
    /// Whether this block represents a defined (feed) state.
    fn defined_state(&self) -> bool;

    /// The state variables of this block.
    fn state_vars(&self) -> Vec<VarId>;

    /// Named references to the state variables exposed through ports.
    fn port_members(&self) -> Vec<(String, VarId)>;

    /// Access to the pool holding this block's variables.
    fn pool(&self) -> &VarPool;

    /// Brings the block to a solver-ready state.
    ///
    /// Values from `state_args` are applied to every member that is not
    /// already fixed. With `hold = true`, all currently-free state variables
    /// are then fixed and recorded in the returned [`HoldFlags`]; with
    /// `hold = false` the return value is `None`.
    fn initialize(&mut self, state_args: Option<&StateArgs>, hold: bool) -> Option<HoldFlags> {
        let pool = self.pool().clone();
        if let Some(args) = state_args {
            for (name, id) in self.port_members() {
                if !pool.is_fixed(id)
                    && let Some(value) = args.get(&name)
                {
                    pool.set(id, value);
                }
            }
        }
        if hold {
            let mut fixed = Vec::new();
            for id in self.state_vars() {
                if !pool.is_fixed(id) {
                    pool.fix(id);
                    fixed.push(id);
                }
            }
            Some(HoldFlags::new(fixed))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TwoVarState {
        pool: VarPool,
        a: VarId,
        b: VarId,
    }

    impl TwoVarState {
        fn new(pool: &VarPool) -> Self {
            Self {
                pool: pool.clone(),
                a: pool.add("a", 1.0),
                b: pool.add("b", 2.0),
            }
        }
    }

    impl StateBlock for TwoVarState {
        fn defined_state(&self) -> bool {
            true
        }

        fn state_vars(&self) -> Vec<VarId> {
            vec![self.a, self.b]
        }

        fn port_members(&self) -> Vec<(String, VarId)> {
            vec![("a".into(), self.a), ("b".into(), self.b)]
        }

        fn pool(&self) -> &VarPool {
            &self.pool
        }
    }

    #[test]
    fn hold_fixes_only_free_vars_and_release_restores_them() {
        let pool = VarPool::new();
        let mut state = TwoVarState::new(&pool);
        pool.fix(state.a); // user-specified before initialization

        let flags = state.initialize(None, true).unwrap();
        assert_eq!(flags.len(), 1);
        assert!(pool.is_fixed(state.a));
        assert!(pool.is_fixed(state.b));

        release_state(&pool, flags);
        assert!(pool.is_fixed(state.a)); // untouched: fixed before the hold
        assert!(!pool.is_fixed(state.b));
        assert_eq!(pool.get(state.b), 2.0);
    }

    #[test]
    fn state_args_do_not_overwrite_fixed_values() {
        let pool = VarPool::new();
        let mut state = TwoVarState::new(&pool);
        pool.fix_at(state.a, 5.0);

        let mut args = StateArgs::new();
        args.insert("a", 9.0).insert("b", 7.0);
        let flags = state.initialize(Some(&args), true).unwrap();

        assert_eq!(pool.get(state.a), 5.0);
        assert_eq!(pool.get(state.b), 7.0);
        release_state(&pool, flags);
    }

    #[test]
    fn args_derived_from_reference_state() {
        let pool = VarPool::new();
        let feed = TwoVarState::new(&pool);
        pool.set(feed.a, 3.5);

        let args = StateArgs::from_state(&pool, &feed);
        assert_eq!(args.get("a"), Some(3.5));
        assert_eq!(args.get("b"), Some(2.0));
    }

    #[test]
    fn initialize_without_hold_returns_no_flags() {
        let pool = VarPool::new();
        let mut state = TwoVarState::new(&pool);
        assert!(state.initialize(None, false).is_none());
        assert!(!pool.is_fixed(state.a));
    }
}
