//! Ports: named variable bundles connecting units.

use std::collections::BTreeMap;

use crate::core::error::ConfigurationError;
use crate::core::solver::EquationSystem;
use crate::core::variable::{VarId, VarPool};

/// A named bundle of references into a state block's state variables.
///
/// Ports are how units are wired together: connecting two ports asserts
/// equality of each pair of like-named members. The member sets of connected
/// ports must be identical.
#[derive(Debug, Clone)]
pub struct Port {
    name: String,
    members: BTreeMap<String, VarId>,
}

impl Port {
    /// Creates a port from named members.
    pub fn new(
        name: impl Into<String>,
        members: impl IntoIterator<Item = (String, VarId)>,
    ) -> Self {
        Self {
            name: name.into(),
            members: members.into_iter().collect(),
        }
    }

    /// Name of the port.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The port's members in name order.
    pub fn members(&self) -> impl Iterator<Item = (&str, VarId)> {
        self.members.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Looks up one member by name.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<VarId> {
        self.members.get(name).copied()
    }

    fn check_compatible(&self, other: &Port) -> Result<(), ConfigurationError> {
        let mine: Vec<&String> = self.members.keys().collect();
        let theirs: Vec<&String> = other.members.keys().collect();
        if mine != theirs {
            return Err(ConfigurationError::new(
                self.name.clone(),
                format!(
                    "cannot connect to port {}: member sets differ ({mine:?} vs {theirs:?})",
                    other.name
                ),
            ));
        }
        Ok(())
    }
}

/// Connects two ports by adding one equality constraint per member pair.
///
/// # Errors
///
/// Returns a [`ConfigurationError`] if the ports do not expose identical
/// member sets.
pub fn connect(
    system: &mut EquationSystem,
    from: &Port,
    to: &Port,
) -> Result<(), ConfigurationError> {
    from.check_compatible(to)?;
    for (name, src) in from.members() {
        let dst = to
            .member(name)
            .expect("member sets were checked to be identical");
        system.add_constraint(
            format!("{}__{}_{name}_equality", from.name(), to.name()),
            move |pool: &VarPool| pool.get(src) - pool.get(dst),
        );
    }
    Ok(())
}

/// Copies current member values from one port to another.
///
/// Used during sequential initialization to hand a solved upstream state to
/// the next unit's inlet before its own staged initialization runs. Fixed
/// destination members are left untouched.
///
/// # Errors
///
/// Returns a [`ConfigurationError`] if the ports do not expose identical
/// member sets.
pub fn propagate(pool: &VarPool, from: &Port, to: &Port) -> Result<(), ConfigurationError> {
    from.check_compatible(to)?;
    for (name, src) in from.members() {
        let dst = to
            .member(name)
            .expect("member sets were checked to be identical");
        if !pool.is_fixed(dst) {
            pool.set(dst, pool.get(src));
        }
    }
    Ok(())
}
