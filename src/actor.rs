//! Actors and the permission collaborator seam.
//!
//! The engine never interprets access rules. A [`CommandDescriptor`](crate::command::CommandDescriptor)
//! carries an opaque [`AccessRule`] and the engine asks a [`PermissionOracle`]
//! whether a given actor passes it.

use serde::{Deserialize, Serialize};

/// Identifier of an actor (player character, NPC, script) owning a command stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ActorId(u64);

impl ActorId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "actor:{}", self.0)
    }
}

/// Opaque lock token attached to a command.
///
/// The string is only meaningful to the [`PermissionOracle`] that evaluates it.
/// An empty rule is the default; whether it passes is also the oracle's call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessRule(String);

impl AccessRule {
    pub fn new(rule: impl AsRef<str>) -> Self {
        Self(rule.as_ref().to_owned())
    }

    /// The rule with no content.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_open(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for AccessRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccessRule {
    fn from(rule: &str) -> Self {
        Self::new(rule)
    }
}

/// The external permission collaborator.
///
/// Implementations must be side-effect free from the engine's point of view
/// and fast: the resolver calls [`permits`](Self::permits) once per candidate
/// command per resolution.
pub trait PermissionOracle {
    fn permits(&self, actor: ActorId, rule: &AccessRule) -> bool;
}

impl<F> PermissionOracle for F
where
    F: Fn(ActorId, &AccessRule) -> bool,
{
    fn permits(&self, actor: ActorId, rule: &AccessRule) -> bool {
        self(actor, rule)
    }
}

/// Oracle that lets every actor through every rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionOracle for AllowAll {
    fn permits(&self, _actor: ActorId, _rule: &AccessRule) -> bool {
        true
    }
}
