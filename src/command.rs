//! Command descriptors: the invokable actions a command set is made of.
//!
//! A [`CommandDescriptor`] is plain data plus two opaque handles: the
//! [`AccessRule`] the permission collaborator evaluates, and a [`Capability`]
//! the execution layer downcasts to whatever it uses to run the command.
//! The engine never calls either of them directly.
//!
//! Descriptors are shared as `Arc<CommandDescriptor>` once registered in a
//! set; merges move `Arc`s around, so the same instance survives any number
//! of re-merges.

use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::actor::AccessRule;

/// Default help category for commands that don't name one.
pub const DEFAULT_HELP_CATEGORY: &str = "general";

/// Normalize a command key, alias or typed command word.
///
/// Trims, collapses runs of whitespace to a single space and lower-cases.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Type-erased handle to the execution layer's implementation of a command.
#[derive(Clone)]
pub struct Capability(Arc<dyn Any + Send + Sync>);

impl Capability {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrow the wrapped value if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Capability(..)")
    }
}

/// One invokable action: canonical key, aliases, lock and ordering metadata.
#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    key: String,
    /// Sorted so name iteration order is stable.
    aliases: BTreeSet<String>,
    access: AccessRule,
    priority_in_set: i32,
    help_category: String,
    auto_help: bool,
    capability: Option<Capability>,
}

impl CommandDescriptor {
    /// Create a descriptor with an open access rule and default metadata.
    pub fn new(key: impl AsRef<str>) -> Self {
        Self {
            key: normalize_name(key.as_ref()),
            aliases: BTreeSet::new(),
            access: AccessRule::open(),
            priority_in_set: 0,
            help_category: DEFAULT_HELP_CATEGORY.into(),
            auto_help: true,
            capability: None,
        }
    }

    /// Add an alias. Blank aliases and aliases equal to the key are ignored.
    pub fn with_alias(mut self, alias: impl AsRef<str>) -> Self {
        let alias = normalize_name(alias.as_ref());
        if !alias.is_empty() && alias != self.key {
            self.aliases.insert(alias);
        }
        self
    }

    pub fn with_aliases<I, S>(self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        aliases
            .into_iter()
            .fold(self, |cmd, alias| cmd.with_alias(alias))
    }

    pub fn with_access(mut self, access: AccessRule) -> Self {
        self.access = access;
        self
    }

    pub fn with_priority(mut self, priority_in_set: i32) -> Self {
        self.priority_in_set = priority_in_set;
        self
    }

    pub fn with_help_category(mut self, category: impl Into<String>) -> Self {
        self.help_category = category.into();
        self
    }

    /// Hide this command from generated help listings.
    pub fn without_auto_help(mut self) -> Self {
        self.auto_help = false;
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = Some(capability);
        self
    }

    /// Freeze the descriptor for registration into a set.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.aliases.iter().map(String::as_str)
    }

    /// Key first, then aliases in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.key.as_str()).chain(self.aliases())
    }

    /// Whether `name` (already normalized) is this command's key or one of its aliases.
    pub fn has_name(&self, name: &str) -> bool {
        self.key == name || self.aliases.contains(name)
    }

    /// Whether the two commands claim at least one common key or alias.
    pub fn shares_name_with(&self, other: &CommandDescriptor) -> bool {
        other.names().any(|name| self.has_name(name))
    }

    pub fn access(&self) -> &AccessRule {
        &self.access
    }

    pub fn priority_in_set(&self) -> i32 {
        self.priority_in_set
    }

    pub fn help_category(&self) -> &str {
        &self.help_category
    }

    pub fn auto_help(&self) -> bool {
        self.auto_help
    }

    pub fn capability(&self) -> Option<&Capability> {
        self.capability.as_ref()
    }
}
