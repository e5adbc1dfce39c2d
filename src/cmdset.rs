//! Command sets: keyed containers of command descriptors plus merge metadata.
//!
//! A [`CommandSet`] is immutable once built. Every merge produces a new set
//! (see [`crate::merge`]); operands are never touched, so one set can be
//! layered onto many actors' stacks at the same time.
//!
//! Entries are kept in a canonical order: origin priority descending, then
//! the command's `priority_in_set` descending, then key ascending. Listings
//! and ambiguity prompts rely on this order.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::command::{normalize_name, CommandDescriptor};
use crate::error::{CommandSetError, CommandSetResult};

// ---------------------------------------------------------------------------
// Merge metadata
// ---------------------------------------------------------------------------

/// How a set combines with whatever it is merged onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeType {
    /// All commands from both sides; collisions settled by priority, then policy.
    #[default]
    Union,
    /// Only commands present on both sides.
    Intersect,
    /// Only this set's commands, unless this set is empty.
    Replace,
    /// The base minus anything this set names. This set's commands are discarded.
    Remove,
    /// Union that loses every equal-priority collision with a non-Neutral set.
    Neutral,
}

impl std::fmt::Display for MergeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Union => write!(f, "union"),
            Self::Intersect => write!(f, "intersect"),
            Self::Replace => write!(f, "replace"),
            Self::Remove => write!(f, "remove"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

impl MergeType {
    /// Parse a merge type from a string label.
    pub fn from_label(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "union" => Some(Self::Union),
            "intersect" => Some(Self::Intersect),
            "replace" => Some(Self::Replace),
            "remove" => Some(Self::Remove),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }
}

/// How a Union collision between equal-priority commands is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Higher `priority_in_set` wins; a full tie falls through to [`KeepNewest`](Self::KeepNewest).
    #[default]
    KeepHighestPriority,
    /// The command from the set merged later wins.
    KeepNewest,
    /// Drop the command and report an ambiguity conflict.
    Error,
}

impl std::fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeepHighestPriority => write!(f, "keep-highest-priority"),
            Self::KeepNewest => write!(f, "keep-newest"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Set-level metadata shared by built and merged sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetMeta {
    pub key: String,
    pub merge_type: MergeType,
    pub priority: i32,
    pub duplicate_policy: DuplicatePolicy,
    pub no_exits: bool,
    pub no_objs: bool,
    pub no_channels: bool,
    /// Merge type to use instead of `merge_type` when merging onto a set with this key.
    pub key_merge_types: BTreeMap<String, MergeType>,
}

impl SetMeta {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            merge_type: MergeType::default(),
            priority: 0,
            duplicate_policy: DuplicatePolicy::default(),
            no_exits: false,
            no_objs: false,
            no_channels: false,
            key_merge_types: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Where a command in a (possibly merged) set came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// Key of the set that contributed the command.
    pub set_key: String,
    /// That set's priority.
    pub priority: i32,
    /// Whether that set merged as Neutral, after any per-base override.
    pub neutral: bool,
}

/// A command together with its provenance.
#[derive(Debug, Clone)]
pub struct SetEntry {
    command: Arc<CommandDescriptor>,
    origin: Origin,
}

impl SetEntry {
    pub fn command(&self) -> &Arc<CommandDescriptor> {
        &self.command
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn key(&self) -> &str {
        self.command.key()
    }

    /// A copy of this entry contributed under `merge_type`, which may differ
    /// from the set's own type through `key_merge_types`.
    pub(crate) fn merged_as(&self, merge_type: MergeType) -> SetEntry {
        let mut entry = self.clone();
        entry.origin.neutral = merge_type == MergeType::Neutral;
        entry
    }
}

// ---------------------------------------------------------------------------
// Command set
// ---------------------------------------------------------------------------

/// A named, keyed collection of commands with merge metadata.
#[derive(Debug, Clone)]
pub struct CommandSet {
    meta: SetMeta,
    entries: Vec<SetEntry>,
    /// Every key and alias -> position in `entries`.
    index: HashMap<String, usize>,
}

impl CommandSet {
    /// Start building a set with the given key.
    pub fn builder(key: impl Into<String>) -> CommandSetBuilder {
        CommandSetBuilder::new(key)
    }

    /// An empty Union set at priority 0.
    pub fn empty(key: impl Into<String>) -> Self {
        Self {
            meta: SetMeta::new(key),
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Assemble a set from entries whose names are already known to be unique.
    pub(crate) fn from_entries(meta: SetMeta, mut entries: Vec<SetEntry>) -> Self {
        entries.sort_by(|a, b| {
            b.origin
                .priority
                .cmp(&a.origin.priority)
                .then_with(|| b.command.priority_in_set().cmp(&a.command.priority_in_set()))
                .then_with(|| a.command.key().cmp(b.command.key()))
        });

        let mut index = HashMap::new();
        for (pos, entry) in entries.iter().enumerate() {
            for name in entry.command.names() {
                let previous = index.insert(name.to_owned(), pos);
                debug_assert!(previous.is_none(), "name {name} claimed twice in merged set");
            }
        }

        Self {
            meta,
            entries,
            index,
        }
    }

    pub fn meta(&self) -> &SetMeta {
        &self.meta
    }

    pub fn key(&self) -> &str {
        &self.meta.key
    }

    pub fn merge_type(&self) -> MergeType {
        self.meta.merge_type
    }

    /// The merge type this set applies when merged onto a set keyed `base_key`.
    pub fn merge_type_against(&self, base_key: &str) -> MergeType {
        self.meta
            .key_merge_types
            .get(base_key)
            .copied()
            .unwrap_or(self.meta.merge_type)
    }

    pub fn priority(&self) -> i32 {
        self.meta.priority
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.meta.duplicate_policy
    }

    pub fn no_exits(&self) -> bool {
        self.meta.no_exits
    }

    pub fn no_objs(&self) -> bool {
        self.meta.no_objs
    }

    pub fn no_channels(&self) -> bool {
        self.meta.no_channels
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in canonical order.
    pub fn entries(&self) -> &[SetEntry] {
        &self.entries
    }

    pub fn commands(&self) -> impl Iterator<Item = &Arc<CommandDescriptor>> {
        self.entries.iter().map(|e| &e.command)
    }

    /// Canonical keys in canonical order.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(SetEntry::key).collect()
    }

    /// Look up an entry by key or alias (normalized before lookup).
    pub fn entry(&self, name: &str) -> Option<&SetEntry> {
        self.index
            .get(&normalize_name(name))
            .map(|&pos| &self.entries[pos])
    }

    /// Look up a command by key or alias.
    pub fn get(&self, name: &str) -> Option<&Arc<CommandDescriptor>> {
        self.entry(name).map(SetEntry::command)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Entries of this set claiming any name of `command`, each listed once.
    pub(crate) fn colliding(&self, command: &CommandDescriptor) -> Vec<usize> {
        let mut hits: Vec<usize> = command
            .names()
            .filter_map(|name| self.index.get(name).copied())
            .collect();
        hits.sort_unstable();
        hits.dedup();
        hits
    }

    /// Same keys bound to the very same descriptor instances, in the same order.
    pub fn same_bindings(&self, other: &CommandSet) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|(a, b)| Arc::ptr_eq(&a.command, &b.command) && a.origin == b.origin)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`CommandSet`]; name uniqueness is checked in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct CommandSetBuilder {
    meta: SetMeta,
    commands: Vec<Arc<CommandDescriptor>>,
}

impl CommandSetBuilder {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            meta: SetMeta::new(key),
            commands: Vec::new(),
        }
    }

    pub fn merge_type(mut self, merge_type: MergeType) -> Self {
        self.meta.merge_type = merge_type;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.meta.priority = priority;
        self
    }

    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.meta.duplicate_policy = policy;
        self
    }

    pub fn no_exits(mut self, flag: bool) -> Self {
        self.meta.no_exits = flag;
        self
    }

    pub fn no_objs(mut self, flag: bool) -> Self {
        self.meta.no_objs = flag;
        self
    }

    pub fn no_channels(mut self, flag: bool) -> Self {
        self.meta.no_channels = flag;
        self
    }

    /// Use `merge_type` instead of the set's own type when merging onto `base_key`.
    pub fn key_merge_type(mut self, base_key: impl Into<String>, merge_type: MergeType) -> Self {
        self.meta.key_merge_types.insert(base_key.into(), merge_type);
        self
    }

    pub fn command(self, command: CommandDescriptor) -> Self {
        self.shared_command(command.into_shared())
    }

    /// Register an already-shared descriptor, keeping its identity.
    pub fn shared_command(mut self, command: Arc<CommandDescriptor>) -> Self {
        self.commands.push(command);
        self
    }

    /// Validate and freeze the set.
    ///
    /// Fails with [`CommandSetError::DuplicateKey`] when two commands claim the
    /// same key or alias, and [`CommandSetError::EmptyKey`] for a blank key.
    pub fn build(self) -> CommandSetResult<CommandSet> {
        let mut owners: HashMap<&str, &str> = HashMap::new();
        for command in &self.commands {
            if command.key().is_empty() {
                return Err(CommandSetError::EmptyKey {
                    set: self.meta.key.clone(),
                });
            }
            for name in command.names() {
                if let Some(existing) = owners.insert(name, command.key()) {
                    return Err(CommandSetError::DuplicateKey {
                        set: self.meta.key.clone(),
                        name: name.to_owned(),
                        existing: existing.to_owned(),
                        incoming: command.key().to_owned(),
                    });
                }
            }
        }

        let origin = Origin {
            set_key: self.meta.key.clone(),
            priority: self.meta.priority,
            neutral: self.meta.merge_type == MergeType::Neutral,
        };
        let entries = self
            .commands
            .into_iter()
            .map(|command| SetEntry {
                command,
                origin: origin.clone(),
            })
            .collect();

        Ok(CommandSet::from_entries(self.meta, entries))
    }
}
