//! Per-actor invocation state, kept beside the commands rather than on them.
//!
//! Command descriptors are shared between every actor whose stack includes
//! them, so transient per-invocation state (cooldowns, counters, partial
//! input) lives here, keyed by `(actor, command key)`. Re-merging an actor's
//! stack never touches this table.

use dashmap::DashMap;
use miette::Diagnostic;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::actor::ActorId;
use crate::command::normalize_name;

/// Errors from typed state access.
#[derive(Debug, Error, Diagnostic)]
pub enum StateError {
    #[error("failed to encode state for {actor} / \"{command}\"")]
    #[diagnostic(
        code(cmdstack::state::encode),
        help("The value could not be converted to JSON. Check its Serialize impl.")
    )]
    Encode {
        actor: ActorId,
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("stored state for {actor} / \"{command}\" has an unexpected shape")]
    #[diagnostic(
        code(cmdstack::state::decode),
        help(
            "The blob stored for this command does not deserialize into the requested type. \
             Another command version may have written it; clear it with `remove()`."
        )
    )]
    Decode {
        actor: ActorId,
        command: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type StateResult<T> = std::result::Result<T, StateError>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StateKey {
    actor: ActorId,
    command: String,
}

impl StateKey {
    fn new(actor: ActorId, command: &str) -> Self {
        Self {
            actor,
            command: normalize_name(command),
        }
    }
}

/// Side table of `(actor, command key) -> JSON blob`.
#[derive(Debug, Default)]
pub struct StateTable {
    entries: DashMap<StateKey, Value>,
}

impl StateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, actor: ActorId, command: &str) -> Option<Value> {
        self.entries
            .get(&StateKey::new(actor, command))
            .map(|r| r.value().clone())
    }

    /// Store a blob, returning the previous one.
    pub fn set(&self, actor: ActorId, command: &str, value: Value) -> Option<Value> {
        self.entries.insert(StateKey::new(actor, command), value)
    }

    /// Replace the blob with `f(current)` atomically for this key and return the new value.
    pub fn update<F>(&self, actor: ActorId, command: &str, f: F) -> Value
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let key = StateKey::new(actor, command);
        let mut slot = self.entries.entry(key).or_insert(Value::Null);
        let current = (!slot.is_null()).then(|| slot.value().clone());
        let next = f(current.as_ref());
        *slot = next.clone();
        next
    }

    pub fn remove(&self, actor: ActorId, command: &str) -> Option<Value> {
        self.entries
            .remove(&StateKey::new(actor, command))
            .map(|(_, v)| v)
    }

    /// Forget everything stored for `actor`. Returns how many entries went.
    pub fn clear_actor(&self, actor: ActorId) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            let keep = key.actor != actor;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Typed read. `Ok(None)` when nothing is stored.
    pub fn get_as<T: DeserializeOwned>(&self, actor: ActorId, command: &str) -> StateResult<Option<T>> {
        self.get(actor, command)
            .map(|value| {
                serde_json::from_value(value).map_err(|source| StateError::Decode {
                    actor,
                    command: normalize_name(command),
                    source,
                })
            })
            .transpose()
    }

    /// Typed write.
    pub fn set_as<T: Serialize>(&self, actor: ActorId, command: &str, value: &T) -> StateResult<()> {
        let value = serde_json::to_value(value).map_err(|source| StateError::Encode {
            actor,
            command: normalize_name(command),
            source,
        })?;
        self.set(actor, command, value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
