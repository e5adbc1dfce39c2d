//! Handler registry: actor ID → command stack.
//!
//! The [`HandlerRegistry`] is an ordinary value owned by whatever runs the
//! sessions; there is no process-wide instance. It is backed by a `DashMap`,
//! so different actors' stacks can be worked on from different threads while
//! each individual handler is only ever reached through an exclusive borrow.

use std::sync::Arc;

use dashmap::DashMap;

use crate::actor::ActorId;
use crate::cmdset::CommandSet;
use crate::stack::{CmdsetHandler, LayerKind, SourceId};

/// Per-actor command stacks.
pub struct HandlerRegistry {
    handlers: DashMap<ActorId, CmdsetHandler>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Make sure `actor` has a handler. Returns `true` if one was created.
    pub fn attach(&self, actor: ActorId) -> bool {
        let mut created = false;
        self.handlers.entry(actor).or_insert_with(|| {
            created = true;
            CmdsetHandler::new(actor)
        });
        created
    }

    /// Remove and return an actor's handler, e.g. when the session ends.
    pub fn detach(&self, actor: ActorId) -> Option<CmdsetHandler> {
        self.handlers.remove(&actor).map(|(_, handler)| handler)
    }

    pub fn contains(&self, actor: ActorId) -> bool {
        self.handlers.contains_key(&actor)
    }

    /// Run `f` with exclusive access to the actor's handler, creating it if needed.
    ///
    /// `f` must not call back into this registry: the actor's shard stays
    /// locked for the duration of the call.
    pub fn with_handler<R>(&self, actor: ActorId, f: impl FnOnce(&mut CmdsetHandler) -> R) -> R {
        let mut handler = self
            .handlers
            .entry(actor)
            .or_insert_with(|| CmdsetHandler::new(actor));
        f(handler.value_mut())
    }

    /// The merged set of an attached actor.
    pub fn get_merged(&self, actor: ActorId) -> Option<Arc<CommandSet>> {
        self.handlers
            .get_mut(&actor)
            .map(|mut handler| handler.get_merged())
    }

    /// Add the same layer to several actors at once, e.g. everyone in a room.
    pub fn add_layer_for<I>(
        &self,
        actors: I,
        kind: LayerKind,
        source: &SourceId,
        set: &Arc<CommandSet>,
        stack_priority: i32,
    ) where
        I: IntoIterator<Item = ActorId>,
    {
        for actor in actors {
            self.with_handler(actor, |handler| {
                handler.add_layer_as(kind, source.clone(), Arc::clone(set), stack_priority)
            });
        }
    }

    /// Remove `source` from every stack holding it. Returns how many stacks changed.
    pub fn remove_layer_everywhere(&self, source: &SourceId) -> usize {
        self.handlers
            .iter_mut()
            .filter_map(|mut handler| handler.remove_layer(source).then_some(()))
            .count()
    }

    /// Swap the set behind `source` in every stack holding it, keeping each
    /// stack's priority for it. Returns how many stacks changed.
    pub fn replace_layer_everywhere(&self, source: &SourceId, set: &Arc<CommandSet>) -> usize {
        self.handlers
            .iter_mut()
            .filter_map(|mut handler| handler.replace_set(source, Arc::clone(set)).then_some(()))
            .count()
    }

    /// Attached actors, sorted.
    pub fn actors(&self) -> Vec<ActorId> {
        let mut actors: Vec<ActorId> = self.handlers.iter().map(|r| *r.key()).collect();
        actors.sort_unstable();
        actors
    }

    /// Number of attached actors.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no actor is attached.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("count", &self.len())
            .finish()
    }
}
