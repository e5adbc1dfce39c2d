//! Per-actor command set stack.
//!
//! A [`CmdsetHandler`] holds one layer per contributing source (the actor
//! itself, its location, objects present, overlays such as menus) and folds
//! them into the effective command set on demand. The fold is cached until a
//! layer is added, replaced or removed.
//!
//! A handler is not internally synchronized: every call for one actor must be
//! serialized by the owner (see [`HandlerRegistry`](crate::registry::HandlerRegistry)).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::actor::{ActorId, PermissionOracle};
use crate::cmdset::CommandSet;
use crate::command::CommandDescriptor;
use crate::merge::{self, MergeConflict};
use crate::resolve::{self, Resolution, Resolver};

/// Stable identifier of a contributing source, e.g. `"room:1042"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// What kind of source contributes a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerKind {
    /// The actor's own commands.
    Actor,
    /// The room or area the actor stands in.
    Location,
    /// Anything else present: carried items, furniture, other actors.
    #[default]
    Object,
    /// Temporary session state: menus, dialogues, prompts.
    Overlay,
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Actor => write!(f, "actor"),
            Self::Location => write!(f, "location"),
            Self::Object => write!(f, "object"),
            Self::Overlay => write!(f, "overlay"),
        }
    }
}

/// One contributing source on an actor's stack.
#[derive(Debug, Clone)]
pub struct Layer {
    source: SourceId,
    kind: LayerKind,
    set: Arc<CommandSet>,
    stack_priority: i32,
    /// Insertion counter; later insertions fold later among equal priorities.
    seq: u64,
}

impl Layer {
    pub fn source(&self) -> &SourceId {
        &self.source
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn set(&self) -> &Arc<CommandSet> {
        &self.set
    }

    pub fn stack_priority(&self) -> i32 {
        self.stack_priority
    }
}

#[derive(Debug, Clone)]
struct Merged {
    set: Arc<CommandSet>,
    conflicts: Vec<MergeConflict>,
}

/// An actor's stack of contributing command sets and its cached fold.
#[derive(Debug, Clone)]
pub struct CmdsetHandler {
    actor: ActorId,
    layers: Vec<Layer>,
    next_seq: u64,
    cache: Option<Merged>,
}

impl CmdsetHandler {
    pub fn new(actor: ActorId) -> Self {
        Self {
            actor,
            layers: Vec::new(),
            next_seq: 0,
            cache: None,
        }
    }

    pub fn actor(&self) -> ActorId {
        self.actor
    }

    /// Register (or replace) the layer contributed by `source`.
    ///
    /// The layer is recorded as [`LayerKind::Object`]; use
    /// [`add_layer_as`](Self::add_layer_as) to name another kind.
    pub fn add_layer(
        &mut self,
        source: impl Into<SourceId>,
        set: impl Into<Arc<CommandSet>>,
        stack_priority: i32,
    ) {
        self.add_layer_as(LayerKind::default(), source, set, stack_priority);
    }

    /// Register an overlay layer such as a menu.
    pub fn add_overlay(
        &mut self,
        source: impl Into<SourceId>,
        set: impl Into<Arc<CommandSet>>,
        stack_priority: i32,
    ) {
        self.add_layer_as(LayerKind::Overlay, source, set, stack_priority);
    }

    /// Register (or replace) a layer of the given kind.
    ///
    /// Replacing keeps the layer's original insertion position, so swapping a
    /// source's set never reorders it among equal-priority peers.
    pub fn add_layer_as(
        &mut self,
        kind: LayerKind,
        source: impl Into<SourceId>,
        set: impl Into<Arc<CommandSet>>,
        stack_priority: i32,
    ) {
        let source = source.into();
        let set = set.into();

        if let Some(layer) = self.layers.iter_mut().find(|l| l.source == source) {
            layer.kind = kind;
            layer.set = set;
            layer.stack_priority = stack_priority;
        } else {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.layers.push(Layer {
                source,
                kind,
                set,
                stack_priority,
                seq,
            });
        }
        self.cache = None;
    }

    /// Swap the set of an existing layer, keeping its kind and priority.
    ///
    /// Returns `false` (and changes nothing) when `source` holds no layer.
    pub fn replace_set(&mut self, source: &SourceId, set: impl Into<Arc<CommandSet>>) -> bool {
        match self.layers.iter_mut().find(|l| &l.source == source) {
            Some(layer) => {
                layer.set = set.into();
                self.cache = None;
                true
            }
            None => false,
        }
    }

    /// Deregister the layer contributed by `source`.
    ///
    /// Removing an absent source is a no-op and returns `false`.
    pub fn remove_layer(&mut self, source: &SourceId) -> bool {
        let before = self.layers.len();
        self.layers.retain(|l| &l.source != source);
        let removed = self.layers.len() != before;
        if removed {
            self.cache = None;
        }
        removed
    }

    /// Drop every layer of one kind, e.g. all overlays when a session resets.
    pub fn clear_kind(&mut self, kind: LayerKind) -> usize {
        let before = self.layers.len();
        self.layers.retain(|l| l.kind != kind);
        let removed = before - self.layers.len();
        if removed > 0 {
            self.cache = None;
        }
        removed
    }

    pub fn clear(&mut self) {
        self.layers.clear();
        self.cache = None;
    }

    pub fn has_layer(&self, source: &SourceId) -> bool {
        self.layers.iter().any(|l| &l.source == source)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers in fold order: `stack_priority` ascending, then insertion order.
    pub fn layers(&self) -> Vec<&Layer> {
        let mut ordered: Vec<&Layer> = self.layers.iter().collect();
        ordered.sort_by_key(|l| (l.stack_priority, l.seq));
        ordered
    }

    /// The fully folded command set for this actor right now.
    pub fn get_merged(&mut self) -> Arc<CommandSet> {
        Arc::clone(&self.merged().set)
    }

    /// Conflicts dropped by the current fold.
    pub fn conflicts(&mut self) -> &[MergeConflict] {
        &self.merged().conflicts
    }

    /// Commands in the merged set this actor may use, in merged order.
    pub fn visible_commands<O>(&mut self, oracle: &O) -> Vec<Arc<CommandDescriptor>>
    where
        O: PermissionOracle + ?Sized,
    {
        let actor = self.actor;
        let merged = self.get_merged();
        resolve::visible(&merged, actor, oracle)
            .into_iter()
            .map(|entry| Arc::clone(entry.command()))
            .collect()
    }

    /// Resolve typed input against this actor's merged set.
    pub fn resolve<O>(&mut self, resolver: &Resolver, input: &str, oracle: &O) -> Resolution
    where
        O: PermissionOracle + ?Sized,
    {
        let actor = self.actor;
        let merged = self.get_merged();
        resolver.resolve(input, &merged, actor, oracle)
    }

    fn merged(&mut self) -> &Merged {
        self.cache
            .get_or_insert_with(|| fold_layers(self.actor, &self.layers))
    }
}

fn fold_layers(actor: ActorId, layers: &[Layer]) -> Merged {
    let mut ordered: Vec<&Layer> = layers.iter().collect();
    ordered.sort_by_key(|l| (l.stack_priority, l.seq));

    let outcome = merge::fold(ordered.iter().map(|l| l.set.as_ref()));
    tracing::debug!(
        %actor,
        layers = ordered.len(),
        commands = outcome.set.len(),
        conflicts = outcome.conflicts.len(),
        "command stack recomputed"
    );

    Merged {
        set: Arc::new(outcome.set),
        conflicts: outcome.conflicts,
    }
}
