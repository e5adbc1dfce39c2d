//! Command set catalogs: command sets, layers and resolver settings in TOML.
//!
//! ```toml
//! [resolver]
//! min_prefix_len = 2
//!
//! [[set]]
//! key = "default"
//! merge_type = "union"
//!
//! [[set.command]]
//! key = "look"
//! aliases = ["l"]
//!
//! [[layer]]
//! source = "actor:self"
//! set = "default"
//! kind = "actor"
//!
//! [actor]
//! id = 1
//! grants = ["perm(builder)"]
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actor::{AccessRule, ActorId, PermissionOracle};
use crate::cmdset::{CommandSet, DuplicatePolicy, MergeType};
use crate::command::{CommandDescriptor, DEFAULT_HELP_CATEGORY};
use crate::error::CommandSetError;
use crate::resolve::ResolverConfig;
use crate::stack::{CmdsetHandler, LayerKind};

/// Errors from catalog loading.
#[derive(Debug, Error, Diagnostic)]
pub enum CatalogError {
    #[error("failed to read catalog: {path}")]
    #[diagnostic(
        code(cmdstack::catalog::io),
        help("Check that the catalog file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog {path}: {message}")]
    #[diagnostic(
        code(cmdstack::catalog::parse),
        help(
            "Check the TOML syntax. Sets are `[[set]]` tables with nested \
             `[[set.command]]` tables; merge types and policies are kebab-case \
             (\"union\", \"keep-newest\")."
        )
    )]
    Parse { path: String, message: String },

    #[error("command set \"{key}\" is defined twice")]
    #[diagnostic(
        code(cmdstack::catalog::duplicate_set),
        help("Set keys must be unique within one catalog.")
    )]
    DuplicateSet { key: String },

    #[error("layer \"{source_id}\" refers to unknown set \"{set}\"")]
    #[diagnostic(
        code(cmdstack::catalog::unknown_set),
        help("Define a `[[set]]` with key \"{set}\" or fix the layer's `set` field.")
    )]
    UnknownSet { source_id: String, set: String },

    #[error("layer source \"{source_id}\" appears more than once")]
    #[diagnostic(
        code(cmdstack::catalog::duplicate_source),
        help("Each source contributes exactly one layer; give the layers distinct `source` ids.")
    )]
    DuplicateSource { source_id: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Set(#[from] CommandSetError),
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

// ---------------------------------------------------------------------------
// File format
// ---------------------------------------------------------------------------

/// Raw catalog file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default, rename = "set")]
    pub sets: Vec<SetDef>,
    #[serde(default, rename = "layer")]
    pub layers: Vec<LayerDef>,
    #[serde(default)]
    pub actor: ActorDef,
}

/// One `[[set]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetDef {
    pub key: String,
    #[serde(default)]
    pub merge_type: MergeType,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    #[serde(default)]
    pub no_exits: bool,
    #[serde(default)]
    pub no_objs: bool,
    #[serde(default)]
    pub no_channels: bool,
    /// Per-base-set merge type overrides.
    #[serde(default)]
    pub key_merge_types: BTreeMap<String, MergeType>,
    #[serde(default, rename = "command")]
    pub commands: Vec<CommandDef>,
}

/// One `[[set.command]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDef {
    pub key: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Opaque lock string handed to the permission oracle.
    #[serde(default)]
    pub lock: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_help_category")]
    pub help_category: String,
    #[serde(default = "default_auto_help")]
    pub auto_help: bool,
}

/// One `[[layer]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerDef {
    pub source: String,
    pub set: String,
    #[serde(default)]
    pub stack_priority: i32,
    #[serde(default)]
    pub kind: LayerKind,
}

/// The `[actor]` table: who the layers are stacked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorDef {
    #[serde(default = "default_actor_id")]
    pub id: u64,
    /// Lock strings this actor passes.
    #[serde(default)]
    pub grants: Vec<String>,
}

impl Default for ActorDef {
    fn default() -> Self {
        Self {
            id: default_actor_id(),
            grants: Vec::new(),
        }
    }
}

fn default_help_category() -> String {
    DEFAULT_HELP_CATEGORY.into()
}
fn default_auto_help() -> bool {
    true
}
fn default_actor_id() -> u64 {
    1
}

impl CommandDef {
    fn to_descriptor(&self) -> CommandDescriptor {
        let mut command = CommandDescriptor::new(&self.key)
            .with_aliases(&self.aliases)
            .with_access(AccessRule::new(&self.lock))
            .with_priority(self.priority)
            .with_help_category(self.help_category.clone());
        if !self.auto_help {
            command = command.without_auto_help();
        }
        command
    }
}

impl SetDef {
    fn build(&self) -> CatalogResult<CommandSet> {
        let builder = CommandSet::builder(self.key.clone())
            .merge_type(self.merge_type)
            .priority(self.priority)
            .duplicate_policy(self.duplicate_policy)
            .no_exits(self.no_exits)
            .no_objs(self.no_objs)
            .no_channels(self.no_channels);
        let builder = self
            .key_merge_types
            .iter()
            .fold(builder, |b, (base, mt)| b.key_merge_type(base.clone(), *mt));
        let builder = self
            .commands
            .iter()
            .fold(builder, |b, def| b.command(def.to_descriptor()));
        Ok(builder.build()?)
    }
}

// ---------------------------------------------------------------------------
// Grants oracle
// ---------------------------------------------------------------------------

/// Oracle that passes open rules and rules listed verbatim in a grant list.
#[derive(Debug, Clone, Default)]
pub struct GrantList {
    grants: HashSet<String>,
}

impl GrantList {
    pub fn new<I, S>(grants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            grants: grants.into_iter().map(Into::into).collect(),
        }
    }
}

impl PermissionOracle for GrantList {
    fn permits(&self, _actor: ActorId, rule: &AccessRule) -> bool {
        rule.is_open() || self.grants.contains(rule.as_str())
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// A validated catalog: built sets plus a layer plan that refers only to them.
#[derive(Debug, Clone)]
pub struct Catalog {
    resolver: ResolverConfig,
    sets: BTreeMap<String, Arc<CommandSet>>,
    layers: Vec<LayerDef>,
    actor: ActorDef,
}

impl Catalog {
    /// Read and validate a catalog file.
    pub fn load(path: &Path) -> CatalogResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// Parse and validate catalog text; `origin` names it in errors.
    pub fn from_toml_str(content: &str, origin: &str) -> CatalogResult<Self> {
        let file: CatalogFile = toml::from_str(content).map_err(|e| CatalogError::Parse {
            path: origin.to_owned(),
            message: e.to_string(),
        })?;
        Self::from_file(file)
    }

    /// Validate already-parsed catalog contents.
    pub fn from_file(file: CatalogFile) -> CatalogResult<Self> {
        let mut sets = BTreeMap::new();
        for def in &file.sets {
            let set = def.build()?;
            if sets.insert(def.key.clone(), Arc::new(set)).is_some() {
                return Err(CatalogError::DuplicateSet {
                    key: def.key.clone(),
                });
            }
        }

        let mut sources = HashSet::new();
        for layer in &file.layers {
            if !sets.contains_key(&layer.set) {
                return Err(CatalogError::UnknownSet {
                    source_id: layer.source.clone(),
                    set: layer.set.clone(),
                });
            }
            if !sources.insert(layer.source.as_str()) {
                return Err(CatalogError::DuplicateSource {
                    source_id: layer.source.clone(),
                });
            }
        }

        tracing::debug!(
            sets = sets.len(),
            layers = file.layers.len(),
            "catalog loaded"
        );

        Ok(Self {
            resolver: file.resolver,
            sets,
            layers: file.layers,
            actor: file.actor,
        })
    }

    pub fn resolver(&self) -> &ResolverConfig {
        &self.resolver
    }

    pub fn set(&self, key: &str) -> Option<&Arc<CommandSet>> {
        self.sets.get(key)
    }

    /// Sets sorted by key.
    pub fn sets(&self) -> impl Iterator<Item = &Arc<CommandSet>> {
        self.sets.values()
    }

    pub fn layers(&self) -> &[LayerDef] {
        &self.layers
    }

    pub fn actor_id(&self) -> ActorId {
        ActorId::new(self.actor.id)
    }

    /// Oracle for the catalog's `[actor]` grants.
    pub fn grants(&self) -> GrantList {
        GrantList::new(self.actor.grants.iter().cloned())
    }

    /// A handler for the catalog's actor with every layer applied, in file order.
    pub fn handler(&self) -> CmdsetHandler {
        let mut handler = CmdsetHandler::new(self.actor_id());
        for layer in &self.layers {
            // Layers were checked against `sets` at load time.
            if let Some(set) = self.sets.get(&layer.set) {
                handler.add_layer_as(
                    layer.kind,
                    layer.source.clone(),
                    Arc::clone(set),
                    layer.stack_priority,
                );
            }
        }
        handler
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[resolver]
min_prefix_len = 2

[[set]]
key = "default"

[[set.command]]
key = "look"
aliases = ["l"]

[[set.command]]
key = "dig"
lock = "perm(builder)"
help_category = "building"

[[set]]
key = "menu"
merge_type = "replace"
priority = 50
duplicate_policy = "keep-newest"
no_exits = true
key_merge_types = { default = "union" }

[[set.command]]
key = "back"

[[layer]]
source = "actor:self"
set = "default"
kind = "actor"

[[layer]]
source = "menu:main"
set = "menu"
stack_priority = 100
kind = "overlay"

[actor]
id = 7
grants = ["perm(builder)"]
"#;

    #[test]
    fn parses_sets_layers_and_actor() {
        let catalog = Catalog::from_toml_str(SAMPLE, "sample").unwrap();

        assert_eq!(catalog.resolver().min_prefix_len, 2);
        assert!(catalog.resolver().prefix_matching);

        let menu = catalog.set("menu").unwrap();
        assert_eq!(menu.merge_type(), MergeType::Replace);
        assert_eq!(menu.duplicate_policy(), DuplicatePolicy::KeepNewest);
        assert_eq!(menu.merge_type_against("default"), MergeType::Union);
        assert!(menu.no_exits());

        let default = catalog.set("default").unwrap();
        assert_eq!(default.get("l").unwrap().key(), "look");
        assert_eq!(default.get("dig").unwrap().access().as_str(), "perm(builder)");
        assert_eq!(default.get("dig").unwrap().help_category(), "building");

        assert_eq!(catalog.layers()[1].kind, LayerKind::Overlay);
        assert_eq!(catalog.actor_id(), ActorId::new(7));
    }

    #[test]
    fn handler_applies_layers() {
        let catalog = Catalog::from_toml_str(SAMPLE, "sample").unwrap();
        let mut handler = catalog.handler();
        let mut keys = handler.get_merged().keys().into_iter().map(str::to_owned).collect::<Vec<_>>();
        keys.sort();
        assert_eq!(keys, vec!["back", "dig", "look"]);
    }

    #[test]
    fn grant_list_checks_verbatim_rules() {
        let grants = GrantList::new(["perm(builder)"]);
        let actor = ActorId::new(1);
        assert!(grants.permits(actor, &AccessRule::open()));
        assert!(grants.permits(actor, &AccessRule::new("perm(builder)")));
        assert!(!grants.permits(actor, &AccessRule::new("perm(admin)")));
    }

    #[test]
    fn unknown_set_rejected() {
        let err = Catalog::from_toml_str(
            "[[layer]]\nsource = \"x\"\nset = \"missing\"\n",
            "inline",
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownSet { ref set, .. } if set == "missing"));
    }

    #[test]
    fn duplicate_set_and_source_rejected() {
        let dup_set = "[[set]]\nkey = \"a\"\n[[set]]\nkey = \"a\"\n";
        assert!(matches!(
            Catalog::from_toml_str(dup_set, "inline").unwrap_err(),
            CatalogError::DuplicateSet { .. }
        ));

        let dup_source = "[[set]]\nkey = \"a\"\n\
                          [[layer]]\nsource = \"s\"\nset = \"a\"\n\
                          [[layer]]\nsource = \"s\"\nset = \"a\"\n";
        assert!(matches!(
            Catalog::from_toml_str(dup_source, "inline").unwrap_err(),
            CatalogError::DuplicateSource { .. }
        ));
    }

    #[test]
    fn duplicate_command_names_surface_as_set_errors() {
        let src = "[[set]]\nkey = \"a\"\n\
                   [[set.command]]\nkey = \"look\"\naliases = [\"l\"]\n\
                   [[set.command]]\nkey = \"l\"\n";
        let err = Catalog::from_toml_str(src, "inline").unwrap_err();
        assert!(matches!(err, CatalogError::Set(CommandSetError::DuplicateKey { .. })));
    }

    #[test]
    fn bad_enum_value_is_parse_error() {
        let err = Catalog::from_toml_str("[[set]]\nkey = \"a\"\nmerge_type = \"xor\"\n", "inline")
            .unwrap_err();
        assert!(matches!(err, CatalogError::Parse { ref path, .. } if path == "inline"));
    }
}
