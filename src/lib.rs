// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # cmdstack
//!
//! Layered command set composition for text-driven multi-actor worlds.
//!
//! Every actor carries a stack of command sets contributed by itself, the room
//! it stands in, the objects around it and temporary overlays such as menus.
//! The stack is folded with a small merge algebra into one merged set, and
//! typed input is resolved against that set.
//!
//! ## Architecture
//!
//! - **Descriptors** (`command`): immutable, shared command metadata
//! - **Command sets** (`cmdset`): named, prioritized collections with merge metadata
//! - **Merge algebra** (`merge`): Union, Intersect, Replace, Remove and Neutral
//! - **Stacks** (`stack`, `registry`): per-actor layers and the cached fold
//! - **Resolution** (`resolve`): typed input to a command handle, access-filtered
//! - **Catalogs** (`catalog`): command sets and layers defined in TOML
//!
//! ## Library usage
//!
//! ```
//! use cmdstack::actor::{ActorId, AllowAll};
//! use cmdstack::cmdset::{CommandSet, MergeType};
//! use cmdstack::command::CommandDescriptor;
//! use cmdstack::resolve::{Resolution, Resolver};
//! use cmdstack::stack::CmdsetHandler;
//!
//! let base = CommandSet::builder("default")
//!     .command(CommandDescriptor::new("look").with_alias("l"))
//!     .command(CommandDescriptor::new("get"))
//!     .build()
//!     .unwrap();
//! let room = CommandSet::builder("dark room")
//!     .merge_type(MergeType::Union)
//!     .priority(10)
//!     .command(CommandDescriptor::new("climb"))
//!     .build()
//!     .unwrap();
//!
//! let mut handler = CmdsetHandler::new(ActorId::new(1));
//! handler.add_layer("actor:1", base, 0);
//! handler.add_layer("room:7", room, 10);
//!
//! let resolution = handler.resolve(&Resolver::default(), "cl tree", &AllowAll);
//! assert!(matches!(resolution, Resolution::Matched(ref m) if m.command.key() == "climb"));
//! ```

pub mod actor;
pub mod catalog;
pub mod cmdset;
pub mod command;
pub mod error;
pub mod merge;
pub mod registry;
pub mod resolve;
pub mod stack;
pub mod state;
