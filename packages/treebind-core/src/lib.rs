#![forbid(unsafe_code)]
//! Bridge between a mutable, history-free external tree (DOM-like) and a tombstone-aware shared
//! XML tree. The crate converts external nodes into shared nodes, remembers which node maps to
//! which, and applies small incremental edits without rewriting unrelated shared history.
//!
//! Observing external mutations and transporting the shared document are left to the host.

pub mod binding;
pub mod config;
pub mod convert;
pub mod doc;
pub mod dom;
pub mod error;
pub mod filter;
pub mod hooks;
pub mod ids;
pub mod mapping;
pub mod walker;

pub use binding::{remove_range_until, Binding};
pub use config::{BindingConfig, UnknownHookPolicy};
pub use convert::Converter;
#[cfg(feature = "serde")]
pub use doc::SharedNodeExport;
pub use doc::{SharedDoc, SharedKind};
pub use dom::{DomKind, DomTree, MemoryDom};
pub use error::{Error, Result};
pub use filter::{filter_dom_attributes, AdmitAll, Attributes, ElementFilter};
pub use hooks::{Hook, HookRegistry, DEFAULT_HOOK_ATTRIBUTE};
pub use ids::{DomId, ItemId};
pub use mapping::Mapping;
pub use walker::{first_live, LiveItems};
