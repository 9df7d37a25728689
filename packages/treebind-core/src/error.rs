use thiserror::Error;

use crate::dom::DomKind;
use crate::ids::DomId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Reported through [`crate::Converter::reports`]; conversion continues as a plain element.
    #[error("unknown hook {name:?} on {node}")]
    UnknownHook { node: DomId, name: String },
    #[error("unsupported node type {kind:?} at {node}")]
    UnsupportedNodeType { node: DomId, kind: DomKind },
    #[error("invalid reference: {0}")]
    InvalidReference(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("inconsistent state: {0}")]
    InconsistentState(String),
    #[error("unknown node: {0}")]
    UnknownNode(String),
}
