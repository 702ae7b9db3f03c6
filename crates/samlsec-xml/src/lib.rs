#![forbid(unsafe_code)]

//! XML document abstraction for the samlsec XML Security crates.
//!
//! Wraps an `uppsala` arena document, whose nodes are addressed by
//! [`NodeId`], with the namespace, ID and splicing operations the engines
//! share. Serialization lives in [`writer`].

pub mod document;
pub mod writer;

pub use document::{
    bind_element_scope, Attribute, ChildrenIter, Element, NodeId, NodeKind, ParseOptions, QName,
    XmlDocument,
};
pub use writer::{to_document_string, to_xml_string};
