#![forbid(unsafe_code)]

//! Plain (non-canonical) serialization of an [`XmlDocument`] using uppsala's
//! tree serializer and `XmlWriter`.
//!
//! Attributes and namespace declarations are written in the order they are
//! stored, empty elements are self-closing. A declaration is synthesized
//! for a created name whose prefix is not declared in scope. Serializing
//! the document node writes all top-level nodes without an XML declaration.

use crate::document::{NodeId, XmlDocument};

/// Serialize `node` and its subtree.
///
/// Bindings declared on the node's ancestors are treated as in scope and
/// are not repeated on it.
pub fn to_xml_string(doc: &XmlDocument, node: NodeId) -> String {
    doc.inner().node_to_xml(node)
}

/// Serialize a whole document, prefixed with an XML declaration.
pub fn to_document_string(doc: &XmlDocument) -> String {
    let mut writer = uppsala::XmlWriter::new();
    writer.write_declaration();
    writer.raw("\n");
    writer.raw(&to_xml_string(doc, doc.root()));
    writer.into_string()
}

impl XmlDocument {
    /// Serialize `node` and its subtree. See [`to_xml_string`].
    pub fn to_xml_string(&self, node: NodeId) -> String {
        to_xml_string(self, node)
    }
}
