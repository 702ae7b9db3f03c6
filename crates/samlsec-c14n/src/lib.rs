#![forbid(unsafe_code)]

//! XML Canonicalization (C14N) for the samlsec XML Security crates.
//!
//! Implements the four W3C variants used by XML-DSig:
//! - Canonical XML 1.0 (with and without comments)
//! - Exclusive Canonical XML 1.0 (with and without comments)
//!
//! Canonicalization is always applied to a subtree of an
//! [`XmlDocument`]. The namespace bindings inherited from the apex's
//! ancestors are passed explicitly as a [`NamespaceContext`].

pub mod escape;
pub mod exclusive;
pub mod inclusive;
pub mod render;

use samlsec_core::{algorithm, ns, Error};
use samlsec_xml::{NodeId, XmlDocument};
use std::collections::BTreeMap;

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum C14nMode {
    /// Canonical XML 1.0
    Inclusive,
    /// Canonical XML 1.0 with comments
    InclusiveWithComments,
    /// Exclusive Canonical XML 1.0
    #[default]
    Exclusive,
    /// Exclusive Canonical XML 1.0 with comments
    ExclusiveWithComments,
}

impl C14nMode {
    /// Get the algorithm URI for this mode.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Inclusive => algorithm::C14N,
            Self::InclusiveWithComments => algorithm::C14N_WITH_COMMENTS,
            Self::Exclusive => algorithm::EXC_C14N,
            Self::ExclusiveWithComments => algorithm::EXC_C14N_WITH_COMMENTS,
        }
    }

    /// Parse a C14N mode from an algorithm URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::C14N => Some(Self::Inclusive),
            algorithm::C14N_WITH_COMMENTS => Some(Self::InclusiveWithComments),
            algorithm::EXC_C14N => Some(Self::Exclusive),
            algorithm::EXC_C14N_WITH_COMMENTS => Some(Self::ExclusiveWithComments),
            _ => None,
        }
    }

    pub fn with_comments(&self) -> bool {
        matches!(self, Self::InclusiveWithComments | Self::ExclusiveWithComments)
    }

    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::Exclusive | Self::ExclusiveWithComments)
    }

    /// The same variant with comments dropped.
    ///
    /// A same-document `#id` reference selects its subtree without comment
    /// nodes, so a `#WithComments` transform behind it renders none.
    pub fn without_comments(&self) -> Self {
        match self {
            Self::Inclusive | Self::InclusiveWithComments => Self::Inclusive,
            Self::Exclusive | Self::ExclusiveWithComments => Self::Exclusive,
        }
    }
}

/// Namespace bindings and `xml:*` attributes inherited by a subtree apex.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceContext {
    bindings: BTreeMap<String, String>,
    xml_attributes: Vec<(String, String)>,
}

impl NamespaceContext {
    /// A context with no inherited bindings (the apex is a document root).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compute what `node` inherits from its ancestors.
    pub fn in_scope(doc: &XmlDocument, node: NodeId) -> Self {
        let Some(parent) = doc.parent(node) else {
            return Self::default();
        };
        let bindings = doc.in_scope_namespaces(parent);

        // Nearest ancestor wins for each xml:* attribute.
        let mut xml_attributes: Vec<(String, String)> = Vec::new();
        let mut current = Some(parent);
        while let Some(n) = current {
            if let Some(elem) = doc.element(n) {
                for attr in &elem.attributes {
                    if attr.name.prefix.as_deref() == Some("xml")
                        && !xml_attributes.iter().any(|(l, _)| *l == attr.name.local_name)
                    {
                        xml_attributes.push((attr.name.local_name.to_string(), attr.value.to_string()));
                    }
                }
            }
            current = doc.parent(n);
        }

        Self {
            bindings,
            xml_attributes,
        }
    }

    /// Add or override a binding.
    pub fn with_binding(mut self, prefix: &str, uri: &str) -> Self {
        self.bindings.insert(prefix.to_owned(), uri.to_owned());
        self
    }

    pub fn bindings(&self) -> &BTreeMap<String, String> {
        &self.bindings
    }

    pub fn lookup(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(ns::XML);
        }
        self.bindings.get(prefix).map(String::as_str)
    }

    pub fn xml_attributes(&self) -> &[(String, String)] {
        &self.xml_attributes
    }
}

/// Options for a single canonicalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct C14nOptions {
    pub mode: C14nMode,
    /// InclusiveNamespaces PrefixList (exclusive modes only).
    pub inclusive_prefixes: Vec<String>,
    /// A node whose subtree is left out of the output.
    pub excluded: Option<NodeId>,
}

impl C14nOptions {
    pub fn new(mode: C14nMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_inclusive_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.inclusive_prefixes = prefixes;
        self
    }

    pub fn excluding(mut self, node: NodeId) -> Self {
        self.excluded = Some(node);
        self
    }
}

/// Canonicalize the subtree rooted at `node`.
///
/// Fails with [`Error::MalformedSubtree`] when an element or attribute
/// prefix cannot be resolved through the subtree and `ctx`.
pub fn canonicalize(
    doc: &XmlDocument,
    node: NodeId,
    ctx: &NamespaceContext,
    options: &C14nOptions,
) -> Result<Vec<u8>, Error> {
    if !doc.contains(node) {
        return Err(Error::MalformedSubtree(format!(
            "node {} is not part of the document",
            node.index()
        )));
    }
    match options.mode {
        C14nMode::Inclusive | C14nMode::InclusiveWithComments => {
            inclusive::canonicalize(doc, node, ctx, options.mode.with_comments(), options.excluded)
        }
        C14nMode::Exclusive | C14nMode::ExclusiveWithComments => exclusive::canonicalize(
            doc,
            node,
            ctx,
            options.mode.with_comments(),
            &options.inclusive_prefixes,
            options.excluded,
        ),
    }
}

/// Convenience: canonicalize `node` with the context computed from its ancestors.
pub fn canonicalize_node(doc: &XmlDocument, node: NodeId, options: &C14nOptions) -> Result<Vec<u8>, Error> {
    let ctx = NamespaceContext::in_scope(doc, node);
    canonicalize(doc, node, &ctx, options)
}
