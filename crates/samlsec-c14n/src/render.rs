#![forbid(unsafe_code)]

//! Subtree walker shared by the inclusive and exclusive variants.
//!
//! The two algorithms differ only in which namespace declarations an element
//! start tag carries and in whether `xml:*` attributes of the apex's
//! ancestors are inherited. Those decisions are delegated to a
//! [`NamespacePolicy`]; everything else (ordering, escaping, comment and PI
//! handling, the excluded subtree) lives here.

use crate::escape;
use crate::NamespaceContext;
use samlsec_core::{ns, Error};
use samlsec_xml::{bind_element_scope, Element, NodeId, NodeKind, XmlDocument};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Prefix → URI bindings. `""` is the default namespace.
pub(crate) type Bindings = BTreeMap<String, String>;

/// A namespace declaration to be written on a start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsDecl {
    /// `""` for the default namespace.
    pub prefix: String,
    /// `""` together with an empty prefix is `xmlns=""`.
    pub uri: String,
}

impl NsDecl {
    pub fn new(prefix: &str, uri: &str) -> Self {
        Self {
            prefix: prefix.to_owned(),
            uri: uri.to_owned(),
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        if self.prefix.is_empty() {
            out.extend_from_slice(b" xmlns=\"");
        } else {
            out.extend_from_slice(b" xmlns:");
            out.extend_from_slice(self.prefix.as_bytes());
            out.extend_from_slice(b"=\"");
        }
        escape::push_attr(out, &self.uri);
        out.push(b'"');
    }
}

// The empty prefix sorts before every other prefix, which puts the default
// namespace first.
impl Ord for NsDecl {
    fn cmp(&self, other: &Self) -> Ordering {
        self.prefix.cmp(&other.prefix)
    }
}

impl PartialOrd for NsDecl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An attribute with its namespace resolved, ready for sorting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// `""` when the attribute is in no namespace.
    pub ns_uri: String,
    pub local_name: String,
    pub qualified_name: String,
    pub value: String,
}

impl Attr {
    fn write(&self, out: &mut Vec<u8>) {
        out.push(b' ');
        out.extend_from_slice(self.qualified_name.as_bytes());
        out.extend_from_slice(b"=\"");
        escape::push_attr(out, &self.value);
        out.push(b'"');
    }
}

// Un-namespaced attributes first (by local name), then namespaced ones by
// (namespace URI, local name).
impl Ord for Attr {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.ns_uri.is_empty(), other.ns_uri.is_empty()) {
            (true, true) => self.local_name.cmp(&other.local_name),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self
                .ns_uri
                .cmp(&other.ns_uri)
                .then_with(|| self.local_name.cmp(&other.local_name)),
        }
    }
}

impl PartialOrd for Attr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Decides which namespace declarations appear on an element.
pub(crate) trait NamespacePolicy {
    /// `scope` is every binding in force at the element; `rendered` is what
    /// the nearest output ancestor has already declared.
    fn declarations(&self, elem: &Element, scope: &Bindings, rendered: &Bindings) -> Vec<NsDecl>;

    /// Whether `xml:*` attributes of the apex's ancestors are copied onto it.
    fn inherits_xml_attributes(&self) -> bool {
        false
    }
}

pub(crate) struct Renderer<'a, P> {
    doc: &'a XmlDocument,
    ctx: &'a NamespaceContext,
    policy: P,
    with_comments: bool,
    excluded: Option<NodeId>,
    apex: NodeId,
    out: Vec<u8>,
}

impl<'a, P: NamespacePolicy> Renderer<'a, P> {
    pub(crate) fn new(
        doc: &'a XmlDocument,
        apex: NodeId,
        ctx: &'a NamespaceContext,
        policy: P,
        with_comments: bool,
        excluded: Option<NodeId>,
    ) -> Self {
        Self {
            doc,
            ctx,
            policy,
            with_comments,
            excluded,
            apex,
            out: Vec::new(),
        }
    }

    pub(crate) fn run(mut self) -> Result<Vec<u8>, Error> {
        let scope = self.ctx.bindings().clone();
        let apex = self.apex;
        self.process_node(apex, &scope, &Bindings::new())?;
        Ok(self.out)
    }

    fn process_node(&mut self, id: NodeId, scope: &Bindings, rendered: &Bindings) -> Result<(), Error> {
        if self.excluded == Some(id) {
            return Ok(());
        }
        let doc = self.doc;
        match doc.kind(id) {
            Some(NodeKind::Document) => {
                for child in doc.children(id) {
                    self.process_node(child, scope, rendered)?;
                }
            }
            Some(NodeKind::Element(elem)) => self.process_element(id, elem, scope, rendered)?,
            Some(NodeKind::Text(text)) | Some(NodeKind::CData(text)) => escape::push_text(&mut self.out, text),
            Some(NodeKind::Comment(text)) => {
                if self.with_comments {
                    let top_level = self.at_document_level(id);
                    if top_level && has_element_before(doc, id) {
                        self.out.push(b'\n');
                    }
                    self.out.extend_from_slice(b"<!--");
                    self.out.extend_from_slice(text.as_bytes());
                    self.out.extend_from_slice(b"-->");
                    if top_level && has_element_after(doc, id) {
                        self.out.push(b'\n');
                    }
                }
            }
            Some(NodeKind::ProcessingInstruction(pi)) => {
                let top_level = self.at_document_level(id);
                if top_level && has_element_before(doc, id) {
                    self.out.push(b'\n');
                }
                self.out.extend_from_slice(b"<?");
                self.out.extend_from_slice(pi.target.as_bytes());
                if let Some(data) = pi.data.as_deref().filter(|d| !d.is_empty()) {
                    self.out.push(b' ');
                    escape::push_pi(&mut self.out, data);
                }
                self.out.extend_from_slice(b"?>");
                if top_level && has_element_after(doc, id) {
                    self.out.push(b'\n');
                }
            }
            Some(NodeKind::Attribute(..)) | None => {}
        }
        Ok(())
    }

    fn at_document_level(&self, id: NodeId) -> bool {
        self.doc
            .parent(id)
            .is_some_and(|p| matches!(self.doc.kind(p), Some(NodeKind::Document)))
    }

    fn process_element(
        &mut self,
        id: NodeId,
        elem: &Element,
        parent_scope: &Bindings,
        rendered: &Bindings,
    ) -> Result<(), Error> {
        let mut scope = parent_scope.clone();
        bind_element_scope(elem, &mut scope);

        let elem_name = elem.name.prefixed_name();
        let elem_prefix = elem.name.prefix.as_deref().unwrap_or("");
        if !elem_prefix.is_empty() && elem_prefix != "xml" && !scope.contains_key(elem_prefix) {
            return Err(Error::MalformedSubtree(format!(
                "unbound prefix '{elem_prefix}' on element <{elem_name}>"
            )));
        }

        let mut attrs = Vec::with_capacity(elem.attributes.len());
        for attr in &elem.attributes {
            let ns_uri = match attr.name.prefix.as_deref() {
                None => "",
                Some("xml") => ns::XML,
                Some(p) => scope.get(p).map(String::as_str).ok_or_else(|| {
                    Error::MalformedSubtree(format!(
                        "unbound prefix '{p}' on attribute {} of <{elem_name}>",
                        attr.name.prefixed_name()
                    ))
                })?,
            };
            attrs.push(Attr {
                ns_uri: ns_uri.to_owned(),
                local_name: attr.name.local_name.to_string(),
                qualified_name: attr.name.prefixed_name().into_owned(),
                value: attr.value.to_string(),
            });
        }
        if id == self.apex && self.policy.inherits_xml_attributes() {
            for (local, value) in self.ctx.xml_attributes() {
                let present = attrs
                    .iter()
                    .any(|a| a.ns_uri == ns::XML && &a.local_name == local);
                if !present {
                    attrs.push(Attr {
                        ns_uri: ns::XML.to_owned(),
                        local_name: local.clone(),
                        qualified_name: format!("xml:{local}"),
                        value: value.clone(),
                    });
                }
            }
        }
        attrs.sort();

        let mut decls = self.policy.declarations(elem, &scope, rendered);
        decls.sort();

        self.out.push(b'<');
        self.out.extend_from_slice(elem_name.as_bytes());
        for decl in &decls {
            decl.write(&mut self.out);
        }
        for attr in &attrs {
            attr.write(&mut self.out);
        }
        self.out.push(b'>');

        let child_rendered = if decls.is_empty() {
            rendered.clone()
        } else {
            let mut next = rendered.clone();
            for decl in decls {
                next.insert(decl.prefix, decl.uri);
            }
            next
        };
        let doc = self.doc;
        for child in doc.children(id) {
            self.process_node(child, &scope, &child_rendered)?;
        }

        self.out.extend_from_slice(b"</");
        self.out.extend_from_slice(elem_name.as_bytes());
        self.out.push(b'>');
        Ok(())
    }
}

fn has_element_before(doc: &XmlDocument, id: NodeId) -> bool {
    let mut sib = doc.previous_sibling(id);
    while let Some(s) = sib {
        if doc.is_element(s) {
            return true;
        }
        sib = doc.previous_sibling(s);
    }
    false
}

fn has_element_after(doc: &XmlDocument, id: NodeId) -> bool {
    let mut sib = doc.next_sibling(id);
    while let Some(s) = sib {
        if doc.is_element(s) {
            return true;
        }
        sib = doc.next_sibling(s);
    }
    false
}
