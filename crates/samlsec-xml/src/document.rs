#![forbid(unsafe_code)]

//! Mutable XML document backed by an `uppsala` arena.
//!
//! [`XmlDocument`] owns an `uppsala::Document<'static>` and adds what the
//! signing and decryption engines need on top of it: namespace resolution
//! through the ancestor chain, ID-attribute lookup, fallible splicing that
//! refuses cycles and cross-document ids, and fragment parsing in the
//! namespace context of a splice site.
//!
//! Parsed names keep the prefix written in the source. Names created here
//! carry the namespace URI their prefix resolves to at creation time, or
//! none when the prefix is not yet declared.

use samlsec_core::{ns, Error};
use std::borrow::Cow;
use std::collections::BTreeMap;

pub use uppsala::{ChildrenIter, NodeId};

pub type QName = uppsala::QName<'static>;
pub type Attribute = uppsala::Attribute<'static>;
pub type Element = uppsala::Element<'static>;
pub type NodeKind = uppsala::NodeKind<'static>;

/// Options for [`XmlDocument::parse_with_options`].
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Keep whitespace-only text nodes. Turning this off drops the
    /// indentation between elements (libxml2's `NOBLANKS`).
    pub keep_blank_text: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            keep_blank_text: true,
        }
    }
}

/// An owned, mutable XML document.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    inner: uppsala::Document<'static>,
}

impl Default for XmlDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlDocument {
    /// Create an empty document holding only the document node.
    pub fn new() -> Self {
        Self {
            inner: uppsala::Document::new(),
        }
    }

    /// Parse XML text with default options.
    pub fn parse(text: &str) -> Result<Self, Error> {
        Self::parse_with_options(text, ParseOptions::default())
    }

    /// Parse XML bytes. UTF-16 input is recognised by its byte order mark.
    pub fn parse_bytes(data: &[u8]) -> Result<Self, Error> {
        let inner = uppsala::parse_bytes(data).map_err(|e| Error::XmlParse(e.to_string()))?;
        Ok(Self { inner })
    }

    pub fn parse_with_options(text: &str, options: ParseOptions) -> Result<Self, Error> {
        let inner = uppsala::Parser::new()
            .parse(text)
            .map_err(|e| Error::XmlParse(e.to_string()))?
            .into_static();
        let mut doc = Self { inner };
        if !options.keep_blank_text {
            doc.drop_blank_text();
        }
        Ok(doc)
    }

    fn drop_blank_text(&mut self) {
        let blanks: Vec<NodeId> = self
            .inner
            .descendants(self.root())
            .into_iter()
            .filter(|&id| matches!(self.kind(id), Some(NodeKind::Text(t)) if t.trim().is_empty()))
            .collect();
        for id in blanks {
            self.inner.detach(id);
        }
    }

    /// Parse `text` as content appearing inside `context`.
    ///
    /// The namespace bindings in scope at `context` are available to the
    /// fragment, but are not re-declared on the imported nodes. A leading
    /// XML declaration is ignored. The returned nodes are detached.
    pub fn parse_fragment_into(&mut self, context: NodeId, text: &str) -> Result<Vec<NodeId>, Error> {
        let body = strip_xml_declaration(text);
        let scope = self.in_scope_namespaces(context);

        let declarations = scope.iter().map(|(prefix, uri)| {
            let name = if prefix.is_empty() { "xmlns".to_owned() } else { format!("xmlns:{prefix}") };
            (name, uri.as_str())
        });
        let mut wrapper = uppsala::XmlWriter::new();
        wrapper.start_element_with("fragment-root", declarations);
        wrapper.raw(body);
        wrapper.end_element("fragment-root");
        let wrapper = wrapper.into_string();

        let parsed = uppsala::parse(&wrapper).map_err(|e| Error::XmlParse(format!("fragment: {e}")))?;
        let holder = parsed
            .document_element()
            .ok_or_else(|| Error::XmlParse("fragment: no content".into()))?;
        let mut imported = Vec::new();
        for child in parsed.children_iter(holder) {
            if let Some(id) = self.inner.import_subtree(&parsed, child) {
                imported.push(id);
            }
        }
        Ok(imported)
    }

    // ── Navigation ───────────────────────────────────────────────────

    /// The document node.
    pub fn root(&self) -> NodeId {
        self.inner.root()
    }

    /// The single top-level element, if any.
    pub fn document_element(&self) -> Option<NodeId> {
        self.inner.document_element()
    }

    /// Check whether `id` belongs to this document's arena.
    pub fn contains(&self, id: NodeId) -> bool {
        self.inner.node_kind(id).is_some()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.inner.node_kind(id)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.inner.element(id).is_some()
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.inner.element(id)
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        self.inner.element_mut(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.inner.parent(id)
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.inner.first_child(id)
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.inner.last_child(id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.inner.next_sibling(id)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.inner.previous_sibling(id)
    }

    /// Iterate over the direct children of `id` in document order.
    pub fn children(&self, id: NodeId) -> ChildrenIter<'_, 'static> {
        self.inner.children_iter(id)
    }

    /// All descendants of `id` (excluding `id`) in document order.
    pub fn descendants(&self, id: NodeId) -> std::vec::IntoIter<NodeId> {
        self.inner.descendants(id).into_iter()
    }

    /// Check whether `ancestor` is `node` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.inner.ancestors(node).contains(&ancestor)
    }

    /// Local name of an element (`""` for other nodes).
    pub fn name(&self, id: NodeId) -> &str {
        self.element(id).map(|e| e.name.local_name.as_ref()).unwrap_or("")
    }

    /// The element name as written, `prefix:local` or `local`.
    pub fn qualified_name(&self, id: NodeId) -> Option<String> {
        self.element(id).map(|e| e.name.prefixed_name().into_owned())
    }

    /// Resolve `prefix` (`""` for the default namespace) at `id` through the
    /// declarations on `id` and its ancestors.
    ///
    /// Returns `None` when the prefix is unbound or the default namespace
    /// has been undeclared.
    pub fn lookup_namespace(&self, id: NodeId, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(ns::XML);
        }
        let mut current = Some(id);
        while let Some(n) = current {
            if let Some(elem) = self.element(n) {
                if let Some((_, uri)) = elem.namespace_declarations.iter().find(|(p, _)| p == prefix) {
                    return Some(uri.as_ref()).filter(|u| !u.is_empty());
                }
            }
            current = self.parent(n);
        }
        None
    }

    /// Namespace URI of an element.
    ///
    /// Uses the URI recorded on the name, falling back to the in-scope
    /// binding of its prefix for names created before the prefix was bound.
    pub fn namespace_uri(&self, id: NodeId) -> Option<&str> {
        let elem = self.element(id)?;
        match (name_uri(&elem.name), elem.name.prefix.as_deref()) {
            (Some(uri), _) => Some(uri),
            (None, Some(prefix)) => self.lookup_namespace(id, prefix),
            (None, None) => None,
        }
    }

    /// All namespace bindings in scope at `id`, keyed by prefix.
    ///
    /// Undeclared default namespaces are omitted; `xml` is implicit and
    /// never listed.
    pub fn in_scope_namespaces(&self, id: NodeId) -> BTreeMap<String, String> {
        let mut chain: Vec<&Element> = self.inner.ancestors(id).iter().filter_map(|&a| self.element(a)).collect();
        chain.reverse();
        chain.extend(self.element(id));
        let mut scope = BTreeMap::new();
        for elem in chain {
            bind_element_scope(elem, &mut scope);
        }
        scope
    }

    /// Look up an attribute by its qualified name as written (`ID`, `xml:lang`).
    pub fn attribute(&self, id: NodeId, qname: &str) -> Option<&str> {
        let (prefix, local) = split_name(qname);
        self.element(id)?
            .attributes
            .iter()
            .find(|a| same_name(&a.name, prefix, local))
            .map(|a| a.value.as_ref())
    }

    /// Look up an attribute by namespace URI and local name.
    ///
    /// An empty `ns_uri` selects unprefixed attributes.
    pub fn attribute_ns(&self, id: NodeId, ns_uri: &str, local: &str) -> Option<&str> {
        let elem = self.element(id)?;
        elem.attributes
            .iter()
            .find(|a| {
                a.name.local_name == local
                    && match (name_uri(&a.name), a.name.prefix.as_deref()) {
                        (Some(uri), _) => uri == ns_uri,
                        (None, Some(p)) => self.lookup_namespace(id, p) == Some(ns_uri),
                        (None, None) => ns_uri.is_empty(),
                    }
            })
            .map(|a| a.value.as_ref())
    }

    /// Concatenated text of all descendant text and CDATA nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        self.inner.text_content_deep(id)
    }

    fn matches(&self, id: NodeId, ns_uri: &str, local: &str) -> bool {
        self.name(id) == local && self.namespace_uri(id).unwrap_or("") == ns_uri
    }

    /// First child element with the given namespace and local name.
    pub fn find_child_element(&self, parent: NodeId, ns_uri: &str, local: &str) -> Option<NodeId> {
        self.children(parent).find(|&c| self.matches(c, ns_uri, local))
    }

    /// All child elements with the given namespace and local name.
    pub fn child_elements(&self, parent: NodeId, ns_uri: &str, local: &str) -> Vec<NodeId> {
        self.children(parent)
            .filter(|&c| self.matches(c, ns_uri, local))
            .collect()
    }

    /// First descendant element (document order) with the given name.
    pub fn find_descendant_element(&self, node: NodeId, ns_uri: &str, local: &str) -> Option<NodeId> {
        self.descendants(node).find(|&d| self.matches(d, ns_uri, local))
    }

    /// First element in the subtree (including `node` itself) with the given local name.
    pub fn find_by_local_name(&self, node: NodeId, local: &str) -> Option<NodeId> {
        if self.name(node) == local {
            return Some(node);
        }
        self.descendants(node).find(|&d| self.name(d) == local)
    }

    /// The first identifier attribute present on `id`, by priority of `attr_names`.
    pub fn id_of(&self, id: NodeId, attr_names: &[&str]) -> Option<&str> {
        attr_names.iter().find_map(|name| self.attribute(id, name))
    }

    /// Every element attached to the document carrying one of `attr_names` with `value`.
    pub fn elements_with_id(&self, attr_names: &[&str], value: &str) -> Vec<NodeId> {
        self.descendants(self.root())
            .filter(|&d| {
                attr_names
                    .iter()
                    .any(|name| self.attribute(d, name) == Some(value))
            })
            .collect()
    }

    // ── Construction and mutation ────────────────────────────────────

    /// Create a detached element named `prefix:local` or `local`.
    ///
    /// The name carries no namespace URI until its prefix is bound by
    /// [`declare_namespace`](Self::declare_namespace).
    pub fn create_element(&mut self, qname: &str) -> NodeId {
        let (prefix, local) = split_name(qname);
        let uri = (prefix == Some("xml")).then_some(ns::XML);
        self.inner.create_element(owned_name(prefix, local, uri))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.inner.create_text(text.to_owned())
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.inner.create_comment(text.to_owned())
    }

    /// Create an element and append it to `parent` in one step.
    ///
    /// The name's prefix (or the default namespace) is resolved at `parent`.
    pub fn add_element(&mut self, parent: NodeId, qname: &str) -> Result<NodeId, Error> {
        let (prefix, local) = split_name(qname);
        let uri = self.lookup_namespace(parent, prefix.unwrap_or("")).map(str::to_owned);
        let id = self.inner.create_element(owned_name(prefix, local, uri.as_deref()));
        self.append_child(parent, id)?;
        Ok(id)
    }

    fn check_insert(&self, parent: NodeId, child: NodeId) -> Result<(), Error> {
        let (Some(parent_kind), Some(child_kind)) = (self.kind(parent), self.kind(child)) else {
            return Err(Error::MalformedSubtree("node does not belong to this document".into()));
        };
        if !matches!(parent_kind, NodeKind::Document | NodeKind::Element(_)) {
            return Err(Error::MalformedSubtree("only elements and documents have children".into()));
        }
        if matches!(child_kind, NodeKind::Document | NodeKind::Attribute(..)) {
            return Err(Error::MalformedSubtree("only tree nodes can be inserted".into()));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(Error::MalformedSubtree("cannot insert a node into its own subtree".into()));
        }
        Ok(())
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), Error> {
        self.check_insert(parent, child)?;
        self.inner.append_child(parent, child);
        Ok(())
    }

    /// Insert `new` immediately before `reference`.
    pub fn insert_before(&mut self, reference: NodeId, new: NodeId) -> Result<(), Error> {
        let parent = self
            .parent(reference)
            .ok_or_else(|| Error::MalformedSubtree("reference node has no parent".into()))?;
        self.check_insert(parent, new)?;
        self.inner.insert_before(parent, new, reference);
        Ok(())
    }

    /// Unlink `id` from its parent and siblings. The subtree stays intact.
    pub fn detach(&mut self, id: NodeId) {
        self.inner.detach(id);
    }

    /// Replace `old` with `replacements`, in order, at the same position.
    pub fn replace_node(&mut self, old: NodeId, replacements: &[NodeId]) -> Result<(), Error> {
        if self.parent(old).is_none() {
            return Err(Error::MalformedSubtree("cannot replace a detached node".into()));
        }
        for &r in replacements {
            if self.is_ancestor_or_self(old, r) {
                return Err(Error::MalformedSubtree("replacement lies inside the replaced node".into()));
            }
        }
        for &r in replacements {
            self.insert_before(old, r)?;
        }
        self.detach(old);
        Ok(())
    }

    /// Replace all children of `id` with a single text node.
    pub fn set_content(&mut self, id: NodeId, text: &str) -> Result<(), Error> {
        while let Some(child) = self.first_child(id) {
            self.detach(child);
        }
        if !text.is_empty() {
            let t = self.create_text(text);
            self.append_child(id, t)?;
        }
        Ok(())
    }

    /// Set (or overwrite) an attribute given its qualified name.
    pub fn set_attribute(&mut self, id: NodeId, qname: &str, value: &str) -> Result<(), Error> {
        let (prefix, local) = split_name(qname);
        let uri = prefix.and_then(|p| self.lookup_namespace(id, p)).map(str::to_owned);
        let elem = self
            .element_mut(id)
            .ok_or_else(|| Error::MalformedSubtree("attributes can only be set on elements".into()))?;
        match elem.attributes.iter_mut().find(|a| same_name(&a.name, prefix, local)) {
            Some(a) => a.value = Cow::Owned(value.to_owned()),
            None => elem.attributes.push(Attribute {
                name: owned_name(prefix, local, uri.as_deref()),
                value: Cow::Owned(value.to_owned()),
            }),
        }
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, qname: &str) -> Option<String> {
        let (prefix, local) = split_name(qname);
        let elem = self.element_mut(id)?;
        let pos = elem.attributes.iter().position(|a| same_name(&a.name, prefix, local))?;
        Some(elem.attributes.remove(pos).value.into_owned())
    }

    /// Declare `prefix` (`""` for default) as `uri` on an element.
    ///
    /// Names in the element's subtree that use `prefix` and were created
    /// before it was bound pick up `uri`.
    pub fn declare_namespace(&mut self, id: NodeId, prefix: &str, uri: &str) -> Result<(), Error> {
        let declared = self.inner.declare_namespace(id, Some(prefix), uri.to_owned());
        if !declared {
            return Err(Error::MalformedSubtree("namespaces can only be declared on elements".into()));
        }
        if !prefix.is_empty() {
            self.bind_unresolved(id, prefix, uri);
        }
        Ok(())
    }

    fn bind_unresolved(&mut self, id: NodeId, prefix: &str, uri: &str) {
        let mut pending = vec![id];
        while let Some(n) = pending.pop() {
            let redeclared = n != id
                && self
                    .element(n)
                    .is_some_and(|e| e.namespace_declarations.iter().any(|(p, _)| p == prefix));
            if redeclared {
                continue;
            }
            if let Some(elem) = self.inner.element_mut(n) {
                let names = std::iter::once(&mut elem.name).chain(elem.attributes.iter_mut().map(|a| &mut a.name));
                for name in names {
                    if name.prefix.as_deref() == Some(prefix) && name.namespace_uri.is_none() {
                        name.namespace_uri = Some(Cow::Owned(uri.to_owned()));
                    }
                }
            }
            pending.extend(self.inner.children_iter(n).filter(|&c| self.is_element(c)));
        }
    }

    pub(crate) fn inner(&self) -> &uppsala::Document<'static> {
        &self.inner
    }
}

/// Apply the namespace bindings `elem` introduces to `scope`.
///
/// Declared bindings come first. A name whose URI is recorded but not
/// declared binds its prefix on the element, and an unprefixed element in
/// no namespace undeclares the default namespace. This is how the tree
/// serializes, so canonical output and written output agree.
pub fn bind_element_scope(elem: &Element, scope: &mut BTreeMap<String, String>) {
    for (prefix, uri) in &elem.namespace_declarations {
        if uri.is_empty() {
            scope.remove(prefix.as_ref());
        } else {
            scope.insert(prefix.to_string(), uri.to_string());
        }
    }
    let declares = |prefix: &str| elem.namespace_declarations.iter().any(|(p, _)| p == prefix);

    match (elem.name.prefix.as_deref(), name_uri(&elem.name)) {
        (None, None) => {
            scope.remove("");
        }
        (None, Some(uri)) if !declares("") => {
            scope.insert(String::new(), uri.to_owned());
        }
        _ => {}
    }
    let prefixed = std::iter::once(&elem.name).chain(elem.attributes.iter().map(|a| &a.name));
    for name in prefixed {
        if let (Some(prefix), Some(uri)) = (name.prefix.as_deref(), name_uri(name)) {
            if prefix != "xml" && !declares(prefix) {
                scope.insert(prefix.to_owned(), uri.to_owned());
            }
        }
    }
}

/// The namespace URI recorded on a name; `xmlns=""` scopes record `""`.
fn name_uri<'n>(name: &'n QName) -> Option<&'n str> {
    name.namespace_uri.as_deref().filter(|u| !u.is_empty())
}

fn split_name(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) if !prefix.is_empty() => (Some(prefix), local),
        _ => (None, qname),
    }
}

fn same_name(name: &QName, prefix: Option<&str>, local: &str) -> bool {
    name.local_name == local && name.prefix.as_deref() == prefix
}

fn owned_name(prefix: Option<&str>, local: &str, uri: Option<&str>) -> QName {
    QName {
        namespace_uri: uri.map(|u| Cow::Owned(u.to_owned())),
        prefix: prefix.map(|p| Cow::Owned(p.to_owned())),
        local_name: Cow::Owned(local.to_owned()),
    }
}

fn strip_xml_declaration(text: &str) -> &str {
    let text = text.trim_start_matches('\u{feff}');
    let trimmed = text.trim_start();
    if trimmed.starts_with("<?xml") {
        if let Some(end) = trimmed.find("?>") {
            return &trimmed[end + 2..];
        }
    }
    text
}
