#![forbid(unsafe_code)]

//! Exclusive Canonical XML 1.0 (exc-C14N).
//!
//! Algorithm URI: `http://www.w3.org/2001/10/xml-exc-c14n#`
//! With comments: `http://www.w3.org/2001/10/xml-exc-c14n#WithComments`
//!
//! Only visibly utilized namespace declarations are output. A prefix is
//! visibly utilized on an element when the element name or one of its
//! attributes uses it, or when it is listed in the InclusiveNamespaces
//! PrefixList (`#default` names the default namespace).

use crate::render::{Bindings, NamespacePolicy, NsDecl, Renderer};
use crate::NamespaceContext;
use samlsec_core::Error;
use samlsec_xml::{Element, NodeId, XmlDocument};
use std::collections::BTreeSet;

struct ExclusivePolicy {
    inclusive_prefixes: BTreeSet<String>,
}

impl ExclusivePolicy {
    fn new(prefix_list: &[String]) -> Self {
        let inclusive_prefixes = prefix_list
            .iter()
            .map(|p| if p == "#default" { String::new() } else { p.clone() })
            .collect();
        Self { inclusive_prefixes }
    }
}

impl NamespacePolicy for ExclusivePolicy {
    fn declarations(&self, elem: &Element, scope: &Bindings, rendered: &Bindings) -> Vec<NsDecl> {
        let mut utilized: BTreeSet<&str> = BTreeSet::new();
        utilized.insert(elem.name.prefix.as_deref().unwrap_or(""));
        for attr in &elem.attributes {
            if let Some(p) = attr.name.prefix.as_deref() {
                utilized.insert(p);
            }
        }
        utilized.extend(self.inclusive_prefixes.iter().map(String::as_str));

        let mut decls = Vec::new();
        for prefix in utilized {
            if prefix == "xml" {
                continue;
            }
            match scope.get(prefix) {
                Some(uri) => {
                    if rendered.get(prefix) != Some(uri) {
                        decls.push(NsDecl::new(prefix, uri));
                    }
                }
                None if prefix.is_empty() => {
                    if rendered.get("").is_some_and(|uri| !uri.is_empty()) {
                        decls.push(NsDecl::new("", ""));
                    }
                }
                None => {}
            }
        }
        decls
    }
}

/// Canonicalize the subtree at `apex` with Exclusive XML Canonicalization 1.0.
pub fn canonicalize(
    doc: &XmlDocument,
    apex: NodeId,
    ctx: &NamespaceContext,
    with_comments: bool,
    inclusive_prefixes: &[String],
    excluded: Option<NodeId>,
) -> Result<Vec<u8>, Error> {
    let policy = ExclusivePolicy::new(inclusive_prefixes);
    Renderer::new(doc, apex, ctx, policy, with_comments, excluded).run()
}
