#![forbid(unsafe_code)]

//! Canonical XML 1.0.
//!
//! Algorithm URI: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315`
//! With comments: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments`
//!
//! The apex carries every namespace binding in scope at it; descendants
//! carry the bindings that differ from their nearest output ancestor.
//! `xml:*` attributes of the apex's ancestors are copied onto the apex.

use crate::render::{Bindings, NamespacePolicy, NsDecl, Renderer};
use crate::NamespaceContext;
use samlsec_core::Error;
use samlsec_xml::{Element, NodeId, XmlDocument};

struct InclusivePolicy;

impl NamespacePolicy for InclusivePolicy {
    fn declarations(&self, _elem: &Element, scope: &Bindings, rendered: &Bindings) -> Vec<NsDecl> {
        let mut decls: Vec<NsDecl> = scope
            .iter()
            .filter(|(prefix, uri)| rendered.get(*prefix) != Some(*uri))
            .map(|(prefix, uri)| NsDecl::new(prefix, uri))
            .collect();
        let default_rendered = rendered.get("").is_some_and(|uri| !uri.is_empty());
        if default_rendered && !scope.contains_key("") {
            decls.push(NsDecl::new("", ""));
        }
        decls
    }

    fn inherits_xml_attributes(&self) -> bool {
        true
    }
}

/// Canonicalize the subtree at `apex` with Canonical XML 1.0.
pub fn canonicalize(
    doc: &XmlDocument,
    apex: NodeId,
    ctx: &NamespaceContext,
    with_comments: bool,
    excluded: Option<NodeId>,
) -> Result<Vec<u8>, Error> {
    Renderer::new(doc, apex, ctx, InclusivePolicy, with_comments, excluded).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c14n(xml: &str, local: &str) -> String {
        let doc = XmlDocument::parse(xml).unwrap();
        let root = doc.document_element().unwrap();
        let node = doc.find_by_local_name(root, local).unwrap();
        let ctx = NamespaceContext::in_scope(&doc, node);
        String::from_utf8(canonicalize(&doc, node, &ctx, false, None).unwrap()).unwrap()
    }

    #[test]
    fn test_apex_carries_all_in_scope_namespaces() {
        let xml = r#"<r xmlns="urn:d" xmlns:a="urn:a" xmlns:c="urn:c"><a:x><y/></a:x></r>"#;
        assert_eq!(
            c14n(xml, "x"),
            r#"<a:x xmlns="urn:d" xmlns:a="urn:a" xmlns:c="urn:c"><y></y></a:x>"#
        );
    }

    #[test]
    fn test_redeclaration_only_when_changed() {
        let xml = r#"<r xmlns:a="urn:a"><a:x xmlns:a="urn:a"><a:y xmlns:a="urn:other"/></a:x></r>"#;
        assert_eq!(
            c14n(xml, "r"),
            r#"<r xmlns:a="urn:a"><a:x><a:y xmlns:a="urn:other"></a:y></a:x></r>"#
        );
    }

    #[test]
    fn test_shared_uri_prefixes_both_kept() {
        let xml = r#"<r xmlns:saml="urn:A" xmlns:saml2="urn:A"><saml2:x saml2:a="1"/></r>"#;
        assert_eq!(
            c14n(xml, "x"),
            r#"<saml2:x xmlns:saml="urn:A" xmlns:saml2="urn:A" saml2:a="1"></saml2:x>"#
        );
    }

    #[test]
    fn test_default_undeclaration() {
        let xml = r#"<r xmlns="urn:d"><e xmlns=""><f/></e></r>"#;
        assert_eq!(c14n(xml, "r"), r#"<r xmlns="urn:d"><e xmlns=""><f></f></e></r>"#);
        assert_eq!(c14n(xml, "e"), "<e><f></f></e>");
    }

    #[test]
    fn test_xml_attributes_inherited_by_apex() {
        let xml = r#"<r xml:lang="en" xml:space="preserve"><c xml:lang="sv"/></r>"#;
        assert_eq!(
            c14n(xml, "c"),
            r#"<c xml:lang="sv" xml:space="preserve"></c>"#
        );
    }
}
