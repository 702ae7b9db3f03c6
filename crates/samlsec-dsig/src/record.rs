#![forbid(unsafe_code)]

//! Typed view of a `<ds:Signature>` element.
//!
//! Verification never walks the raw tree after this point: everything it
//! needs (algorithms, the reference, decoded values) is read once into a
//! [`SignatureRecord`], and any structural problem surfaces here as
//! `MalformedSignature`, `MalformedReference` or `UnsupportedAlgorithm`.

use samlsec_c14n::C14nMode;
use samlsec_core::{algorithm, ns, Error};
use samlsec_crypto::{DigestMethod, SignatureMethod};
use samlsec_xml::{NodeId, XmlDocument};

/// A transform listed under `<ds:Transforms>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// Leave the enclosing signature out of the digested data.
    Enveloped,
    Canonicalize {
        mode: C14nMode,
        inclusive_prefixes: Vec<String>,
    },
}

impl Transform {
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Enveloped => algorithm::ENVELOPED_SIGNATURE,
            Self::Canonicalize { mode, .. } => mode.uri(),
        }
    }
}

/// The single `<ds:Reference>` of a signature.
#[derive(Debug, Clone)]
pub struct ReferenceRecord {
    pub node: NodeId,
    /// The `URI` attribute as written, e.g. `#_a1b2`.
    pub uri: String,
    /// The identifier the URI points at, without the `#`.
    pub id: String,
    pub transforms: Vec<Transform>,
    pub digest_method: DigestMethod,
    pub digest_value: Vec<u8>,
}

impl ReferenceRecord {
    /// Whether the enveloped-signature transform is listed.
    pub fn is_enveloped(&self) -> bool {
        self.transforms.contains(&Transform::Enveloped)
    }

    /// The canonicalization transform, if one is listed.
    pub fn canonicalization(&self) -> Option<(C14nMode, &[String])> {
        self.transforms.iter().find_map(|t| match t {
            Transform::Canonicalize {
                mode,
                inclusive_prefixes,
            } => Some((*mode, inclusive_prefixes.as_slice())),
            Transform::Enveloped => None,
        })
    }
}

/// Everything verification needs from a `<ds:Signature>`.
#[derive(Debug, Clone)]
pub struct SignatureRecord {
    pub signature: NodeId,
    pub signed_info: NodeId,
    pub c14n_mode: C14nMode,
    pub inclusive_prefixes: Vec<String>,
    pub signature_method: SignatureMethod,
    pub reference: ReferenceRecord,
    pub signature_value: Vec<u8>,
    pub key_name: Option<String>,
}

impl SignatureRecord {
    /// Read the `<ds:Signature>` element `signature`.
    pub fn parse(doc: &XmlDocument, signature: NodeId) -> Result<Self, Error> {
        if doc.namespace_uri(signature) != Some(ns::DSIG) || doc.name(signature) != ns::node::SIGNATURE {
            return Err(Error::MalformedSignature(format!(
                "<{}> is not a ds:Signature element",
                doc.name(signature)
            )));
        }

        let signed_info = required_child(doc, signature, ns::node::SIGNED_INFO)?;

        let c14n_node = required_child(doc, signed_info, ns::node::CANONICALIZATION_METHOD)?;
        let c14n_uri = algorithm_of(doc, c14n_node)?;
        let c14n_mode = C14nMode::from_uri(c14n_uri)
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("C14N: {c14n_uri}")))?;
        let inclusive_prefixes = read_inclusive_prefixes(doc, c14n_node);

        let method_node = required_child(doc, signed_info, ns::node::SIGNATURE_METHOD)?;
        let signature_method = SignatureMethod::from_uri(algorithm_of(doc, method_node)?)?;

        let references = doc.child_elements(signed_info, ns::DSIG, ns::node::REFERENCE);
        let reference = match references.as_slice() {
            [] => return Err(Error::MalformedSignature("SignedInfo has no Reference".into())),
            [only] => parse_reference(doc, *only)?,
            more => {
                return Err(Error::MalformedReference(format!(
                    "expected exactly one Reference, found {}",
                    more.len()
                )))
            }
        };

        let value_node = required_child(doc, signature, ns::node::SIGNATURE_VALUE)?;
        let signature_value = decode_base64(&doc.text_content(value_node), "SignatureValue")?;

        let key_name = key_name_of(doc, signature);

        Ok(Self {
            signature,
            signed_info,
            c14n_mode,
            inclusive_prefixes,
            signature_method,
            reference,
            signature_value,
            key_name,
        })
    }
}

/// The trimmed `KeyInfo/KeyName` text of a signature, if any.
pub fn key_name_of(doc: &XmlDocument, signature: NodeId) -> Option<String> {
    let key_info = doc.find_child_element(signature, ns::DSIG, ns::node::KEY_INFO)?;
    let key_name = doc.find_child_element(key_info, ns::DSIG, ns::node::KEY_NAME)?;
    Some(doc.text_content(key_name).trim().to_owned())
}

fn parse_reference(doc: &XmlDocument, reference: NodeId) -> Result<ReferenceRecord, Error> {
    let uri = doc.attribute(reference, ns::attr::URI).unwrap_or("").to_owned();
    let id = match uri.strip_prefix('#') {
        Some(id) if !id.is_empty() && !id.starts_with("xpointer(") => id.to_owned(),
        _ => {
            return Err(Error::MalformedReference(format!(
                "only same-document \"#id\" references are supported, got \"{uri}\""
            )))
        }
    };

    let mut transforms = Vec::new();
    if let Some(list) = doc.find_child_element(reference, ns::DSIG, ns::node::TRANSFORMS) {
        for t in doc.child_elements(list, ns::DSIG, ns::node::TRANSFORM) {
            transforms.push(parse_transform(doc, t)?);
        }
    }
    let c14n_count = transforms
        .iter()
        .filter(|t| matches!(t, Transform::Canonicalize { .. }))
        .count();
    if c14n_count > 1 {
        return Err(Error::MalformedSignature(
            "Reference lists more than one canonicalization transform".into(),
        ));
    }

    let method_node = required_child(doc, reference, ns::node::DIGEST_METHOD)?;
    let digest_method = DigestMethod::from_uri(algorithm_of(doc, method_node)?)?;
    let value_node = required_child(doc, reference, ns::node::DIGEST_VALUE)?;
    let digest_value = decode_base64(&doc.text_content(value_node), "DigestValue")?;

    Ok(ReferenceRecord {
        node: reference,
        uri,
        id,
        transforms,
        digest_method,
        digest_value,
    })
}

fn parse_transform(doc: &XmlDocument, node: NodeId) -> Result<Transform, Error> {
    let uri = algorithm_of(doc, node)?;
    if uri == algorithm::ENVELOPED_SIGNATURE {
        return Ok(Transform::Enveloped);
    }
    match C14nMode::from_uri(uri) {
        Some(mode) => Ok(Transform::Canonicalize {
            mode,
            inclusive_prefixes: read_inclusive_prefixes(doc, node),
        }),
        None => Err(Error::UnsupportedAlgorithm(format!("transform: {uri}"))),
    }
}

/// Read the exclusive C14N `PrefixList` under `node`, if present.
pub(crate) fn read_inclusive_prefixes(doc: &XmlDocument, node: NodeId) -> Vec<String> {
    doc.find_child_element(node, ns::EXC_C14N, ns::node::INCLUSIVE_NAMESPACES)
        .and_then(|inc| doc.attribute(inc, ns::attr::PREFIX_LIST))
        .map(|list| list.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}

fn required_child(doc: &XmlDocument, parent: NodeId, local: &str) -> Result<NodeId, Error> {
    doc.find_child_element(parent, ns::DSIG, local).ok_or_else(|| {
        Error::MalformedSignature(format!("missing <{local}> in <{}>", doc.name(parent)))
    })
}

fn algorithm_of(doc: &XmlDocument, node: NodeId) -> Result<&str, Error> {
    doc.attribute(node, ns::attr::ALGORITHM).ok_or_else(|| {
        Error::MalformedSignature(format!("missing Algorithm on <{}>", doc.name(node)))
    })
}

fn decode_base64(text: &str, what: &str) -> Result<Vec<u8>, Error> {
    use base64::Engine;
    let engine = base64::engine::general_purpose::STANDARD;
    let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    engine
        .decode(&clean)
        .map_err(|e| Error::MalformedSignature(format!("{what}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature_xml(references: &str, value: &str) -> String {
        format!(
            r##"<root ID="r1"><ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
<ds:SignedInfo>
<ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"><ec:InclusiveNamespaces xmlns:ec="http://www.w3.org/2001/10/xml-exc-c14n#" PrefixList="xs  saml"/></ds:CanonicalizationMethod>
<ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"/>
{references}
</ds:SignedInfo>
<ds:SignatureValue>{value}</ds:SignatureValue>
<ds:KeyInfo><ds:KeyName> magic </ds:KeyName><ds:X509Data><ds:X509Certificate>AAEC
AwQ=</ds:X509Certificate></ds:X509Data></ds:KeyInfo>
</ds:Signature></root>"##
        )
    }

    const REFERENCE: &str = r##"<ds:Reference URI="#r1"><ds:Transforms>
<ds:Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"/>
<ds:Transform Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>
</ds:Transforms>
<ds:DigestMethod Algorithm="http://www.w3.org/2000/09/xmldsig#sha1"/>
<ds:DigestValue>
  AAAA
</ds:DigestValue></ds:Reference>"##;

    fn parse(xml: &str) -> Result<SignatureRecord, Error> {
        let doc = XmlDocument::parse(xml).unwrap();
        let root = doc.document_element().unwrap();
        let sig = doc.find_child_element(root, ns::DSIG, "Signature").unwrap();
        SignatureRecord::parse(&doc, sig)
    }

    #[test]
    fn test_parse_complete_signature() {
        let rec = parse(&signature_xml(REFERENCE, "AQID")).unwrap();
        assert_eq!(rec.c14n_mode, C14nMode::Exclusive);
        assert_eq!(rec.inclusive_prefixes, ["xs", "saml"]);
        assert_eq!(rec.signature_method, SignatureMethod::RsaSha256);
        assert_eq!(rec.signature_value, [1, 2, 3]);
        assert_eq!(rec.key_name.as_deref(), Some("magic"));

        let r = &rec.reference;
        assert_eq!(r.uri, "#r1");
        assert_eq!(r.id, "r1");
        assert!(r.is_enveloped());
        assert_eq!(r.canonicalization().map(|(m, _)| m), Some(C14nMode::Exclusive));
        assert_eq!(r.digest_method, DigestMethod::Sha1);
        assert_eq!(r.digest_value, [0, 0, 0]);
    }

    #[test]
    fn test_reference_count() {
        let err = parse(&signature_xml("", "AQID")).unwrap_err();
        assert!(matches!(err, Error::MalformedSignature(_)));

        let two = format!("{REFERENCE}{REFERENCE}");
        let err = parse(&signature_xml(&two, "AQID")).unwrap_err();
        assert!(matches!(err, Error::MalformedReference(_)));
    }

    #[test]
    fn test_reference_uri_forms() {
        for uri in ["", "r1", "#", "#xpointer(/)", "http://example.com/doc#r1"] {
            let reference = REFERENCE.replace(r##"URI="#r1""##, &format!("URI=\"{uri}\""));
            let err = parse(&signature_xml(&reference, "AQID")).unwrap_err();
            assert!(matches!(err, Error::MalformedReference(_)), "{uri}");
        }
    }

    #[test]
    fn test_unsupported_algorithms() {
        let xml = signature_xml(REFERENCE, "AQID").replace("rsa-sha256", "hmac-sha256");
        assert!(matches!(parse(&xml), Err(Error::UnsupportedAlgorithm(_))));

        let reference = REFERENCE.replace("enveloped-signature", "base64");
        assert!(matches!(
            parse(&signature_xml(&reference, "AQID")),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_missing_parts() {
        let xml = signature_xml(REFERENCE, "AQID").replace("<ds:SignatureValue>AQID</ds:SignatureValue>", "");
        assert!(matches!(parse(&xml), Err(Error::MalformedSignature(_))));

        let xml = signature_xml(REFERENCE, "!!not base64!!");
        assert!(matches!(parse(&xml), Err(Error::MalformedSignature(_))));

        let xml = signature_xml(REFERENCE, "AQID").replace(
            r#"<ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"/>"#,
            "<ds:SignatureMethod/>",
        );
        assert!(matches!(parse(&xml), Err(Error::MalformedSignature(_))));
    }

    #[test]
    fn test_not_a_signature() {
        let doc = XmlDocument::parse("<root><Signature/></root>").unwrap();
        let root = doc.document_element().unwrap();
        let sig = doc.first_child(root).unwrap();
        assert!(matches!(
            SignatureRecord::parse(&doc, sig),
            Err(Error::MalformedSignature(_))
        ));
    }
}
