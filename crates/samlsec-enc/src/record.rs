#![forbid(unsafe_code)]

//! Typed views of `<xenc:EncryptedData>` and `<xenc:EncryptedKey>`.

use samlsec_core::{algorithm, ns, Error};
use samlsec_crypto::keytransport::mgf_from_uri;
use samlsec_crypto::{CipherMethod, DigestMethod, KeyTransportMethod, OaepParams};
use samlsec_xml::{NodeId, XmlDocument};

/// The `Type` attribute of an `<EncryptedData>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptedType {
    /// `xmlenc#Element`: the plaintext is one element.
    Element,
    /// `xmlenc#Content`: the plaintext is element content.
    Content,
    /// No `Type`; the plaintext is still spliced in as XML.
    Unspecified,
}

impl EncryptedType {
    fn from_attribute(value: Option<&str>) -> Result<Self, Error> {
        match value {
            None => Ok(Self::Unspecified),
            Some(ns::ENC_TYPE_ELEMENT) => Ok(Self::Element),
            Some(ns::ENC_TYPE_CONTENT) => Ok(Self::Content),
            Some(other) => Err(Error::MalformedEncryptedData(format!(
                "cannot splice non-XML EncryptedData of Type {other}"
            ))),
        }
    }
}

/// An `<EncryptedData>` element with its key candidates resolved.
#[derive(Debug, Clone)]
pub struct EncryptedDataRecord {
    pub node: NodeId,
    pub data_type: EncryptedType,
    pub cipher: CipherMethod,
    pub cipher_value: Vec<u8>,
    /// `<EncryptedKey>` elements to try, in order, without duplicates.
    pub key_candidates: Vec<NodeId>,
}

impl EncryptedDataRecord {
    /// Read `node`, resolving `RetrievalMethod` references through `id_attrs`.
    pub fn parse(doc: &XmlDocument, node: NodeId, id_attrs: &[&str]) -> Result<Self, Error> {
        if !is_enc(doc, node, ns::node::ENCRYPTED_DATA) {
            return Err(Error::MalformedEncryptedData(format!(
                "<{}> is not an xenc:EncryptedData element",
                doc.name(node)
            )));
        }
        let data_type = EncryptedType::from_attribute(doc.attribute(node, ns::attr::TYPE))?;

        let method = required_child(doc, node, ns::ENC, ns::node::ENCRYPTION_METHOD)?;
        let cipher = CipherMethod::from_uri(algorithm_of(doc, method)?)?;
        let cipher_value = read_cipher_value(doc, node)?;

        let mut key_candidates = Vec::new();
        if let Some(key_info) = doc.find_child_element(node, ns::DSIG, ns::node::KEY_INFO) {
            key_candidates.extend(doc.child_elements(key_info, ns::ENC, ns::node::ENCRYPTED_KEY));
            for retrieval in doc.child_elements(key_info, ns::DSIG, ns::node::RETRIEVAL_METHOD) {
                if let Some(target) = resolve_retrieval_method(doc, retrieval, id_attrs) {
                    key_candidates.push(target);
                }
            }
        }
        if let Some(wrapper) = doc.parent(node) {
            key_candidates.extend(doc.child_elements(wrapper, ns::ENC, ns::node::ENCRYPTED_KEY));
        }
        let mut seen = Vec::with_capacity(key_candidates.len());
        key_candidates.retain(|c| {
            let fresh = !seen.contains(c);
            seen.push(*c);
            fresh
        });

        if key_candidates.is_empty() {
            return Err(Error::MalformedEncryptedData(
                "no EncryptedKey found for EncryptedData".into(),
            ));
        }

        Ok(Self {
            node,
            data_type,
            cipher,
            cipher_value,
            key_candidates,
        })
    }
}

/// An `<EncryptedKey>` carrying an RSA-transported session key.
#[derive(Debug, Clone)]
pub struct EncryptedKeyRecord {
    pub node: NodeId,
    pub method: KeyTransportMethod,
    pub cipher_value: Vec<u8>,
}

impl EncryptedKeyRecord {
    pub fn parse(doc: &XmlDocument, node: NodeId) -> Result<Self, Error> {
        if !is_enc(doc, node, ns::node::ENCRYPTED_KEY) {
            return Err(Error::MalformedEncryptedData(format!(
                "<{}> is not an xenc:EncryptedKey element",
                doc.name(node)
            )));
        }
        let method_node = required_child(doc, node, ns::ENC, ns::node::ENCRYPTION_METHOD)?;
        let uri = algorithm_of(doc, method_node)?;
        let method = KeyTransportMethod::from_uri(uri, read_oaep_params(doc, method_node)?)?;
        Ok(Self {
            node,
            method,
            cipher_value: read_cipher_value(doc, node)?,
        })
    }
}

/// Follow `<ds:RetrievalMethod URI="#id">` to an `<EncryptedKey>`.
fn resolve_retrieval_method(doc: &XmlDocument, retrieval: NodeId, id_attrs: &[&str]) -> Option<NodeId> {
    if let Some(kind) = doc.attribute(retrieval, ns::attr::TYPE) {
        if kind != algorithm::ENCRYPTED_KEY {
            return None;
        }
    }
    let id = doc.attribute(retrieval, ns::attr::URI)?.strip_prefix('#')?;
    doc.elements_with_id(id_attrs, id)
        .into_iter()
        .find(|&n| is_enc(doc, n, ns::node::ENCRYPTED_KEY))
}

fn read_oaep_params(doc: &XmlDocument, method: NodeId) -> Result<OaepParams, Error> {
    let mut params = OaepParams::sha1();
    for child in doc.children(method).filter(|&c| doc.is_element(c)) {
        let child_ns = doc.namespace_uri(child).unwrap_or("");
        match doc.name(child) {
            ns::node::DIGEST_METHOD if child_ns == ns::DSIG || child_ns == ns::ENC => {
                params.digest = DigestMethod::from_uri(algorithm_of(doc, child)?)?;
            }
            ns::node::RSA_MGF if child_ns == ns::ENC11 => {
                params.mgf = Some(mgf_from_uri(algorithm_of(doc, child)?)?);
            }
            ns::node::RSA_OAEP_PARAMS if child_ns == ns::ENC => {
                params.label = Some(decode_base64(&doc.text_content(child), "OAEPparams")?);
            }
            _ => {}
        }
    }
    Ok(params)
}

fn read_cipher_value(doc: &XmlDocument, parent: NodeId) -> Result<Vec<u8>, Error> {
    let cipher_data = required_child(doc, parent, ns::ENC, ns::node::CIPHER_DATA)?;
    if doc.find_child_element(cipher_data, ns::ENC, ns::node::CIPHER_REFERENCE).is_some() {
        return Err(Error::MalformedEncryptedData(
            "CipherReference is not supported, CipherValue expected".into(),
        ));
    }
    let value = required_child(doc, cipher_data, ns::ENC, ns::node::CIPHER_VALUE)?;
    decode_base64(&doc.text_content(value), "CipherValue")
}

fn is_enc(doc: &XmlDocument, node: NodeId, local: &str) -> bool {
    doc.is_element(node) && doc.name(node) == local && doc.namespace_uri(node) == Some(ns::ENC)
}

fn required_child(doc: &XmlDocument, parent: NodeId, ns_uri: &str, local: &str) -> Result<NodeId, Error> {
    doc.find_child_element(parent, ns_uri, local).ok_or_else(|| {
        Error::MalformedEncryptedData(format!("missing <{local}> in <{}>", doc.name(parent)))
    })
}

fn algorithm_of(doc: &XmlDocument, node: NodeId) -> Result<&str, Error> {
    doc.attribute(node, ns::attr::ALGORITHM).ok_or_else(|| {
        Error::MalformedEncryptedData(format!("missing Algorithm on <{}>", doc.name(node)))
    })
}

fn decode_base64(text: &str, what: &str) -> Result<Vec<u8>, Error> {
    use base64::Engine;
    let engine = base64::engine::general_purpose::STANDARD;
    let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    engine
        .decode(&clean)
        .map_err(|e| Error::MalformedEncryptedData(format!("{what}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENC_KEY: &str = r#"<xenc:EncryptedKey Id="k1" Recipient="sp"><xenc:EncryptionMethod Algorithm="http://www.w3.org/2009/xmlenc11#rsa-oaep"><ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/><xenc11:MGF xmlns:xenc11="http://www.w3.org/2009/xmlenc11#" Algorithm="http://www.w3.org/2009/xmlenc11#mgf1sha512"/><xenc:OAEPparams>bGFiZWw=</xenc:OAEPparams></xenc:EncryptionMethod><xenc:CipherData><xenc:CipherValue>AQID</xenc:CipherValue></xenc:CipherData></xenc:EncryptedKey>"#;

    fn wrap(key_info: &str, siblings: &str) -> String {
        format!(
            r#"<saml:EncryptedAssertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" xmlns:xenc="http://www.w3.org/2001/04/xmlenc#" xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><xenc:EncryptedData Type="http://www.w3.org/2001/04/xmlenc#Element"><xenc:EncryptionMethod Algorithm="http://www.w3.org/2001/04/xmlenc#aes128-cbc"/><ds:KeyInfo>{key_info}</ds:KeyInfo><xenc:CipherData><xenc:CipherValue>
BAUG
</xenc:CipherValue></xenc:CipherData></xenc:EncryptedData>{siblings}</saml:EncryptedAssertion>"#
        )
    }

    fn data_node(doc: &XmlDocument) -> NodeId {
        let root = doc.document_element().unwrap();
        doc.find_child_element(root, ns::ENC, "EncryptedData").unwrap()
    }

    #[test]
    fn test_parse_inline_key() {
        let doc = XmlDocument::parse(&wrap(ENC_KEY, "")).unwrap();
        let rec = EncryptedDataRecord::parse(&doc, data_node(&doc), &["Id"]).unwrap();
        assert_eq!(rec.data_type, EncryptedType::Element);
        assert_eq!(rec.cipher, CipherMethod::Aes128Cbc);
        assert_eq!(rec.cipher_value, [4, 5, 6]);
        assert_eq!(rec.key_candidates.len(), 1);

        let key = EncryptedKeyRecord::parse(&doc, rec.key_candidates[0]).unwrap();
        assert_eq!(key.cipher_value, [1, 2, 3]);
        assert_eq!(
            key.method,
            KeyTransportMethod::RsaOaep(OaepParams {
                digest: DigestMethod::Sha256,
                mgf: Some(DigestMethod::Sha512),
                label: Some(b"label".to_vec()),
            })
        );
    }

    #[test]
    fn test_retrieval_method_and_sibling_deduplicated() {
        let retrieval = r##"<ds:RetrievalMethod URI="#k1" Type="http://www.w3.org/2001/04/xmlenc#EncryptedKey"/>"##;
        let doc = XmlDocument::parse(&wrap(retrieval, ENC_KEY)).unwrap();
        let rec = EncryptedDataRecord::parse(&doc, data_node(&doc), &["Id"]).unwrap();
        assert_eq!(rec.key_candidates.len(), 1);
        assert_eq!(doc.attribute(rec.key_candidates[0], "Id"), Some("k1"));
    }

    #[test]
    fn test_sibling_key_without_key_info() {
        let doc = XmlDocument::parse(&wrap("", ENC_KEY)).unwrap();
        let rec = EncryptedDataRecord::parse(&doc, data_node(&doc), &["Id"]).unwrap();
        assert_eq!(rec.key_candidates.len(), 1);
    }

    #[test]
    fn test_no_key_candidates() {
        let doc = XmlDocument::parse(&wrap("<ds:KeyName>k</ds:KeyName>", "")).unwrap();
        let err = EncryptedDataRecord::parse(&doc, data_node(&doc), &["Id"]).unwrap_err();
        assert!(matches!(err, Error::MalformedEncryptedData(_)));
    }

    #[test]
    fn test_unsupported_cipher_and_type() {
        let xml = wrap(ENC_KEY, "").replace("aes128-cbc", "tripledes-cbc");
        let doc = XmlDocument::parse(&xml).unwrap();
        assert!(matches!(
            EncryptedDataRecord::parse(&doc, data_node(&doc), &["Id"]),
            Err(Error::UnsupportedAlgorithm(_))
        ));

        let xml = wrap(ENC_KEY, "").replace("xmlenc#Element", "xmlenc#EncryptedKey");
        let doc = XmlDocument::parse(&xml).unwrap();
        assert!(matches!(
            EncryptedDataRecord::parse(&doc, data_node(&doc), &["Id"]),
            Err(Error::MalformedEncryptedData(_))
        ));
    }

    #[test]
    fn test_bad_cipher_value() {
        let xml = wrap(ENC_KEY, "").replace("BAUG", "%%%");
        let doc = XmlDocument::parse(&xml).unwrap();
        assert!(matches!(
            EncryptedDataRecord::parse(&doc, data_node(&doc), &["Id"]),
            Err(Error::MalformedEncryptedData(_))
        ));
    }
}
