#![forbid(unsafe_code)]

//! Element encryption.
//!
//! Produces the layout SAML identity providers use for encrypted
//! assertions: `<xenc:EncryptedData Type="...#Element">` with the session
//! key in `ds:KeyInfo/xenc:EncryptedKey`.

use crate::context::EncContext;
use samlsec_c14n::{canonicalize_node, C14nMode, C14nOptions};
use samlsec_core::{ns, Error};
use samlsec_crypto::keytransport::mgf_uri;
use samlsec_crypto::{DigestMethod, KeyTransportMethod};
use samlsec_keys::load_public_key_pem;
use samlsec_xml::{NodeId, XmlDocument};
use tracing::debug;
use zeroize::Zeroizing;

fn xenc(local: &str) -> String {
    format!("{}:{local}", ns::ENC_PREFIX)
}

fn ds(local: &str) -> String {
    format!("{}:{local}", ns::DSIG_PREFIX)
}

/// Encrypt `element` for the holder of `recipient_pem` and replace it with
/// the resulting `<xenc:EncryptedData>`, whose id is returned.
///
/// `recipient_pem` may be a certificate or a bare RSA public key. The
/// plaintext is the exclusive canonical form of the element, keeping every
/// namespace declaration made inside it.
pub fn encrypt_element(
    doc: &mut XmlDocument,
    element: NodeId,
    recipient_pem: &[u8],
    ctx: &EncContext,
) -> Result<NodeId, Error> {
    if !doc.contains(element) || !doc.is_element(element) {
        return Err(Error::MalformedSubtree("only elements can be encrypted".into()));
    }
    if doc.parent(element).is_none() {
        return Err(Error::MalformedSubtree("encrypted element must be attached to a parent".into()));
    }
    if let KeyTransportMethod::RsaOaepMgf1p(params) = &ctx.key_transport {
        if params.mgf.is_some_and(|m| m != DigestMethod::Sha1) {
            return Err(Error::UnsupportedAlgorithm(
                "rsa-oaep-mgf1p only carries MGF1 with SHA-1; use xmlenc11#rsa-oaep".into(),
            ));
        }
    }
    let public_key = load_public_key_pem(recipient_pem)?;

    let options = C14nOptions::new(C14nMode::Exclusive).with_inclusive_prefixes(declared_prefixes(doc, element));
    let plaintext = Zeroizing::new(canonicalize_node(doc, element, &options)?);

    let session_key = ctx.cipher.generate_key();
    let cipher_text = ctx.cipher.encrypt(&session_key, &plaintext)?;
    let wrapped_key = ctx.key_transport.encrypt(&public_key, &session_key)?;
    debug!(
        node = doc.name(element),
        cipher = ctx.cipher.uri(),
        transport = ctx.key_transport.uri(),
        "encrypting element"
    );

    let encrypted = build_encrypted_data(doc, ctx, &cipher_text, &wrapped_key)?;
    doc.replace_node(element, &[encrypted])?;
    Ok(encrypted)
}

/// Prefixes declared anywhere in the subtree, in PrefixList spelling.
///
/// Listing them keeps declarations that are only referenced from content,
/// such as `xsi:type="xs:string"`, which exclusive C14N would drop.
fn declared_prefixes(doc: &XmlDocument, element: NodeId) -> Vec<String> {
    let mut prefixes: Vec<String> = Vec::new();
    let subtree = std::iter::once(element).chain(doc.descendants(element));
    for (declared, _) in subtree.filter_map(|n| doc.element(n)).flat_map(|e| e.namespace_declarations.iter()) {
        let prefix = if declared.is_empty() { "#default".to_owned() } else { declared.to_string() };
        if !prefixes.contains(&prefix) {
            prefixes.push(prefix);
        }
    }
    prefixes
}

fn build_encrypted_data(
    doc: &mut XmlDocument,
    ctx: &EncContext,
    cipher_text: &[u8],
    wrapped_key: &[u8],
) -> Result<NodeId, Error> {
    use base64::Engine;
    let engine = base64::engine::general_purpose::STANDARD;

    let data = doc.create_element(&xenc(ns::node::ENCRYPTED_DATA));
    doc.declare_namespace(data, ns::ENC_PREFIX, ns::ENC)?;
    doc.set_attribute(data, ns::attr::TYPE, ns::ENC_TYPE_ELEMENT)?;
    let method = doc.add_element(data, &xenc(ns::node::ENCRYPTION_METHOD))?;
    doc.set_attribute(method, ns::attr::ALGORITHM, ctx.cipher.uri())?;

    let key_info = doc.add_element(data, &ds(ns::node::KEY_INFO))?;
    doc.declare_namespace(key_info, ns::DSIG_PREFIX, ns::DSIG)?;
    let encrypted_key = doc.add_element(key_info, &xenc(ns::node::ENCRYPTED_KEY))?;
    let key_method = doc.add_element(encrypted_key, &xenc(ns::node::ENCRYPTION_METHOD))?;
    doc.set_attribute(key_method, ns::attr::ALGORITHM, ctx.key_transport.uri())?;
    write_oaep_params(doc, key_method, &ctx.key_transport)?;
    add_cipher_value(doc, encrypted_key, &engine.encode(wrapped_key))?;

    add_cipher_value(doc, data, &engine.encode(cipher_text))?;
    Ok(data)
}

fn write_oaep_params(doc: &mut XmlDocument, method: NodeId, transport: &KeyTransportMethod) -> Result<(), Error> {
    let Some(params) = transport.oaep_params() else {
        return Ok(());
    };
    let digest = doc.add_element(method, &ds(ns::node::DIGEST_METHOD))?;
    doc.set_attribute(digest, ns::attr::ALGORITHM, params.digest.uri())?;

    if let (KeyTransportMethod::RsaOaep(_), Some(mgf)) = (transport, params.mgf) {
        let node = doc.add_element(method, &format!("xenc11:{}", ns::node::RSA_MGF))?;
        doc.declare_namespace(node, "xenc11", ns::ENC11)?;
        doc.set_attribute(node, ns::attr::ALGORITHM, mgf_uri(mgf))?;
    }
    if let Some(label) = &params.label {
        use base64::Engine;
        let engine = base64::engine::general_purpose::STANDARD;
        let node = doc.add_element(method, &xenc(ns::node::RSA_OAEP_PARAMS))?;
        doc.set_content(node, &engine.encode(label))?;
    }
    Ok(())
}

fn add_cipher_value(doc: &mut XmlDocument, parent: NodeId, value: &str) -> Result<(), Error> {
    let data = doc.add_element(parent, &xenc(ns::node::CIPHER_DATA))?;
    let cv = doc.add_element(data, &xenc(ns::node::CIPHER_VALUE))?;
    doc.set_content(cv, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decrypt::decrypt_with_context;
    use crate::record::{EncryptedDataRecord, EncryptedKeyRecord};
    use samlsec_crypto::{CipherMethod, OaepParams};

    fn read(name: &str) -> Vec<u8> {
        let path = std::path::Path::new("../../test-data/keys").join(name);
        std::fs::read(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
    }

    const ASSERTION: &str = r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol"><saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" ID="a1"><saml:AttributeValue xsi:type="xs:string">staff</saml:AttributeValue></saml:Assertion></samlp:Response>"#;

    fn transports() -> Vec<KeyTransportMethod> {
        vec![
            KeyTransportMethod::RsaPkcs1,
            KeyTransportMethod::RsaOaepMgf1p(OaepParams::sha1()),
            KeyTransportMethod::RsaOaep(OaepParams {
                digest: DigestMethod::Sha256,
                mgf: Some(DigestMethod::Sha256),
                label: Some(b"saml".to_vec()),
            }),
        ]
    }

    #[test]
    fn test_every_cipher_and_transport() {
        let ciphers = [
            CipherMethod::Aes128Cbc,
            CipherMethod::Aes192Cbc,
            CipherMethod::Aes256Cbc,
            CipherMethod::Aes128Gcm,
            CipherMethod::Aes192Gcm,
            CipherMethod::Aes256Gcm,
        ];
        for cipher in ciphers {
            for transport in transports() {
                let ctx = EncContext::new(cipher, transport.clone());
                let mut doc = XmlDocument::parse(ASSERTION).unwrap();
                let response = doc.document_element().unwrap();
                let assertion = doc.first_child(response).unwrap();
                let expected = doc.to_xml_string(response);

                let enc = encrypt_element(&mut doc, assertion, &read("sp-decryption-cert.pem"), &ctx).unwrap();
                assert_eq!(doc.first_child(response), Some(enc));
                let record = EncryptedDataRecord::parse(&doc, enc, &ctx.id_attr_names()).unwrap();
                assert_eq!(record.cipher, cipher);
                let key = EncryptedKeyRecord::parse(&doc, record.key_candidates[0]).unwrap();
                assert_eq!(key.method, transport);

                decrypt_with_context(&ctx, &mut doc, enc, &read("sp-decryption-key.pem")).unwrap();
                assert_eq!(doc.to_xml_string(response), expected, "{} / {}", cipher.uri(), transport.uri());
            }
        }
    }

    #[test]
    fn test_spki_recipient() {
        let mut doc = XmlDocument::parse("<r><s/></r>").unwrap();
        let root = doc.document_element().unwrap();
        let s = doc.first_child(root).unwrap();
        encrypt_element(&mut doc, s, &read("sp-decryption-pub.pem"), &EncContext::default()).unwrap();
        assert!(doc.find_descendant_element(root, ns::ENC, "EncryptedKey").is_some());
    }

    #[test]
    fn test_preconditions() {
        let mut doc = XmlDocument::parse("<r>text</r>").unwrap();
        let root = doc.document_element().unwrap();
        let text = doc.first_child(root).unwrap();
        let cert = read("sp-decryption-cert.pem");
        let ctx = EncContext::default();
        assert!(matches!(encrypt_element(&mut doc, text, &cert, &ctx), Err(Error::MalformedSubtree(_))));
        let loose = doc.create_element("loose");
        assert!(matches!(encrypt_element(&mut doc, loose, &cert, &ctx), Err(Error::MalformedSubtree(_))));
        let s = doc.add_element(root, "s").unwrap();
        assert!(matches!(encrypt_element(&mut doc, s, b"nope", &ctx), Err(Error::InvalidKey(_))));

        let mgf1p_sha512 = EncContext::new(
            CipherMethod::Aes128Gcm,
            KeyTransportMethod::RsaOaepMgf1p(OaepParams {
                digest: DigestMethod::Sha1,
                mgf: Some(DigestMethod::Sha512),
                label: None,
            }),
        );
        assert!(matches!(
            encrypt_element(&mut doc, s, &cert, &mgf1p_sha512),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }
}
