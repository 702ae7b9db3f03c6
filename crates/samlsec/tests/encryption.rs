//! SAML EncryptedAssertion handling through the public API.

use samlsec::core::ns;
use samlsec::crypto::{CipherMethod, KeyTransportMethod, OaepParams};
use samlsec::{decrypt, encrypt_element, EncContext, Error, NodeId, XmlDocument};
use std::path::Path;

fn read(name: &str) -> Vec<u8> {
    let path = Path::new("../../test-data/keys").join(name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}

const RESPONSE: &str = r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_r1"><saml:Issuer>https://idp.example.com</saml:Issuer><saml:EncryptedAssertion><saml:Assertion ID="_a1"><saml:Subject><saml:NameID>alice@example.com</saml:NameID></saml:Subject><saml:AttributeStatement><saml:Attribute Name="role"><saml:AttributeValue xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:type="xs:string">staff</saml:AttributeValue></saml:Attribute></saml:AttributeStatement></saml:Assertion></saml:EncryptedAssertion><samlp:Status/></samlp:Response>"#;

/// Encrypt the assertion inside its `EncryptedAssertion` wrapper and return
/// the serialized response, as an identity provider would send it.
fn encrypted_response(ctx: &EncContext) -> String {
    let mut doc = XmlDocument::parse(RESPONSE).unwrap();
    let response = doc.document_element().unwrap();
    let assertion = doc.find_by_local_name(response, "Assertion").unwrap();
    encrypt_element(&mut doc, assertion, &read("sp-decryption-cert.pem"), ctx).unwrap();
    samlsec::xml::to_document_string(&doc)
}

fn wrapper(doc: &XmlDocument) -> NodeId {
    let response = doc.document_element().unwrap();
    doc.find_by_local_name(response, "EncryptedAssertion").unwrap()
}

#[test]
fn encrypted_assertion_is_decrypted_in_place() {
    let text = encrypted_response(&EncContext::default());
    assert!(!text.contains("alice@example.com"));

    let mut doc = XmlDocument::parse(&text).unwrap();
    let response = doc.document_element().unwrap();
    let encrypted = wrapper(&doc);
    let nodes = decrypt(&mut doc, encrypted, &read("sp-decryption-key.pem")).unwrap();

    assert_eq!(nodes.len(), 1);
    assert_eq!(doc.name(nodes[0]), "Assertion");
    let names: Vec<&str> = doc
        .children(response)
        .filter(|&c| doc.is_element(c))
        .map(|c| doc.name(c))
        .collect();
    assert_eq!(names, ["Issuer", "Assertion", "Status"]);

    let name_id = doc.find_by_local_name(nodes[0], "NameID").unwrap();
    assert_eq!(doc.text_content(name_id), "alice@example.com");
    let value = doc.find_by_local_name(nodes[0], "AttributeValue").unwrap();
    assert_eq!(doc.namespace_uri(value), Some("urn:oasis:names:tc:SAML:2.0:assertion"));
    assert_eq!(doc.attribute_ns(value, "http://www.w3.org/2001/XMLSchema-instance", "type"), Some("xs:string"));
    // Only referenced from the attribute value, yet still declared.
    assert_eq!(doc.lookup_namespace(value, "xs"), Some("http://www.w3.org/2001/XMLSchema"));
}

#[test]
fn empty_key_leaves_document_unchanged() {
    let text = encrypted_response(&EncContext::default());
    let mut doc = XmlDocument::parse(&text).unwrap();
    let encrypted = wrapper(&doc);
    let err = decrypt(&mut doc, encrypted, b"").unwrap_err();
    assert!(matches!(err, Error::EmptyKey));
    assert_eq!(samlsec::xml::to_document_string(&doc), text);
}

#[test]
fn cbc_with_pkcs1_transport() {
    let ctx = EncContext::new(CipherMethod::Aes128Cbc, KeyTransportMethod::RsaPkcs1);
    let mut doc = XmlDocument::parse(&encrypted_response(&ctx)).unwrap();
    let encrypted = wrapper(&doc);
    let nodes = decrypt(&mut doc, encrypted, &read("sp-decryption-key.pem")).unwrap();
    assert_eq!(doc.attribute(nodes[0], "ID"), Some("_a1"));
}

#[test]
fn oaep_11_with_sha256() {
    let params = OaepParams {
        digest: samlsec::crypto::DigestMethod::Sha256,
        mgf: None,
        label: None,
    };
    let ctx = EncContext::new(CipherMethod::Aes256Cbc, KeyTransportMethod::RsaOaep(params));
    let mut doc = XmlDocument::parse(&encrypted_response(&ctx)).unwrap();
    let encrypted = wrapper(&doc);
    decrypt(&mut doc, encrypted, &read("sp-decryption-key.pem")).unwrap();
    let response = doc.document_element().unwrap();
    assert!(doc.find_by_local_name(response, "Assertion").is_some());
}

/// Move the EncryptedKey next to the EncryptedData and point at it with a
/// RetrievalMethod, the layout several identity providers emit.
#[test]
fn sibling_encrypted_key_via_retrieval_method() {
    let text = encrypted_response(&EncContext::default());
    let mut doc = XmlDocument::parse(&text).unwrap();
    let encrypted = wrapper(&doc);
    let key = doc.find_descendant_element(encrypted, ns::ENC, "EncryptedKey").unwrap();
    let key_info = doc.parent(key).unwrap();

    doc.set_attribute(key, "Id", "_key1").unwrap();
    doc.append_child(encrypted, key).unwrap();
    // Its prefixes were declared on the elements it was moved out of.
    doc.declare_namespace(key, "xenc", ns::ENC).unwrap();
    doc.declare_namespace(key, "ds", ns::DSIG).unwrap();
    let retrieval = doc.add_element(key_info, "ds:RetrievalMethod").unwrap();
    doc.set_attribute(retrieval, "URI", "#_key1").unwrap();
    doc.set_attribute(retrieval, "Type", "http://www.w3.org/2001/04/xmlenc#EncryptedKey").unwrap();

    let reparsed_text = samlsec::xml::to_document_string(&doc);
    let mut doc = XmlDocument::parse(&reparsed_text).unwrap();
    let encrypted = wrapper(&doc);
    let nodes = decrypt(&mut doc, encrypted, &read("sp-decryption-key.pem")).unwrap();
    assert_eq!(doc.name(nodes[0]), "Assertion");
}

#[test]
fn wrong_key_fails_to_unwrap() {
    let mut doc = XmlDocument::parse(&encrypted_response(&EncContext::default())).unwrap();
    let encrypted = wrapper(&doc);
    let err = decrypt(&mut doc, encrypted, &read("johnny-key.pem")).unwrap_err();
    assert!(matches!(err, Error::KeyUnwrapFailed(_)));
    assert_eq!(doc.name(wrapper(&doc)), "EncryptedAssertion");
}

#[test]
fn decrypted_then_signed_assertion_verifies() {
    let mut doc = XmlDocument::parse(&encrypted_response(&EncContext::default())).unwrap();
    let encrypted = wrapper(&doc);
    let nodes = decrypt(&mut doc, encrypted, &read("sp-decryption-key.pem")).unwrap();
    let assertion = nodes[0];
    samlsec::sign(&mut doc, assertion, "sp", &read("johnny-key.pem"), &read("johnny-cert.pem")).unwrap();
    assert!(samlsec::verify_signature(&doc, assertion, "sp", &read("johnny-cert.pem")).unwrap());
}
