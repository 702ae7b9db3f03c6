//! End-to-end signing and verification through the public API.

use samlsec::c14n::{canonicalize_node, C14nMode, C14nOptions};
use samlsec::core::ns;
use samlsec::{sign, verify_signature, Error, XmlDocument};
use std::path::Path;

fn read(name: &str) -> Vec<u8> {
    let path = Path::new("../../test-data/keys").join(name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}

/// A response signed outside this crate: libxml2 `xmllint --exc-c14n`
/// produced the canonical bytes and `openssl dgst -sha256 -sign` the
/// SignatureValue, using `johnny-key.pem`. It binds `saml` and `saml2` to the
/// same namespace and uses both.
fn shared_prefix_response() -> String {
    let path = Path::new("../../test-data/responses/shared-prefix-response.xml");
    std::fs::read_to_string(path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}

/// `xmllint --exc-c14n` output for the response with its Signature removed.
const SHARED_PREFIX_CANONICAL: &str = concat!(
    "<samlp:Response xmlns:samlp=\"urn:oasis:names:tc:SAML:2.0:protocol\" Destination=\"https://sp.example.com/acs\" ID=\"_8f2a6c1e0d4b49a7b3c5e9f1a2d4c6e8\" IssueInstant=\"2026-03-01T09:30:00Z\" Version=\"2.0\">\n",
    "  <saml2:Issuer xmlns:saml2=\"urn:oasis:names:tc:SAML:2.0:assertion\">https://idp.example.com</saml2:Issuer>\n",
    "  \n",
    "  <samlp:Status><samlp:StatusCode Value=\"urn:oasis:names:tc:SAML:2.0:status:Success\"></samlp:StatusCode></samlp:Status>\n",
    "  <saml:Assertion xmlns:saml=\"urn:oasis:names:tc:SAML:2.0:assertion\" ID=\"_0b1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e\" IssueInstant=\"2026-03-01T09:30:00Z\" Version=\"2.0\">\n",
    "    <saml:Issuer>https://idp.example.com</saml:Issuer>\n",
    "    <saml2:Subject xmlns:saml2=\"urn:oasis:names:tc:SAML:2.0:assertion\"><saml2:NameID Format=\"urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress\">alice@example.com</saml2:NameID></saml2:Subject>\n",
    "    <saml:AttributeStatement>\n",
    "      <saml2:Attribute xmlns:saml2=\"urn:oasis:names:tc:SAML:2.0:assertion\" Name=\"role\"><saml2:AttributeValue xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xsi:type=\"xs:string\">staff &amp; admin</saml2:AttributeValue></saml2:Attribute>\n",
    "    </saml:AttributeStatement>\n",
    "  </saml:Assertion>\n",
    "</samlp:Response>",
);

#[test]
fn blackbox_is_signed_and_verified() {
    let mut doc = XmlDocument::new();
    let root = doc.add_element(doc.root(), "blackbox").unwrap();
    doc.set_content(root, "magic").unwrap();

    sign(&mut doc, root, "magic", &read("johnny-key.pem"), &read("johnny-cert.pem")).unwrap();
    assert!(verify_signature(&doc, root, "magic", &read("johnny-cert.pem")).unwrap());
}

#[test]
fn externally_signed_response_verifies() {
    let doc = XmlDocument::parse(&shared_prefix_response()).unwrap();
    let response = doc.document_element().unwrap();
    assert!(verify_signature(&doc, response, "idp", &read("johnny-cert.pem")).unwrap());
}

#[test]
fn shared_prefix_response_canonical_bytes() {
    let doc = XmlDocument::parse(&shared_prefix_response()).unwrap();
    let response = doc.document_element().unwrap();
    let signature = doc.find_child_element(response, ns::DSIG, ns::node::SIGNATURE).unwrap();
    let options = C14nOptions::new(C14nMode::Exclusive).excluding(signature);
    let canonical = canonicalize_node(&doc, response, &options).unwrap();
    assert_eq!(String::from_utf8(canonical).unwrap(), SHARED_PREFIX_CANONICAL);
}

#[test]
fn swapping_an_equivalent_prefix_breaks_the_signature() {
    let text = shared_prefix_response()
        .replace("<saml2:Subject>", "<saml:Subject>")
        .replace("</saml2:Subject>", "</saml:Subject>");
    let doc = XmlDocument::parse(&text).unwrap();
    let response = doc.document_element().unwrap();
    assert!(!verify_signature(&doc, response, "idp", &read("johnny-cert.pem")).unwrap());
}

#[test]
fn signed_document_survives_serialization() {
    let mut doc = XmlDocument::parse(
        "<?xml version=\"1.0\"?>\n<blackbox>\n  <item kind=\"a\">one &amp; two</item>\n</blackbox>",
    )
    .unwrap();
    let root = doc.document_element().unwrap();
    sign(&mut doc, root, "magic", &read("johnny-key.pem"), &read("johnny-cert.pem")).unwrap();

    let text = samlsec::xml::to_document_string(&doc);
    let reparsed = XmlDocument::parse(&text).unwrap();
    let root = reparsed.document_element().unwrap();
    assert!(verify_signature(&reparsed, root, "magic", &read("johnny-cert.pem")).unwrap());
}

#[test]
fn tampering_is_detected() {
    let mut doc = XmlDocument::parse("<blackbox><amount>10</amount></blackbox>").unwrap();
    let root = doc.document_element().unwrap();
    sign(&mut doc, root, "magic", &read("johnny-key.pem"), &read("johnny-cert.pem")).unwrap();

    let text = samlsec::xml::to_document_string(&doc).replace(">10<", ">1000<");
    let tampered = XmlDocument::parse(&text).unwrap();
    let root = tampered.document_element().unwrap();
    assert!(!verify_signature(&tampered, root, "magic", &read("johnny-cert.pem")).unwrap());
}

#[test]
fn another_certificate_does_not_verify() {
    let mut doc = XmlDocument::parse("<blackbox/>").unwrap();
    let root = doc.document_element().unwrap();
    sign(&mut doc, root, "magic", &read("johnny-key.pem"), &read("johnny-cert.pem")).unwrap();
    assert!(!verify_signature(&doc, root, "magic", &read("other-cert.pem")).unwrap());

    // The embedded certificate is never trusted on its own.
    let mut forged = XmlDocument::parse("<blackbox/>").unwrap();
    let root = forged.document_element().unwrap();
    sign(&mut forged, root, "magic", &read("other-key.pem"), &read("other-cert.pem")).unwrap();
    assert!(!verify_signature(&forged, root, "magic", &read("johnny-cert.pem")).unwrap());
}

#[test]
fn nested_saml_signatures() {
    let xml = r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_resp" Version="2.0">
  <saml:Issuer xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">https://idp.example.com</saml:Issuer>
  <saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_assert" Version="2.0">
    <saml:Subject><saml:NameID>alice@example.com</saml:NameID></saml:Subject>
  </saml:Assertion>
</samlp:Response>"#;
    let mut doc = XmlDocument::parse(xml).unwrap();
    let response = doc.document_element().unwrap();
    let assertion = doc.find_by_local_name(response, "Assertion").unwrap();
    let key = read("johnny-key.pem");
    let cert = read("johnny-cert.pem");

    sign(&mut doc, assertion, "idp", &key, &cert).unwrap();
    sign(&mut doc, response, "idp", &key, &cert).unwrap();

    let reparsed = XmlDocument::parse(&samlsec::xml::to_document_string(&doc)).unwrap();
    let response = reparsed.document_element().unwrap();
    let assertion = reparsed.find_by_local_name(response, "Assertion").unwrap();
    assert!(verify_signature(&reparsed, assertion, "idp", &cert).unwrap());
    assert!(verify_signature(&reparsed, response, "idp", &cert).unwrap());
    assert_eq!(reparsed.attribute(response, "ID"), Some("_resp"));
}

#[test]
fn wrapped_assertion_is_rejected() {
    let xml = r#"<Response><Assertion ID="_a"><NameID>alice</NameID></Assertion></Response>"#;
    let mut doc = XmlDocument::parse(xml).unwrap();
    let response = doc.document_element().unwrap();
    let assertion = doc.first_child(response).unwrap();
    sign(&mut doc, assertion, "idp", &read("johnny-key.pem"), &read("johnny-cert.pem")).unwrap();

    // Attacker copies the signed assertion aside and injects a forged one
    // carrying the same identifier.
    let text = samlsec::xml::to_document_string(&doc);
    let signed_part = text
        .split_once("<Response>")
        .and_then(|(_, rest)| rest.rsplit_once("</Response>"))
        .map(|(inner, _)| inner.to_owned())
        .unwrap();
    let forged = signed_part.replace("alice", "mallory");
    let attack = format!("<Response><Extensions>{signed_part}</Extensions>{forged}</Response>");

    let doc = XmlDocument::parse(&attack).unwrap();
    let response = doc.document_element().unwrap();
    let forged_assertion = doc
        .children(response)
        .filter(|&c| doc.is_element(c))
        .nth(1)
        .unwrap();
    let err = verify_signature(&doc, forged_assertion, "idp", &read("johnny-cert.pem")).unwrap_err();
    assert!(matches!(err, Error::MalformedReference(_)));
}

#[test]
fn unsigned_and_malformed() {
    let doc = XmlDocument::parse("<blackbox/>").unwrap();
    let root = doc.document_element().unwrap();
    assert!(matches!(
        verify_signature(&doc, root, "magic", &read("johnny-cert.pem")),
        Err(Error::SignatureNotFound(_))
    ));

    let xml = format!(
        r#"<blackbox ID="x"><ds:Signature xmlns:ds="{}"><ds:SignatureValue>AA==</ds:SignatureValue></ds:Signature></blackbox>"#,
        ns::DSIG
    );
    let doc = XmlDocument::parse(&xml).unwrap();
    let root = doc.document_element().unwrap();
    assert!(matches!(
        verify_signature(&doc, root, "magic", &read("johnny-cert.pem")),
        Err(Error::MalformedSignature(_))
    ));
}
