#![forbid(unsafe_code)]

//! Enveloped signature verification.
//!
//! Processing order:
//! 1. Decode the caller's certificate; it is the only trusted key.
//! 2. Locate the `<Signature>` child of the node by key name.
//! 3. Read it into a [`SignatureRecord`].
//! 4. Bind the reference: its id must name exactly one element, the node.
//! 5. Apply transforms, digest, compare with DigestValue.
//! 6. Canonicalize SignedInfo and check SignatureValue.
//!
//! Steps 5 and 6 report a mismatch as `Ok(false)`; everything before them
//! fails with an error.

use crate::context::DsigContext;
use crate::record::{key_name_of, SignatureRecord};
use samlsec_c14n::{canonicalize_node, C14nMode, C14nOptions};
use samlsec_core::{ns, Error};
use samlsec_crypto::constant_time_eq;
use samlsec_keys::load_certificate_pem;
use samlsec_xml::{NodeId, XmlDocument};
use tracing::debug;

/// Verify the enveloped signature of `node` with the default context.
pub fn verify_signature(doc: &XmlDocument, node: NodeId, key_name: &str, cert_pem: &[u8]) -> Result<bool, Error> {
    verify_with_context(&DsigContext::default(), doc, node, key_name, cert_pem)
}

/// Verify the enveloped signature of `node` against `cert_pem`.
///
/// Returns `Ok(false)` when the signature is well formed but the digest or
/// signature value does not match.
pub fn verify_with_context(
    ctx: &DsigContext,
    doc: &XmlDocument,
    node: NodeId,
    key_name: &str,
    cert_pem: &[u8],
) -> Result<bool, Error> {
    let cert = load_certificate_pem(cert_pem)?;
    let public_key = cert.rsa_public_key()?;

    if !doc.contains(node) || !doc.is_element(node) {
        return Err(Error::MalformedSubtree("signed node must be an element".into()));
    }
    let signature = locate_signature(doc, node, key_name)?;
    let record = SignatureRecord::parse(doc, signature)?;
    check_reference_binding(ctx, doc, node, &record)?;

    let (mode, prefixes) = match record.reference.canonicalization() {
        Some((mode, prefixes)) => (mode, prefixes.to_vec()),
        None => (C14nMode::Inclusive, Vec::new()),
    };
    // "#id" selects the subtree without comments.
    let mut options = C14nOptions::new(mode.without_comments()).with_inclusive_prefixes(prefixes);
    if record.reference.is_enveloped() {
        options = options.excluding(signature);
    }
    debug!(stage = "canonicalizing", node = doc.name(node), algorithm = mode.uri());
    let canonical = canonicalize_node(doc, node, &options)?;

    let digest_method = record.reference.digest_method;
    debug!(stage = "digesting", algorithm = digest_method.uri(), bytes = canonical.len());
    let digest = digest_method.digest(&canonical);
    if !constant_time_eq(&digest, &record.reference.digest_value) {
        debug!(stage = "done", node = doc.name(node), "reference digest mismatch");
        return Ok(false);
    }

    let signed_info_options =
        C14nOptions::new(record.c14n_mode).with_inclusive_prefixes(record.inclusive_prefixes.clone());
    let signed_info = canonicalize_node(doc, record.signed_info, &signed_info_options)?;
    debug!(stage = "verifying", algorithm = record.signature_method.uri());
    let signed_info_digest = record.signature_method.digest_method().digest(&signed_info);
    let valid = record
        .signature_method
        .verify(&record.signature_value, &signed_info_digest, &public_key)?;

    debug!(stage = "done", node = doc.name(node), valid, "signature checked");
    Ok(valid)
}

/// Pick the `<Signature>` child of `node` for `key_name`.
fn locate_signature(doc: &XmlDocument, node: NodeId, key_name: &str) -> Result<NodeId, Error> {
    let signatures = doc.child_elements(node, ns::DSIG, ns::node::SIGNATURE);
    if signatures.is_empty() {
        return Err(Error::SignatureNotFound(format!(
            "<{}> has no Signature child",
            doc.name(node)
        )));
    }

    let named: Vec<NodeId> = signatures
        .iter()
        .copied()
        .filter(|&s| key_name_of(doc, s).as_deref() == Some(key_name))
        .collect();
    match (named.as_slice(), signatures.as_slice()) {
        ([one], _) => Ok(*one),
        ([], [only]) => Ok(*only),
        ([], _) => Err(Error::SignatureNotFound(format!(
            "no Signature with key name \"{key_name}\" among {}",
            signatures.len()
        ))),
        (several, _) => Err(Error::MalformedReference(format!(
            "{} signatures carry key name \"{key_name}\"",
            several.len()
        ))),
    }
}

/// The reference id must identify exactly one element, and it must be `node`.
fn check_reference_binding(
    ctx: &DsigContext,
    doc: &XmlDocument,
    node: NodeId,
    record: &SignatureRecord,
) -> Result<(), Error> {
    let id = &record.reference.id;
    let matches = doc.elements_with_id(&ctx.id_attr_names(), id);
    match matches.as_slice() {
        [only] if *only == node => Ok(()),
        [] => Err(Error::MalformedReference(format!("no element with identifier \"{id}\""))),
        [other] => Err(Error::MalformedReference(format!(
            "reference \"#{id}\" points at <{}>, not at the signature's parent <{}>",
            doc.name(*other),
            doc.name(node)
        ))),
        several => Err(Error::MalformedReference(format!(
            "identifier \"{id}\" is carried by {} elements",
            several.len()
        ))),
    }
}
