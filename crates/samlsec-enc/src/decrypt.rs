#![forbid(unsafe_code)]

//! XML-Enc decryption.
//!
//! Processing order:
//! 1. Reject an empty key before touching the tree, then decode it.
//! 2. Find `<EncryptedData>` (the node itself or its first descendant).
//! 3. Read it into an [`EncryptedDataRecord`] with its EncryptedKey candidates.
//! 4. Unwrap the session key with the first candidate that yields a key of
//!    the cipher's size.
//! 5. Decrypt, parse the plaintext in the namespace context of the
//!    replacement site, and splice it in place of the node.

use crate::context::EncContext;
use crate::record::{EncryptedDataRecord, EncryptedKeyRecord};
use samlsec_core::{ns, Error};
use samlsec_keys::{load_private_key_pem, PrivateKey};
use samlsec_xml::{NodeId, XmlDocument};
use tracing::debug;
use zeroize::Zeroizing;

/// Decrypt `encrypted_node` in place with the default context.
pub fn decrypt(doc: &mut XmlDocument, encrypted_node: NodeId, key_pem: &[u8]) -> Result<Vec<NodeId>, Error> {
    decrypt_with_context(&EncContext::default(), doc, encrypted_node, key_pem)
}

/// Decrypt `encrypted_node` and replace it with the plaintext nodes.
///
/// `encrypted_node` is either an `<xenc:EncryptedData>` or a wrapper holding
/// one, such as SAML's `<EncryptedAssertion>`; the whole node is replaced.
/// Returns the inserted nodes in document order. On error the tree is left
/// untouched.
pub fn decrypt_with_context(
    ctx: &EncContext,
    doc: &mut XmlDocument,
    encrypted_node: NodeId,
    key_pem: &[u8],
) -> Result<Vec<NodeId>, Error> {
    if key_pem.is_empty() {
        return Err(Error::EmptyKey);
    }
    let key = load_private_key_pem(key_pem)?;

    if !doc.contains(encrypted_node) || !doc.is_element(encrypted_node) {
        return Err(Error::MalformedSubtree("encrypted node must be an element".into()));
    }
    let site = doc
        .parent(encrypted_node)
        .ok_or_else(|| Error::MalformedSubtree("encrypted node is not attached to a parent".into()))?;

    let data_node = locate_encrypted_data(doc, encrypted_node)?;
    let record = EncryptedDataRecord::parse(doc, data_node, &ctx.id_attr_names())?;
    debug!(
        node = doc.name(encrypted_node),
        algorithm = record.cipher.uri(),
        candidates = record.key_candidates.len(),
        "decrypting"
    );

    let session_key = unwrap_session_key(doc, &record, &key)?;
    let plaintext = record.cipher.decrypt(&session_key, &record.cipher_value)?;
    let text = std::str::from_utf8(&plaintext)
        .map_err(|e| Error::CipherTextCorrupt(format!("plaintext is not UTF-8: {e}")))?;

    let nodes = doc.parse_fragment_into(site, text).map_err(|e| match e {
        Error::XmlParse(msg) => Error::CipherTextCorrupt(format!("plaintext is not well-formed XML: {msg}")),
        other => other,
    })?;
    doc.replace_node(encrypted_node, &nodes)?;
    debug!(inserted = nodes.len(), "decrypted content spliced");
    Ok(nodes)
}

fn locate_encrypted_data(doc: &XmlDocument, node: NodeId) -> Result<NodeId, Error> {
    if doc.name(node) == ns::node::ENCRYPTED_DATA && doc.namespace_uri(node) == Some(ns::ENC) {
        return Ok(node);
    }
    doc.find_descendant_element(node, ns::ENC, ns::node::ENCRYPTED_DATA)
        .ok_or_else(|| {
            Error::MalformedEncryptedData(format!("no EncryptedData inside <{}>", doc.name(node)))
        })
}

/// Try each EncryptedKey candidate in order.
///
/// A candidate wins when unwrapping succeeds and the result has exactly the
/// content cipher's key size. Structural errors of a candidate are only
/// reported when no candidate could be attempted at all.
fn unwrap_session_key(
    doc: &XmlDocument,
    record: &EncryptedDataRecord,
    key: &PrivateKey,
) -> Result<Zeroizing<Vec<u8>>, Error> {
    let expected = record.cipher.key_size();
    let mut first_error = None;
    let mut attempted = 0usize;

    for &candidate in &record.key_candidates {
        let encrypted_key = match EncryptedKeyRecord::parse(doc, candidate) {
            Ok(ek) => ek,
            Err(e) => {
                debug!(error = %e, "skipping EncryptedKey candidate");
                first_error.get_or_insert(e);
                continue;
            }
        };
        attempted += 1;
        match encrypted_key.method.decrypt(key.rsa(), &encrypted_key.cipher_value) {
            Ok(session) if session.len() == expected => {
                debug!(algorithm = encrypted_key.method.uri(), "session key unwrapped");
                return Ok(session);
            }
            Ok(session) => debug!(
                got = session.len(),
                expected,
                "unwrapped key does not fit the content cipher"
            ),
            Err(e) => debug!(error = %e, "key unwrap failed"),
        }
    }

    match first_error {
        Some(e) if attempted == 0 => Err(e),
        _ => Err(Error::KeyUnwrapFailed(format!(
            "none of {attempted} EncryptedKey candidates yielded a {expected} byte key for {}",
            record.cipher.uri()
        ))),
    }
}
