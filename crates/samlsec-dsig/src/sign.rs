#![forbid(unsafe_code)]

//! Enveloped signature creation.
//!
//! The signature is assembled as a subtree, appended as the last child of
//! the target, then filled in: first the reference digest over the target
//! (signature excluded), then the signature over the canonical SignedInfo.

use crate::context::DsigContext;
use samlsec_c14n::{canonicalize_node, C14nOptions};
use samlsec_core::{algorithm, ns, Error};
use samlsec_keys::{load_certificate_pem, load_private_key_pem, Certificate, PrivateKey};
use samlsec_xml::{NodeId, XmlDocument};
use tracing::{debug, warn};

/// Attribute written when the target has no identifier yet.
const GENERATED_ID_ATTR: &str = "ID";

/// Sign `target` in place with the default context.
pub fn sign(
    doc: &mut XmlDocument,
    target: NodeId,
    key_name: &str,
    private_key_pem: &[u8],
    cert_pem: &[u8],
) -> Result<(), Error> {
    sign_with_context(&DsigContext::default(), doc, target, key_name, private_key_pem, cert_pem)
}

/// Sign `target` in place, appending `<ds:Signature>` as its last child.
///
/// If `target` has no ID attribute one is generated (`ID="_<32 hex>"`) and
/// stays on the element even when signing fails later on.
pub fn sign_with_context(
    ctx: &DsigContext,
    doc: &mut XmlDocument,
    target: NodeId,
    key_name: &str,
    private_key_pem: &[u8],
    cert_pem: &[u8],
) -> Result<(), Error> {
    if !doc.contains(target) || !doc.is_element(target) {
        return Err(Error::MalformedSubtree("signature target must be an element".into()));
    }
    let key = load_private_key_pem(private_key_pem)?;
    let cert = load_certificate_pem(cert_pem)?;

    let id = ensure_id(ctx, doc, target)?;
    debug!(stage = "idle", node = doc.name(target), id = %id, "signing element");

    let nodes = build_signature(ctx, doc, target, &id, key_name, &cert)?;
    if let Err(e) = fill_signature(ctx, doc, target, &nodes, &key) {
        doc.detach(nodes.signature);
        warn!(stage = "failed", node = doc.name(target), error = %e, "signing failed");
        return Err(e);
    }
    debug!(stage = "done", node = doc.name(target), "element signed");
    Ok(())
}

/// Nodes of a freshly built signature that are filled in afterwards.
struct SignatureNodes {
    signature: NodeId,
    signed_info: NodeId,
    digest_value: NodeId,
    signature_value: NodeId,
}

/// Return the identifier of `target`, generating one when absent.
fn ensure_id(ctx: &DsigContext, doc: &mut XmlDocument, target: NodeId) -> Result<String, Error> {
    let names = ctx.id_attr_names();
    if let Some(existing) = doc.id_of(target, &names) {
        let id = existing.to_owned();
        let shared = doc
            .elements_with_id(&names, &id)
            .into_iter()
            .any(|other| other != target);
        if shared {
            return Err(Error::MalformedReference(format!(
                "identifier \"{id}\" is carried by more than one element"
            )));
        }
        return Ok(id);
    }

    let id = generate_id();
    doc.set_attribute(target, GENERATED_ID_ATTR, &id)?;
    Ok(id)
}

/// `_` followed by 128 random bits in hex; the underscore keeps it an NCName.
fn generate_id() -> String {
    let bytes: [u8; 16] = rand::random();
    let mut id = String::with_capacity(33);
    id.push('_');
    for b in bytes {
        id.push_str(&format!("{b:02x}"));
    }
    id
}

fn ds(local: &str) -> String {
    format!("{}:{local}", ns::DSIG_PREFIX)
}

fn add_inclusive_namespaces(doc: &mut XmlDocument, parent: NodeId, prefixes: &[String]) -> Result<(), Error> {
    if prefixes.is_empty() {
        return Ok(());
    }
    let name = format!("{}:{}", ns::EXC_C14N_PREFIX, ns::node::INCLUSIVE_NAMESPACES);
    let inc = doc.add_element(parent, &name)?;
    doc.declare_namespace(inc, ns::EXC_C14N_PREFIX, ns::EXC_C14N)?;
    doc.set_attribute(inc, ns::attr::PREFIX_LIST, &prefixes.join(" "))
}

fn build_signature(
    ctx: &DsigContext,
    doc: &mut XmlDocument,
    target: NodeId,
    id: &str,
    key_name: &str,
    cert: &Certificate,
) -> Result<SignatureNodes, Error> {
    let exclusive_prefixes: &[String] = if ctx.c14n_mode.is_exclusive() {
        &ctx.inclusive_prefixes
    } else {
        &[]
    };

    let signature = doc.create_element(&ds(ns::node::SIGNATURE));
    doc.declare_namespace(signature, ns::DSIG_PREFIX, ns::DSIG)?;

    let signed_info = doc.add_element(signature, &ds(ns::node::SIGNED_INFO))?;
    let c14n = doc.add_element(signed_info, &ds(ns::node::CANONICALIZATION_METHOD))?;
    doc.set_attribute(c14n, ns::attr::ALGORITHM, ctx.c14n_mode.uri())?;
    add_inclusive_namespaces(doc, c14n, exclusive_prefixes)?;
    let method = doc.add_element(signed_info, &ds(ns::node::SIGNATURE_METHOD))?;
    doc.set_attribute(method, ns::attr::ALGORITHM, ctx.signature_method.uri())?;

    let reference = doc.add_element(signed_info, &ds(ns::node::REFERENCE))?;
    doc.set_attribute(reference, ns::attr::URI, &format!("#{id}"))?;
    let transforms = doc.add_element(reference, &ds(ns::node::TRANSFORMS))?;
    let enveloped = doc.add_element(transforms, &ds(ns::node::TRANSFORM))?;
    doc.set_attribute(enveloped, ns::attr::ALGORITHM, algorithm::ENVELOPED_SIGNATURE)?;
    let c14n_transform = doc.add_element(transforms, &ds(ns::node::TRANSFORM))?;
    doc.set_attribute(c14n_transform, ns::attr::ALGORITHM, ctx.c14n_mode.uri())?;
    add_inclusive_namespaces(doc, c14n_transform, exclusive_prefixes)?;
    let digest_method = doc.add_element(reference, &ds(ns::node::DIGEST_METHOD))?;
    doc.set_attribute(digest_method, ns::attr::ALGORITHM, ctx.digest_method.uri())?;
    let digest_value = doc.add_element(reference, &ds(ns::node::DIGEST_VALUE))?;

    let signature_value = doc.add_element(signature, &ds(ns::node::SIGNATURE_VALUE))?;

    let with_name = ctx.key_name_in_key_info && !key_name.is_empty();
    if with_name || ctx.embed_certificate {
        let key_info = doc.add_element(signature, &ds(ns::node::KEY_INFO))?;
        if with_name {
            let name = doc.add_element(key_info, &ds(ns::node::KEY_NAME))?;
            doc.set_content(name, key_name)?;
        }
        if ctx.embed_certificate {
            use base64::Engine;
            let engine = base64::engine::general_purpose::STANDARD;
            let data = doc.add_element(key_info, &ds(ns::node::X509_DATA))?;
            let cert_node = doc.add_element(data, &ds(ns::node::X509_CERTIFICATE))?;
            doc.set_content(cert_node, &engine.encode(cert.der()))?;
        }
    }

    doc.append_child(target, signature)?;
    Ok(SignatureNodes {
        signature,
        signed_info,
        digest_value,
        signature_value,
    })
}

fn fill_signature(
    ctx: &DsigContext,
    doc: &mut XmlDocument,
    target: NodeId,
    nodes: &SignatureNodes,
    key: &PrivateKey,
) -> Result<(), Error> {
    use base64::Engine;
    let engine = base64::engine::general_purpose::STANDARD;

    let prefixes = if ctx.c14n_mode.is_exclusive() {
        ctx.inclusive_prefixes.clone()
    } else {
        Vec::new()
    };
    let options = C14nOptions::new(ctx.c14n_mode).with_inclusive_prefixes(prefixes);
    let mut reference_options = options.clone().excluding(nodes.signature);
    reference_options.mode = ctx.c14n_mode.without_comments();

    debug!(stage = "canonicalizing", node = doc.name(target), algorithm = ctx.c14n_mode.uri());
    let canonical = canonicalize_node(doc, target, &reference_options)?;

    debug!(stage = "digesting", algorithm = ctx.digest_method.uri(), bytes = canonical.len());
    let digest = ctx.digest_method.digest(&canonical);
    doc.set_content(nodes.digest_value, &engine.encode(digest))?;

    let signed_info = canonicalize_node(doc, nodes.signed_info, &options)?;
    debug!(stage = "signing", algorithm = ctx.signature_method.uri());
    let signed_info_digest = ctx.signature_method.digest_method().digest(&signed_info);
    let signature = ctx.signature_method.sign(&signed_info_digest, key.rsa())?;
    doc.set_content(nodes.signature_value, &engine.encode(signature))
}
