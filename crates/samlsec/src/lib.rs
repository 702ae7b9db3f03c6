#![forbid(unsafe_code)]

//! Pure Rust XML Security for SAML.
//!
//! Signs and verifies enveloped XML-DSig signatures, decrypts (and
//! encrypts) XML-Enc elements, and canonicalizes subtrees, all on the
//! mutable [`XmlDocument`] tree.

pub use samlsec_c14n as c14n;
pub use samlsec_core as core;
pub use samlsec_crypto as crypto;
pub use samlsec_dsig as dsig;
pub use samlsec_enc as enc;
pub use samlsec_keys as keys;
pub use samlsec_xml as xml;

pub use samlsec_core::{Error, Result};
pub use samlsec_dsig::{sign, verify_signature, DsigContext};
pub use samlsec_enc::{decrypt, encrypt_element, EncContext};
pub use samlsec_xml::{NodeId, XmlDocument};
