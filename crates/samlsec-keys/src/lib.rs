#![forbid(unsafe_code)]

//! Key and certificate handling for the samlsec XML Security crates.
//!
//! Only RSA material is supported. Keys are decoded per call from PEM (or
//! DER) bytes; nothing is cached. A certificate is used purely as a carrier
//! for its public key: no chain building or validity checks happen here.

pub mod key;
pub mod loader;

pub use key::{Certificate, KeyMaterial, PrivateKey};
pub use loader::{
    load_certificate_der, load_certificate_pem, load_key_file, load_private_key_pem,
    load_public_key_pem, MIN_RSA_BITS,
};
