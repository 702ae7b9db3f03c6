#![forbid(unsafe_code)]

//! Cryptographic algorithms needed by XML-DSig and XML-Enc.
//!
//! Every algorithm family is a closed enum resolved once from its URI:
//! digests, RSA PKCS#1 v1.5 signatures over a precomputed digest, AES-CBC
//! and AES-GCM content ciphers, and RSA key transport.

pub mod cipher;
pub mod digest;
pub mod keytransport;
pub mod sign;

pub use cipher::CipherMethod;
pub use digest::{constant_time_eq, DigestMethod};
pub use keytransport::{KeyTransportMethod, OaepParams};
pub use sign::SignatureMethod;
