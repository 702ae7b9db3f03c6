#![forbid(unsafe_code)]

//! XML Encryption (XML-Enc) implementation.
//!
//! Decrypts `<xenc:EncryptedData>` whose session key is transported by RSA
//! in an `<xenc:EncryptedKey>`, splicing the plaintext back into the tree,
//! and encrypts elements into that same shape.

pub mod context;
pub mod decrypt;
pub mod encrypt;
pub mod record;

pub use context::EncContext;
pub use decrypt::{decrypt, decrypt_with_context};
pub use encrypt::encrypt_element;
pub use record::{EncryptedDataRecord, EncryptedKeyRecord, EncryptedType};
