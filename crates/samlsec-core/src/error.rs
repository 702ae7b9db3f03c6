#![forbid(unsafe_code)]

/// Errors produced by the samlsec XML Security crates.
///
/// A signature that is well formed but does not verify is *not* an error:
/// verification reports it as `Ok(false)`. Everything here is either a
/// structural problem with the input or a failure the caller must act on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("malformed XML subtree: {0}")]
    MalformedSubtree(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("signature not found: {0}")]
    SignatureNotFound(String),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("malformed reference: {0}")]
    MalformedReference(String),

    #[error("certificate does not carry a usable key: {0}")]
    CertificateMismatch(String),

    #[error("cannot decrypt XML due to empty decryption key")]
    EmptyKey,

    #[error("key unwrap failed: {0}")]
    KeyUnwrapFailed(String),

    #[error("cipher text corrupt: {0}")]
    CipherTextCorrupt(String),

    #[error("malformed encrypted data: {0}")]
    MalformedEncryptedData(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
