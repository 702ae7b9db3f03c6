#![forbid(unsafe_code)]

//! RSA PKCS#1 v1.5 signatures.
//!
//! Signing and verification work on a digest the caller has already
//! computed (the XML-DSig engine hashes the canonical SignedInfo itself),
//! so the digest algorithm only selects the DigestInfo prefix.

use crate::digest::{dispatch_hash, DigestMethod};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use samlsec_core::{algorithm, Error};

/// An RSA signature algorithm identified by its XML-DSig URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignatureMethod {
    RsaSha1,
    RsaSha224,
    #[default]
    RsaSha256,
    RsaSha384,
    RsaSha512,
}

impl SignatureMethod {
    pub fn from_uri(uri: &str) -> Result<Self, Error> {
        match uri {
            algorithm::RSA_SHA1 => Ok(Self::RsaSha1),
            algorithm::RSA_SHA224 => Ok(Self::RsaSha224),
            algorithm::RSA_SHA256 => Ok(Self::RsaSha256),
            algorithm::RSA_SHA384 => Ok(Self::RsaSha384),
            algorithm::RSA_SHA512 => Ok(Self::RsaSha512),
            _ => Err(Error::UnsupportedAlgorithm(format!("signature algorithm: {uri}"))),
        }
    }

    pub fn uri(&self) -> &'static str {
        match self {
            Self::RsaSha1 => algorithm::RSA_SHA1,
            Self::RsaSha224 => algorithm::RSA_SHA224,
            Self::RsaSha256 => algorithm::RSA_SHA256,
            Self::RsaSha384 => algorithm::RSA_SHA384,
            Self::RsaSha512 => algorithm::RSA_SHA512,
        }
    }

    /// The hash this signature algorithm is defined over.
    pub fn digest_method(&self) -> DigestMethod {
        match self {
            Self::RsaSha1 => DigestMethod::Sha1,
            Self::RsaSha224 => DigestMethod::Sha224,
            Self::RsaSha256 => DigestMethod::Sha256,
            Self::RsaSha384 => DigestMethod::Sha384,
            Self::RsaSha512 => DigestMethod::Sha512,
        }
    }

    /// Sign a precomputed digest.
    pub fn sign(&self, digest: &[u8], key: &RsaPrivateKey) -> Result<Vec<u8>, Error> {
        let expected = self.digest_method().output_len();
        if digest.len() != expected {
            return Err(Error::InvalidKey(format!(
                "digest is {} bytes, {} expects {expected}",
                digest.len(),
                self.uri()
            )));
        }
        dispatch_hash!(self.digest_method(), H => key.sign(Pkcs1v15Sign::new::<H>(), digest))
            .map_err(|e| Error::InvalidKey(format!("RSA PKCS#1 v1.5 sign: {e}")))
    }

    /// Verify `signature` over a precomputed digest.
    ///
    /// A signature that does not match, including one of the wrong length,
    /// yields `Ok(false)`.
    pub fn verify(&self, signature: &[u8], digest: &[u8], key: &RsaPublicKey) -> Result<bool, Error> {
        let result = dispatch_hash!(
            self.digest_method(),
            H => key.verify(Pkcs1v15Sign::new::<H>(), digest, signature)
        );
        Ok(result.is_ok())
    }
}
