#![forbid(unsafe_code)]

//! Key and certificate types.

use der::{Decode, Encode};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use samlsec_core::Error;
use spki::DecodePublicKey;
use std::fmt;

/// An RSA private key.
///
/// The `rsa` crate zeroizes the key components when the value is dropped.
/// `Debug` only reports the modulus size.
#[derive(Clone)]
pub struct PrivateKey {
    inner: RsaPrivateKey,
}

impl PrivateKey {
    pub fn new(inner: RsaPrivateKey) -> Self {
        Self { inner }
    }

    pub fn rsa(&self) -> &RsaPrivateKey {
        &self.inner
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.inner.to_public_key()
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.inner.size() * 8
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RSA private key ({} bits)", self.bits())
    }
}

/// A decoded X.509 certificate.
#[derive(Clone)]
pub struct Certificate {
    der: Vec<u8>,
    subject: String,
    spki_der: Vec<u8>,
}

impl Certificate {
    /// Decode a DER certificate.
    pub fn from_der(data: &[u8]) -> Result<Self, Error> {
        let cert = x509_cert::Certificate::from_der(data)
            .map_err(|e| Error::InvalidCertificate(format!("failed to parse X.509 certificate: {e}")))?;
        let tbs = &cert.tbs_certificate;
        let spki_der = tbs
            .subject_public_key_info
            .to_der()
            .map_err(|e| Error::InvalidCertificate(format!("failed to encode SPKI: {e}")))?;
        Ok(Self {
            der: data.to_vec(),
            subject: tbs.subject.to_string(),
            spki_der,
        })
    }

    /// The certificate as DER, exactly as it was loaded.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// RFC 4514 rendering of the subject name.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The RSA public key of the certificate.
    ///
    /// Fails with [`Error::CertificateMismatch`] when the subject key is not RSA.
    pub fn rsa_public_key(&self) -> Result<RsaPublicKey, Error> {
        RsaPublicKey::from_public_key_der(&self.spki_der).map_err(|e| {
            Error::CertificateMismatch(format!(
                "certificate '{}' does not carry an RSA public key: {e}",
                self.subject
            ))
        })
    }

    /// Whether `key` is the private half of this certificate's public key.
    pub fn matches(&self, key: &PrivateKey) -> bool {
        self.rsa_public_key()
            .map(|public| public == key.public_key())
            .unwrap_or(false)
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("der_len", &self.der.len())
            .finish()
    }
}

/// Whatever a key file turned out to contain.
#[derive(Debug, Clone)]
pub enum KeyMaterial {
    Private(PrivateKey),
    Certificate(Certificate),
    Public(RsaPublicKey),
}

impl KeyMaterial {
    /// The public key, derived from whichever form was loaded.
    pub fn public_key(&self) -> Result<RsaPublicKey, Error> {
        match self {
            Self::Private(k) => Ok(k.public_key()),
            Self::Certificate(c) => c.rsa_public_key(),
            Self::Public(p) => Ok(p.clone()),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Private(k) => format!("{k:?}"),
            Self::Certificate(c) => match c.rsa_public_key() {
                Ok(p) => format!("X.509 certificate '{}' (RSA {} bits)", c.subject(), p.size() * 8),
                Err(_) => format!("X.509 certificate '{}' (non-RSA key)", c.subject()),
            },
            Self::Public(p) => format!("RSA public key ({} bits)", p.size() * 8),
        }
    }
}
