#![forbid(unsafe_code)]

//! Loading keys and certificates from PEM and DER.

use crate::key::{Certificate, KeyMaterial, PrivateKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use samlsec_core::Error;
use std::path::Path;

/// Smallest RSA modulus accepted for private keys.
pub const MIN_RSA_BITS: usize = 1024;

fn pem_str(data: &[u8]) -> Result<&str, Error> {
    std::str::from_utf8(data)
        .map(str::trim)
        .map_err(|e| Error::InvalidKey(format!("invalid PEM encoding: {e}")))
}

fn checked(pk: RsaPrivateKey) -> Result<PrivateKey, Error> {
    let key = PrivateKey::new(pk);
    if key.bits() < MIN_RSA_BITS {
        return Err(Error::InvalidKey(format!(
            "RSA key is {} bits, at least {MIN_RSA_BITS} required",
            key.bits()
        )));
    }
    Ok(key)
}

/// Load an RSA private key from PEM data (PKCS#8, then PKCS#1).
pub fn load_private_key_pem(pem_data: &[u8]) -> Result<PrivateKey, Error> {
    use pkcs1::DecodeRsaPrivateKey;
    use pkcs8::DecodePrivateKey;

    let pem = pem_str(pem_data)?;
    if let Ok(pk) = RsaPrivateKey::from_pkcs8_pem(pem) {
        return checked(pk);
    }
    let pk = RsaPrivateKey::from_pkcs1_pem(pem)
        .map_err(|e| Error::InvalidKey(format!("failed to parse RSA private key PEM: {e}")))?;
    checked(pk)
}

fn load_private_key_der(der: &[u8]) -> Result<PrivateKey, Error> {
    use pkcs1::DecodeRsaPrivateKey;
    use pkcs8::DecodePrivateKey;

    if let Ok(pk) = RsaPrivateKey::from_pkcs8_der(der) {
        return checked(pk);
    }
    let pk = RsaPrivateKey::from_pkcs1_der(der)
        .map_err(|e| Error::InvalidKey(format!("failed to parse RSA private key DER: {e}")))?;
    checked(pk)
}

/// Load an X.509 certificate from PEM data.
pub fn load_certificate_pem(pem_data: &[u8]) -> Result<Certificate, Error> {
    let pem = std::str::from_utf8(pem_data)
        .map_err(|e| Error::InvalidCertificate(format!("invalid PEM encoding: {e}")))?;

    let (label, der_bytes) = pem_rfc7468::decode_vec(pem.trim().as_bytes())
        .map_err(|e| Error::InvalidCertificate(format!("failed to decode certificate PEM: {e}")))?;
    if label != "CERTIFICATE" {
        return Err(Error::InvalidCertificate(format!(
            "expected CERTIFICATE PEM label, got: {label}"
        )));
    }
    load_certificate_der(&der_bytes)
}

/// Load an X.509 certificate from DER data.
pub fn load_certificate_der(data: &[u8]) -> Result<Certificate, Error> {
    Certificate::from_der(data)
}

/// Load an RSA public key from a certificate, SPKI (`PUBLIC KEY`) or
/// PKCS#1 (`RSA PUBLIC KEY`) PEM block.
pub fn load_public_key_pem(pem_data: &[u8]) -> Result<RsaPublicKey, Error> {
    use pkcs1::DecodeRsaPublicKey;
    use spki::DecodePublicKey;

    let pem = pem_str(pem_data)?;
    let (label, der_bytes) = pem_rfc7468::decode_vec(pem.as_bytes())
        .map_err(|e| Error::InvalidKey(format!("failed to decode public key PEM: {e}")))?;
    match label {
        "CERTIFICATE" => load_certificate_der(&der_bytes)?.rsa_public_key(),
        "PUBLIC KEY" => RsaPublicKey::from_public_key_der(&der_bytes)
            .map_err(|e| Error::InvalidKey(format!("failed to parse SPKI public key: {e}"))),
        "RSA PUBLIC KEY" => RsaPublicKey::from_pkcs1_der(&der_bytes)
            .map_err(|e| Error::InvalidKey(format!("failed to parse PKCS#1 public key: {e}"))),
        other => Err(Error::InvalidKey(format!("unexpected PEM label for a public key: {other}"))),
    }
}

/// Load key material from a file, detecting PEM labels or DER structures.
pub fn load_key_file(path: &Path) -> Result<KeyMaterial, Error> {
    let data = std::fs::read(path)?;

    let material = if data.starts_with(b"-----BEGIN") {
        let pem = pem_str(&data)?;
        let (label, _) = pem_rfc7468::decode_vec(pem.as_bytes())
            .map_err(|e| Error::InvalidKey(format!("failed to decode PEM in {}: {e}", path.display())))?;
        match label {
            "CERTIFICATE" => KeyMaterial::Certificate(load_certificate_pem(&data)?),
            "PRIVATE KEY" | "RSA PRIVATE KEY" => KeyMaterial::Private(load_private_key_pem(&data)?),
            _ => KeyMaterial::Public(load_public_key_pem(&data)?),
        }
    } else if let Ok(cert) = load_certificate_der(&data) {
        KeyMaterial::Certificate(cert)
    } else if let Ok(key) = load_private_key_der(&data) {
        KeyMaterial::Private(key)
    } else {
        use spki::DecodePublicKey;
        let public = RsaPublicKey::from_public_key_der(&data).map_err(|_| {
            Error::InvalidKey(format!("unable to detect key format of {}", path.display()))
        })?;
        KeyMaterial::Public(public)
    };

    tracing::debug!(path = %path.display(), key = %material.describe(), "loaded key file");
    Ok(material)
}
