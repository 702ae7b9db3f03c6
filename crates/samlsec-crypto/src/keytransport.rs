#![forbid(unsafe_code)]

//! RSA key transport (PKCS#1 v1.5 and RSA-OAEP).

use crate::digest::{dispatch_hash, DigestMethod};
use rsa::{Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use samlsec_core::{algorithm, Error};
use zeroize::Zeroizing;

/// RSA-OAEP parameters carried by `<EncryptionMethod>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OaepParams {
    /// `ds:DigestMethod`; SHA-1 when absent.
    pub digest: DigestMethod,
    /// `xenc11:MGF`; when absent, SHA-1 for `rsa-oaep-mgf1p` and the
    /// OAEP digest for `rsa-oaep`.
    pub mgf: Option<DigestMethod>,
    /// Decoded `xenc:OAEPparams` label.
    pub label: Option<Vec<u8>>,
}

impl OaepParams {
    /// Parameters with SHA-1 digest and no label.
    pub fn sha1() -> Self {
        Self {
            digest: DigestMethod::Sha1,
            mgf: None,
            label: None,
        }
    }
}

impl Default for OaepParams {
    fn default() -> Self {
        Self::sha1()
    }
}

/// Resolve an `xenc11:MGF` algorithm URI to its hash.
pub fn mgf_from_uri(uri: &str) -> Result<DigestMethod, Error> {
    match uri {
        algorithm::MGF1_SHA1 => Ok(DigestMethod::Sha1),
        algorithm::MGF1_SHA224 => Ok(DigestMethod::Sha224),
        algorithm::MGF1_SHA256 => Ok(DigestMethod::Sha256),
        algorithm::MGF1_SHA384 => Ok(DigestMethod::Sha384),
        algorithm::MGF1_SHA512 => Ok(DigestMethod::Sha512),
        _ => Err(Error::UnsupportedAlgorithm(format!("MGF: {uri}"))),
    }
}

pub fn mgf_uri(mgf: DigestMethod) -> &'static str {
    match mgf {
        DigestMethod::Sha1 => algorithm::MGF1_SHA1,
        DigestMethod::Sha224 => algorithm::MGF1_SHA224,
        DigestMethod::Sha256 => algorithm::MGF1_SHA256,
        DigestMethod::Sha384 => algorithm::MGF1_SHA384,
        DigestMethod::Sha512 => algorithm::MGF1_SHA512,
    }
}

/// A key transport algorithm identified by its XML-Enc URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyTransportMethod {
    /// `xmlenc#rsa-1_5`
    RsaPkcs1,
    /// `xmlenc#rsa-oaep-mgf1p`
    RsaOaepMgf1p(OaepParams),
    /// `xmlenc11#rsa-oaep`
    RsaOaep(OaepParams),
}

impl Default for KeyTransportMethod {
    fn default() -> Self {
        Self::RsaOaepMgf1p(OaepParams::sha1())
    }
}

impl KeyTransportMethod {
    /// Resolve `uri`, attaching `params` to the OAEP variants.
    pub fn from_uri(uri: &str, params: OaepParams) -> Result<Self, Error> {
        match uri {
            algorithm::RSA_PKCS1 => Ok(Self::RsaPkcs1),
            algorithm::RSA_OAEP => Ok(Self::RsaOaepMgf1p(params)),
            algorithm::RSA_OAEP_ENC11 => Ok(Self::RsaOaep(params)),
            _ => Err(Error::UnsupportedAlgorithm(format!("key transport: {uri}"))),
        }
    }

    pub fn uri(&self) -> &'static str {
        match self {
            Self::RsaPkcs1 => algorithm::RSA_PKCS1,
            Self::RsaOaepMgf1p(_) => algorithm::RSA_OAEP,
            Self::RsaOaep(_) => algorithm::RSA_OAEP_ENC11,
        }
    }

    pub fn oaep_params(&self) -> Option<&OaepParams> {
        match self {
            Self::RsaPkcs1 => None,
            Self::RsaOaepMgf1p(p) | Self::RsaOaep(p) => Some(p),
        }
    }

    /// The (digest, MGF) hash pair used for OAEP padding.
    fn oaep_hashes(&self, params: &OaepParams) -> (DigestMethod, DigestMethod) {
        let mgf = match (self, params.mgf) {
            (_, Some(explicit)) => explicit,
            (Self::RsaOaep(_), None) => params.digest,
            _ => DigestMethod::Sha1,
        };
        (params.digest, mgf)
    }

    /// Encrypt a session key to `public_key`.
    pub fn encrypt(&self, public_key: &RsaPublicKey, key_data: &[u8]) -> Result<Vec<u8>, Error> {
        let mut rng = rand::thread_rng();
        let result = match self.oaep_params() {
            None => public_key.encrypt(&mut rng, Pkcs1v15Encrypt, key_data),
            Some(params) => {
                let (digest, mgf) = self.oaep_hashes(params);
                let padding = oaep_padding(digest, mgf, params.label.as_deref());
                public_key.encrypt(&mut rng, padding, key_data)
            }
        };
        result.map_err(|e| Error::InvalidKey(format!("{} encrypt: {e}", self.uri())))
    }

    /// Recover a session key. Any padding failure is [`Error::KeyUnwrapFailed`].
    pub fn decrypt(&self, private_key: &RsaPrivateKey, encrypted: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
        let result = match self.oaep_params() {
            None => private_key.decrypt(Pkcs1v15Encrypt, encrypted),
            Some(params) => {
                let (digest, mgf) = self.oaep_hashes(params);
                let padding = oaep_padding(digest, mgf, params.label.as_deref());
                private_key.decrypt(padding, encrypted)
            }
        };
        result
            .map(Zeroizing::new)
            .map_err(|e| Error::KeyUnwrapFailed(format!("{} decrypt: {e}", self.uri())))
    }
}

fn oaep_padding(digest: DigestMethod, mgf: DigestMethod, label: Option<&[u8]>) -> Oaep {
    let mut padding = dispatch_hash!(digest, D => dispatch_hash!(mgf, M => Oaep::new_with_mgf_hash::<D, M>()));
    if let Some(label) = label {
        padding.label = Some(String::from_utf8_lossy(label).into_owned());
    }
    padding
}
