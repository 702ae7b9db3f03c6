#![forbid(unsafe_code)]

//! Encryption context: algorithm choices and identifier handling.

use samlsec_core::ns;
use samlsec_crypto::{CipherMethod, KeyTransportMethod};

/// Context for XML-Enc operations.
///
/// `cipher` and `key_transport` only apply to encryption; decryption always
/// follows the algorithms declared in the document.
#[derive(Debug, Clone, Default)]
pub struct EncContext {
    /// Block cipher for the content (default AES-256-GCM).
    pub cipher: CipherMethod,
    /// Key transport for the session key (default RSA-OAEP, MGF1 with SHA-1).
    pub key_transport: KeyTransportMethod,
    /// Extra identifier attribute names for `RetrievalMethod` resolution.
    pub id_attrs: Vec<String>,
}

impl EncContext {
    pub fn new(cipher: CipherMethod, key_transport: KeyTransportMethod) -> Self {
        Self {
            cipher,
            key_transport,
            id_attrs: Vec::new(),
        }
    }

    pub fn add_id_attr(&mut self, name: &str) {
        self.id_attrs.push(name.to_owned());
    }

    pub fn id_attr_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = ns::DEFAULT_ID_ATTRS.to_vec();
        for extra in &self.id_attrs {
            if !names.contains(&extra.as_str()) {
                names.push(extra);
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use samlsec_crypto::OaepParams;

    #[test]
    fn test_defaults() {
        let ctx = EncContext::default();
        assert_eq!(ctx.cipher, CipherMethod::Aes256Gcm);
        assert_eq!(ctx.key_transport, KeyTransportMethod::RsaOaepMgf1p(OaepParams::sha1()));
        assert_eq!(ctx.id_attr_names(), ["ID", "Id", "id"]);
    }
}
