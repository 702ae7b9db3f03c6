#![forbid(unsafe_code)]

//! DSig context: algorithm choices and identifier handling.

use samlsec_c14n::C14nMode;
use samlsec_core::ns;
use samlsec_crypto::{DigestMethod, SignatureMethod};

/// Configuration for signature creation and verification.
#[derive(Debug, Clone)]
pub struct DsigContext {
    /// Canonicalization used for SignedInfo and the reference transform.
    pub c14n_mode: C14nMode,
    /// InclusiveNamespaces PrefixList written when `c14n_mode` is exclusive.
    pub inclusive_prefixes: Vec<String>,
    pub signature_method: SignatureMethod,
    pub digest_method: DigestMethod,
    /// Extra identifier attribute names, tried after `ID`, `Id` and `id`.
    pub id_attrs: Vec<String>,
    /// Write the signer certificate into `KeyInfo/X509Data`.
    pub embed_certificate: bool,
    /// Write the key name into `KeyInfo/KeyName`.
    pub key_name_in_key_info: bool,
}

impl Default for DsigContext {
    fn default() -> Self {
        Self {
            c14n_mode: C14nMode::Exclusive,
            inclusive_prefixes: Vec::new(),
            signature_method: SignatureMethod::RsaSha256,
            digest_method: DigestMethod::Sha256,
            id_attrs: Vec::new(),
            embed_certificate: true,
            key_name_in_key_info: true,
        }
    }
}

impl DsigContext {
    /// Add an ID attribute name to recognise during processing.
    pub fn add_id_attr(&mut self, name: &str) {
        self.id_attrs.push(name.to_owned());
    }

    /// All identifier attribute names, in priority order.
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

    #[test]
    fn test_defaults() {
        let ctx = DsigContext::default();
        assert_eq!(ctx.c14n_mode, C14nMode::Exclusive);
        assert_eq!(ctx.signature_method, SignatureMethod::RsaSha256);
        assert_eq!(ctx.digest_method, DigestMethod::Sha256);
        assert!(ctx.embed_certificate);
    }

    #[test]
    fn test_id_attr_names() {
        let mut ctx = DsigContext::default();
        ctx.add_id_attr("AssertionID");
        ctx.add_id_attr("Id");
        assert_eq!(ctx.id_attr_names(), ["ID", "Id", "id", "AssertionID"]);
    }
}
