#![forbid(unsafe_code)]

//! Digest (hash) algorithms.

use digest::Digest;
use samlsec_core::{algorithm, Error};

/// A digest algorithm identified by its XML-DSig URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DigestMethod {
    Sha1,
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

/// Run `$body` with `$h` bound to the hash type of `$method`.
macro_rules! dispatch_hash {
    ($method:expr, $h:ident => $body:expr) => {
        match $method {
            $crate::digest::DigestMethod::Sha1 => {
                type $h = sha1::Sha1;
                $body
            }
            $crate::digest::DigestMethod::Sha224 => {
                type $h = sha2::Sha224;
                $body
            }
            $crate::digest::DigestMethod::Sha256 => {
                type $h = sha2::Sha256;
                $body
            }
            $crate::digest::DigestMethod::Sha384 => {
                type $h = sha2::Sha384;
                $body
            }
            $crate::digest::DigestMethod::Sha512 => {
                type $h = sha2::Sha512;
                $body
            }
        }
    };
}
pub(crate) use dispatch_hash;

impl DigestMethod {
    pub fn from_uri(uri: &str) -> Result<Self, Error> {
        match uri {
            algorithm::SHA1 => Ok(Self::Sha1),
            algorithm::SHA224 => Ok(Self::Sha224),
            algorithm::SHA256 => Ok(Self::Sha256),
            algorithm::SHA384 => Ok(Self::Sha384),
            algorithm::SHA512 => Ok(Self::Sha512),
            _ => Err(Error::UnsupportedAlgorithm(format!("digest algorithm: {uri}"))),
        }
    }

    pub fn uri(&self) -> &'static str {
        match self {
            Self::Sha1 => algorithm::SHA1,
            Self::Sha224 => algorithm::SHA224,
            Self::Sha256 => algorithm::SHA256,
            Self::Sha384 => algorithm::SHA384,
            Self::Sha512 => algorithm::SHA512,
        }
    }

    /// Output length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Hash `data` in one shot.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        dispatch_hash!(self, H => H::digest(data).to_vec())
    }
}

/// Compare two byte strings without short-circuiting on the first difference.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn test_sha256() {
        let result = DigestMethod::Sha256.digest(b"hello");
        assert_eq!(
            hex(&result),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_sha1() {
        let result = DigestMethod::Sha1.digest(b"hello");
        assert_eq!(hex(&result), "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
    }

    #[test]
    fn test_output_lengths_match() {
        for m in [
            DigestMethod::Sha1,
            DigestMethod::Sha224,
            DigestMethod::Sha256,
            DigestMethod::Sha384,
            DigestMethod::Sha512,
        ] {
            assert_eq!(m.digest(b"x").len(), m.output_len());
            assert_eq!(DigestMethod::from_uri(m.uri()).unwrap(), m);
        }
    }

    #[test]
    fn test_unknown_uri() {
        let err = DigestMethod::from_uri("http://www.w3.org/2001/04/xmldsig-more#md5").unwrap_err();
        assert!(matches!(err, Error::UnsupportedAlgorithm(_)));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
