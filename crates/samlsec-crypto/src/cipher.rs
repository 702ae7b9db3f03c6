#![forbid(unsafe_code)]

//! Content encryption algorithms (AES-CBC, AES-GCM).
//!
//! Cipher data follows the XML Encryption layout: the IV (16 bytes for CBC)
//! or nonce (12 bytes for GCM) is prepended to the cipher text, and the GCM
//! tag is appended.

use rand::RngCore;
use samlsec_core::{algorithm, Error};
use zeroize::Zeroizing;

const CBC_IV_LEN: usize = 16;
const GCM_NONCE_LEN: usize = 12;
const GCM_TAG_LEN: usize = 16;

/// A block cipher algorithm identified by its XML-Enc URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CipherMethod {
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
    Aes128Gcm,
    Aes192Gcm,
    #[default]
    Aes256Gcm,
}

impl CipherMethod {
    pub fn from_uri(uri: &str) -> Result<Self, Error> {
        match uri {
            algorithm::AES128_CBC => Ok(Self::Aes128Cbc),
            algorithm::AES192_CBC => Ok(Self::Aes192Cbc),
            algorithm::AES256_CBC => Ok(Self::Aes256Cbc),
            algorithm::AES128_GCM => Ok(Self::Aes128Gcm),
            algorithm::AES192_GCM => Ok(Self::Aes192Gcm),
            algorithm::AES256_GCM => Ok(Self::Aes256Gcm),
            _ => Err(Error::UnsupportedAlgorithm(format!("cipher: {uri}"))),
        }
    }

    pub fn uri(&self) -> &'static str {
        match self {
            Self::Aes128Cbc => algorithm::AES128_CBC,
            Self::Aes192Cbc => algorithm::AES192_CBC,
            Self::Aes256Cbc => algorithm::AES256_CBC,
            Self::Aes128Gcm => algorithm::AES128_GCM,
            Self::Aes192Gcm => algorithm::AES192_GCM,
            Self::Aes256Gcm => algorithm::AES256_GCM,
        }
    }

    /// Key size in bytes.
    pub fn key_size(&self) -> usize {
        match self {
            Self::Aes128Cbc | Self::Aes128Gcm => 16,
            Self::Aes192Cbc | Self::Aes192Gcm => 24,
            Self::Aes256Cbc | Self::Aes256Gcm => 32,
        }
    }

    pub fn is_aead(&self) -> bool {
        matches!(self, Self::Aes128Gcm | Self::Aes192Gcm | Self::Aes256Gcm)
    }

    /// Generate a random session key of the right size.
    pub fn generate_key(&self) -> Zeroizing<Vec<u8>> {
        let mut key = Zeroizing::new(vec![0u8; self.key_size()]);
        rand::thread_rng().fill_bytes(&mut key);
        key
    }

    fn check_key(&self, key: &[u8]) -> Result<(), Error> {
        if key.len() != self.key_size() {
            return Err(Error::InvalidKey(format!(
                "{} expects a {} byte key, got {}",
                self.uri(),
                self.key_size(),
                key.len()
            )));
        }
        Ok(())
    }

    /// Encrypt `plaintext`, returning IV/nonce followed by the cipher text.
    pub fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        self.check_key(key)?;
        if self.is_aead() {
            gcm_encrypt(key, plaintext)
        } else {
            cbc_encrypt(key, plaintext)
        }
    }

    /// Decrypt cipher data produced by [`encrypt`](Self::encrypt) or any
    /// conforming XML Encryption implementation.
    ///
    /// Bad padding, a failed GCM tag check or truncated input all yield
    /// [`Error::CipherTextCorrupt`].
    pub fn decrypt(&self, key: &[u8], data: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
        self.check_key(key)?;
        if self.is_aead() {
            gcm_decrypt(key, data)
        } else {
            cbc_decrypt(key, data)
        }
    }
}

// ── AES-CBC ──────────────────────────────────────────────────────────

fn cbc_encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
    use cbc::cipher::{block_padding::NoPadding, BlockEncryptMut, KeyIvInit};

    let mut iv = [0u8; CBC_IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let mut buf = pad(plaintext, CBC_IV_LEN);
    let len = buf.len();

    macro_rules! run {
        ($aes:ty) => {{
            cbc::Encryptor::<$aes>::new_from_slices(key, &iv)
                .map_err(|e| Error::InvalidKey(format!("AES-CBC init: {e}")))?
                .encrypt_padded_mut::<NoPadding>(&mut buf, len)
                .map_err(|e| Error::InvalidKey(format!("AES-CBC encrypt: {e}")))?;
        }};
    }
    match key.len() {
        16 => run!(aes::Aes128),
        24 => run!(aes::Aes192),
        _ => run!(aes::Aes256),
    }

    let mut out = Vec::with_capacity(CBC_IV_LEN + buf.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&buf);
    Ok(out)
}

fn cbc_decrypt(key: &[u8], data: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
    use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};

    if data.len() < 2 * CBC_IV_LEN || data.len() % CBC_IV_LEN != 0 {
        return Err(Error::CipherTextCorrupt(format!(
            "AES-CBC data length {} is not a positive multiple of the block size",
            data.len()
        )));
    }
    let (iv, ciphertext) = data.split_at(CBC_IV_LEN);
    let mut buf = Zeroizing::new(ciphertext.to_vec());

    macro_rules! run {
        ($aes:ty) => {{
            cbc::Decryptor::<$aes>::new_from_slices(key, iv)
                .map_err(|e| Error::InvalidKey(format!("AES-CBC init: {e}")))?
                .decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(|e| Error::CipherTextCorrupt(format!("AES-CBC decrypt: {e}")))?;
        }};
    }
    match key.len() {
        16 => run!(aes::Aes128),
        24 => run!(aes::Aes192),
        _ => run!(aes::Aes256),
    }

    let plain_len = unpad(&buf, CBC_IV_LEN)?;
    buf.truncate(plain_len);
    Ok(buf)
}

/// PKCS#7 padding; always adds between 1 and `block` bytes.
fn pad(data: &[u8], block: usize) -> Vec<u8> {
    let pad_len = block - (data.len() % block);
    let mut padded = Vec::with_capacity(data.len() + pad_len);
    padded.extend_from_slice(data);
    padded.resize(data.len() + pad_len, pad_len as u8);
    padded
}

/// Length of the plaintext once XML Encryption padding is removed.
///
/// Only the last byte is significant: XML Encryption allows arbitrary
/// filler bytes (ISO 10126), so PKCS#7 content is not checked.
fn unpad(data: &[u8], block: usize) -> Result<usize, Error> {
    let Some(&last) = data.last() else {
        return Err(Error::CipherTextCorrupt("empty AES-CBC plaintext".into()));
    };
    let pad_len = last as usize;
    if pad_len == 0 || pad_len > block || pad_len > data.len() {
        return Err(Error::CipherTextCorrupt("invalid padding".into()));
    }
    Ok(data.len() - pad_len)
}

// ── AES-GCM ──────────────────────────────────────────────────────────

type Aes192Gcm = aes_gcm::AesGcm<aes::Aes192, aes_gcm::aead::consts::U12>;

fn gcm_encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
    use aes_gcm::aead::{Aead, KeyInit};
    use aes_gcm::Nonce;

    let mut nonce_bytes = [0u8; GCM_NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    macro_rules! run {
        ($cipher:ty) => {
            <$cipher>::new_from_slice(key)
                .map_err(|e| Error::InvalidKey(format!("AES-GCM init: {e}")))?
                .encrypt(nonce, plaintext)
                .map_err(|e| Error::InvalidKey(format!("AES-GCM encrypt: {e}")))?
        };
    }
    let ct = match key.len() {
        16 => run!(aes_gcm::Aes128Gcm),
        24 => run!(Aes192Gcm),
        _ => run!(aes_gcm::Aes256Gcm),
    };

    let mut out = Vec::with_capacity(GCM_NONCE_LEN + ct.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ct);
    Ok(out)
}

fn gcm_decrypt(key: &[u8], data: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
    use aes_gcm::aead::{Aead, KeyInit};
    use aes_gcm::Nonce;

    if data.len() < GCM_NONCE_LEN + GCM_TAG_LEN {
        return Err(Error::CipherTextCorrupt(format!(
            "AES-GCM data is {} bytes, shorter than nonce and tag",
            data.len()
        )));
    }
    let (nonce, ct_and_tag) = data.split_at(GCM_NONCE_LEN);
    let nonce = Nonce::from_slice(nonce);

    macro_rules! run {
        ($cipher:ty) => {
            <$cipher>::new_from_slice(key)
                .map_err(|e| Error::InvalidKey(format!("AES-GCM init: {e}")))?
                .decrypt(nonce, ct_and_tag)
                .map_err(|_| Error::CipherTextCorrupt("AES-GCM authentication failed".into()))?
        };
    }
    let plain = match key.len() {
        16 => run!(aes_gcm::Aes128Gcm),
        24 => run!(Aes192Gcm),
        _ => run!(aes_gcm::Aes256Gcm),
    };
    Ok(Zeroizing::new(plain))
}
