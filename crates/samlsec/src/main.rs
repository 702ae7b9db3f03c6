#![forbid(unsafe_code)]

//! samlsec CLI: sign, verify, encrypt and decrypt SAML documents.

use clap::{Parser, Subcommand, ValueEnum};
use samlsec::core::ns;
use samlsec::crypto::{CipherMethod, KeyTransportMethod, OaepParams};
use samlsec::{DsigContext, EncContext, Error, NodeId, XmlDocument};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "samlsec",
    about = "samlsec: XML Security for SAML (enveloped XML-DSig, XML-Enc, C14N)",
    version
)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign an element with an enveloped signature
    Sign {
        /// Input XML file
        file: PathBuf,

        /// Private key (PEM, PKCS#8 or PKCS#1)
        #[arg(short = 'k', long)]
        key: PathBuf,

        /// Signer certificate (PEM)
        #[arg(long)]
        cert: PathBuf,

        /// Name written to KeyInfo/KeyName
        #[arg(short = 'n', long = "key-name", default_value = "")]
        key_name: String,

        /// Local name of the element to sign (default: document element)
        #[arg(long)]
        node: Option<String>,

        /// Register additional ID attribute names
        #[arg(long = "id-attr")]
        id_attr: Vec<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify the enveloped signature of an element
    Verify {
        /// Input XML file
        file: PathBuf,

        /// Trusted signer certificate (PEM)
        #[arg(long)]
        cert: PathBuf,

        /// KeyName selecting among several signatures
        #[arg(short = 'n', long = "key-name", default_value = "")]
        key_name: String,

        /// Local name of the signed element (default: document element)
        #[arg(long)]
        node: Option<String>,

        /// Register additional ID attribute names
        #[arg(long = "id-attr")]
        id_attr: Vec<String>,
    },

    /// Decrypt an EncryptedData element in place
    Decrypt {
        /// Input XML file
        file: PathBuf,

        /// Private key (PEM, PKCS#8 or PKCS#1)
        #[arg(short = 'k', long)]
        key: PathBuf,

        /// Local name of the element to replace (default: first EncryptedData or its Encrypted* wrapper)
        #[arg(long)]
        node: Option<String>,

        /// Register additional ID attribute names
        #[arg(long = "id-attr")]
        id_attr: Vec<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Encrypt an element for a recipient certificate
    Encrypt {
        /// Input XML file
        file: PathBuf,

        /// Recipient certificate or RSA public key (PEM)
        #[arg(long)]
        cert: PathBuf,

        /// Local name of the element to encrypt (default: document element's first child element)
        #[arg(long)]
        node: Option<String>,

        /// Content encryption algorithm
        #[arg(long, value_enum, default_value_t = CipherArg::Aes256Gcm)]
        cipher: CipherArg,

        /// Session key transport algorithm
        #[arg(long, value_enum, default_value_t = TransportArg::RsaOaepMgf1p)]
        transport: TransportArg,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List supported algorithms, or describe a key file
    Info {
        /// Key or certificate file (PEM or DER, auto-detected)
        #[arg(short = 'k', long)]
        key: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CipherArg {
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
    Aes128Gcm,
    Aes192Gcm,
    Aes256Gcm,
}

impl From<CipherArg> for CipherMethod {
    fn from(arg: CipherArg) -> Self {
        match arg {
            CipherArg::Aes128Cbc => Self::Aes128Cbc,
            CipherArg::Aes192Cbc => Self::Aes192Cbc,
            CipherArg::Aes256Cbc => Self::Aes256Cbc,
            CipherArg::Aes128Gcm => Self::Aes128Gcm,
            CipherArg::Aes192Gcm => Self::Aes192Gcm,
            CipherArg::Aes256Gcm => Self::Aes256Gcm,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum TransportArg {
    #[value(name = "rsa-1_5")]
    RsaPkcs1,
    RsaOaepMgf1p,
    RsaOaep,
}

impl From<TransportArg> for KeyTransportMethod {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::RsaPkcs1 => Self::RsaPkcs1,
            TransportArg::RsaOaepMgf1p => Self::RsaOaepMgf1p(OaepParams::sha1()),
            TransportArg::RsaOaep => Self::RsaOaep(OaepParams::sha1()),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Sign {
            file,
            key,
            cert,
            key_name,
            node,
            id_attr,
            output,
        } => cmd_sign(&file, &key, &cert, &key_name, node.as_deref(), id_attr, output),

        Commands::Verify {
            file,
            cert,
            key_name,
            node,
            id_attr,
        } => cmd_verify(&file, &cert, &key_name, node.as_deref(), id_attr),

        Commands::Decrypt {
            file,
            key,
            node,
            id_attr,
            output,
        } => cmd_decrypt(&file, &key, node.as_deref(), id_attr, output),

        Commands::Encrypt {
            file,
            cert,
            node,
            cipher,
            transport,
            output,
        } => cmd_encrypt(&file, &cert, node.as_deref(), cipher, transport, output),

        Commands::Info { key } => cmd_info(key.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_sign(
    file: &Path,
    key: &Path,
    cert: &Path,
    key_name: &str,
    node: Option<&str>,
    id_attr: Vec<String>,
    output: Option<PathBuf>,
) -> Result<(), Error> {
    let mut doc = read_document(file)?;
    let target = select_node(&doc, node)?;
    let mut ctx = DsigContext::default();
    ctx.id_attrs = id_attr;

    samlsec::dsig::sign_with_context(&ctx, &mut doc, target, key_name, &std::fs::read(key)?, &std::fs::read(cert)?)?;
    write_output(output, &doc)
}

fn cmd_verify(file: &Path, cert: &Path, key_name: &str, node: Option<&str>, id_attr: Vec<String>) -> Result<(), Error> {
    let doc = read_document(file)?;
    let target = select_node(&doc, node)?;
    let mut ctx = DsigContext::default();
    ctx.id_attrs = id_attr;

    if samlsec::dsig::verify_with_context(&ctx, &doc, target, key_name, &std::fs::read(cert)?)? {
        println!("OK");
        Ok(())
    } else {
        eprintln!("INVALID: digest or signature value does not match");
        process::exit(1);
    }
}

fn cmd_decrypt(
    file: &Path,
    key: &Path,
    node: Option<&str>,
    id_attr: Vec<String>,
    output: Option<PathBuf>,
) -> Result<(), Error> {
    let mut doc = read_document(file)?;
    let target = match node {
        Some(name) => select_node(&doc, Some(name))?,
        None => default_decrypt_target(&doc)?,
    };
    let mut ctx = EncContext::default();
    ctx.id_attrs = id_attr;

    samlsec::enc::decrypt_with_context(&ctx, &mut doc, target, &std::fs::read(key)?)?;
    write_output(output, &doc)
}

fn cmd_encrypt(
    file: &Path,
    cert: &Path,
    node: Option<&str>,
    cipher: CipherArg,
    transport: TransportArg,
    output: Option<PathBuf>,
) -> Result<(), Error> {
    let mut doc = read_document(file)?;
    let target = match node {
        Some(name) => select_node(&doc, Some(name))?,
        None => {
            let root = document_element(&doc)?;
            doc.children(root)
                .find(|&c| doc.is_element(c))
                .ok_or_else(|| Error::MalformedSubtree("document element has no child element to encrypt".into()))?
        }
    };
    let ctx = EncContext::new(cipher.into(), transport.into());

    samlsec::enc::encrypt_element(&mut doc, target, &std::fs::read(cert)?, &ctx)?;
    write_output(output, &doc)
}

fn cmd_info(key: Option<&Path>) -> Result<(), Error> {
    if let Some(path) = key {
        let material = samlsec::keys::load_key_file(path)?;
        println!("{}: {}", path.display(), material.describe());
        return Ok(());
    }

    println!("samlsec: XML Security for SAML");
    println!();
    println!("Signature algorithms:");
    println!("  RSA PKCS#1 v1.5 (SHA-1, SHA-224, SHA-256, SHA-384, SHA-512)");
    println!();
    println!("Digest algorithms:");
    println!("  SHA-1, SHA-224, SHA-256, SHA-384, SHA-512");
    println!();
    println!("Canonicalization:");
    println!("  C14N 1.0 (with and without comments)");
    println!("  Exclusive C14N 1.0 (with and without comments)");
    println!();
    println!("Content encryption:");
    println!("  AES-128/192/256-CBC, AES-128/192/256-GCM");
    println!();
    println!("Key transport:");
    println!("  RSA PKCS#1 v1.5, RSA-OAEP (mgf1p and XML-Enc 1.1)");
    println!();
    println!("Key formats:");
    println!("  PEM and DER: RSA private keys (PKCS#8, PKCS#1), X.509 certificates, SPKI public keys");
    Ok(())
}

// ── Utility functions ────────────────────────────────────────────────

fn read_document(path: &Path) -> Result<XmlDocument, Error> {
    let xml = std::fs::read_to_string(path)?;
    let doc = XmlDocument::parse(&xml)?;
    tracing::debug!(path = %path.display(), bytes = xml.len(), "parsed document");
    Ok(doc)
}

fn document_element(doc: &XmlDocument) -> Result<NodeId, Error> {
    doc.document_element()
        .ok_or_else(|| Error::MalformedSubtree("document has no root element".into()))
}

/// The first element with local name `name`, or the document element.
fn select_node(doc: &XmlDocument, name: Option<&str>) -> Result<NodeId, Error> {
    let root = document_element(doc)?;
    match name {
        None => Ok(root),
        Some(name) => doc
            .find_by_local_name(root, name)
            .ok_or_else(|| Error::MalformedSubtree(format!("no <{name}> element in document"))),
    }
}

/// The first `<EncryptedData>`, or its parent when that is a SAML
/// `Encrypted*` wrapper such as `<EncryptedAssertion>`.
fn default_decrypt_target(doc: &XmlDocument) -> Result<NodeId, Error> {
    let root = document_element(doc)?;
    let data = doc
        .find_descendant_element(root, ns::ENC, ns::node::ENCRYPTED_DATA)
        .ok_or_else(|| Error::MalformedEncryptedData("no EncryptedData in document".into()))?;
    match doc.parent(data) {
        Some(parent) if doc.is_element(parent) && doc.name(parent).starts_with("Encrypted") => Ok(parent),
        _ => Ok(data),
    }
}

fn write_output(path: Option<PathBuf>, doc: &XmlDocument) -> Result<(), Error> {
    let text = samlsec::xml::to_document_string(doc);
    match path {
        Some(p) => std::fs::write(&p, text)?,
        None => {
            use std::io::Write;
            std::io::stdout().write_all(text.as_bytes())?;
        }
    }
    Ok(())
}
