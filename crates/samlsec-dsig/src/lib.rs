#![forbid(unsafe_code)]

//! XML Digital Signature (XML-DSig) implementation.
//!
//! Creates and verifies enveloped signatures: a `<ds:Signature>` that is the
//! last child of the element it signs, with a single same-document
//! reference (`URI="#id"`) back to that element.

pub mod context;
pub mod record;
pub mod sign;
pub mod verify;

pub use context::DsigContext;
pub use record::{ReferenceRecord, SignatureRecord, Transform};
pub use sign::{sign, sign_with_context};
pub use verify::{verify_signature, verify_with_context};
