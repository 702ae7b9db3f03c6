#![forbid(unsafe_code)]

//! Shared building blocks for the samlsec XML Security crates.
//!
//! Holds the error taxonomy used across the workspace, the algorithm URIs
//! that appear in `Algorithm` attributes, and the namespace/element name
//! constants of XML-DSig and XML-Enc.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, Result};
