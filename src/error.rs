//! Error types for PDF color inversion.

use thiserror::Error;

/// Errors arising while inverting a document.
///
/// Only `InvalidDocument`, `Encrypted`, `Serialization`, `Cancelled` and
/// `Io` are ever returned from the public entry points. `StreamRewrite`
/// and `ImageTransform` describe failures of a single stream or image;
/// the walker logs them, leaves the offending object unchanged, and keeps
/// going, so the caller still receives a complete document.
#[derive(Error, Debug)]
pub enum InvertError {
    /// The input bytes are not a parseable PDF.
    #[error("failed to load PDF: {0}")]
    InvalidDocument(String),

    /// The document is encrypted and cannot be rewritten.
    #[error("document is encrypted")]
    Encrypted,

    /// Tokenizing or re-encoding one content stream failed.
    #[error("content stream rewrite failed: {0}")]
    StreamRewrite(String),

    /// Decoding, transforming or re-encoding one image XObject failed.
    #[error("image transform failed: {0}")]
    ImageTransform(String),

    /// Serializing the finished document failed.
    #[error("failed to save PDF: {0}")]
    Serialization(String),

    /// The caller's cancellation flag was set between pages.
    #[error("processing was cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
