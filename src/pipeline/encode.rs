//! Source encoding: file bytes → base64 text for the JSON request body.
//!
//! The Messages API takes documents and images inline as base64. The encoding
//! is lossless, so the service sees the exact bytes that were submitted; no
//! re-compression or rasterisation happens on this side.

use crate::error::FileError;
use crate::pipeline::input::{FileContent, SourceFile};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// Text-safe representation of one source file's bytes.
///
/// Owned by the pipeline step that produced it and dropped once the OCR call
/// returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    /// Standard-alphabet, padded base64.
    pub data: String,
    /// Length of the original, un-encoded content in bytes.
    pub byte_len: usize,
}

/// Read a source file and encode its bytes as base64.
///
/// Path handles are read here rather than at submission, so a file removed
/// or made unreadable after enqueueing fails with [`FileError::Io`] for that
/// file alone.
pub async fn encode(file: &SourceFile) -> Result<EncodedPayload, FileError> {
    let payload = match file.content() {
        FileContent::Bytes(bytes) => encode_bytes(bytes),
        FileContent::Path(path) => {
            let bytes = tokio::fs::read(path).await.map_err(|e| FileError::Io {
                file: file.name().to_string(),
                detail: e.to_string(),
            })?;
            encode_bytes(&bytes)
        }
    };

    debug!(
        "Encoded '{}' → {} bytes base64 ({} raw)",
        file.name(),
        payload.data.len(),
        payload.byte_len
    );
    Ok(payload)
}

fn encode_bytes(bytes: &[u8]) -> EncodedPayload {
    EncodedPayload {
        data: STANDARD.encode(bytes),
        byte_len: bytes.len(),
    }
}
