//! Input intake: media kinds, source files, and path/folder expansion.
//!
//! A batch is a frozen list of [`SourceFile`]s. Each one carries the display
//! name shown in reports, the declared [`MediaKind`] that decides how the file
//! is tagged in the OCR request, and a handle to its bytes. Path handles are
//! read lazily by the encoder, so a file that disappears after submission
//! fails on its own instead of failing the whole submission.

use crate::error::OcrBatchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Human-readable list of accepted formats, used in rejection messages.
pub const SUPPORTED_FORMATS: &str = "PDF, JPG, PNG, GIF, WEBP, BMP, TIFF";

/// Declared content category of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Pdf,
    Jpeg,
    Png,
    Gif,
    Webp,
    Bmp,
    Tiff,
}

impl MediaKind {
    /// Every supported kind, in display order.
    pub const ALL: [MediaKind; 7] = [
        MediaKind::Pdf,
        MediaKind::Jpeg,
        MediaKind::Png,
        MediaKind::Gif,
        MediaKind::Webp,
        MediaKind::Bmp,
        MediaKind::Tiff,
    ];

    /// IANA media type sent to the OCR service.
    pub fn mime_type(self) -> &'static str {
        match self {
            MediaKind::Pdf => "application/pdf",
            MediaKind::Jpeg => "image/jpeg",
            MediaKind::Png => "image/png",
            MediaKind::Gif => "image/gif",
            MediaKind::Webp => "image/webp",
            MediaKind::Bmp => "image/bmp",
            MediaKind::Tiff => "image/tiff",
        }
    }

    /// File extensions recognised for this kind (lower-case, no dot).
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            MediaKind::Pdf => &["pdf"],
            MediaKind::Jpeg => &["jpg", "jpeg"],
            MediaKind::Png => &["png"],
            MediaKind::Gif => &["gif"],
            MediaKind::Webp => &["webp"],
            MediaKind::Bmp => &["bmp"],
            MediaKind::Tiff => &["tif", "tiff"],
        }
    }

    /// Label substituted into the OCR instruction.
    pub fn label(self) -> &'static str {
        if self.is_document() {
            "PDF"
        } else {
            "image"
        }
    }

    pub fn is_document(self) -> bool {
        matches!(self, MediaKind::Pdf)
    }

    /// Resolve a MIME type. Parameters (`; charset=…`) and case are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        let essence = match essence.as_str() {
            "image/jpg" | "image/pjpeg" => "image/jpeg",
            "image/x-ms-bmp" => "image/bmp",
            other => other,
        };
        Self::ALL.into_iter().find(|k| k.mime_type() == essence)
    }

    /// Resolve a file extension (without the dot), case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.extensions().contains(&ext.as_str()))
    }

    /// Resolve from the extension of a file name or path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Where a source file's bytes live.
#[derive(Debug, Clone)]
pub enum FileContent {
    /// Read from disk when the file is processed.
    Path(PathBuf),
    /// Already in memory.
    Bytes(Arc<[u8]>),
}

/// One file of a batch. Immutable once built; cloning is cheap.
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    media_kind: MediaKind,
    content: FileContent,
}

impl SourceFile {
    /// Build from a path, deriving the media kind from the extension.
    ///
    /// The file is not opened here; read failures surface per file during
    /// the batch run.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, OcrBatchError> {
        let path = path.into();
        let name = display_name(&path);
        let media_kind = MediaKind::from_path(&path).ok_or_else(|| {
            OcrBatchError::UnsupportedMediaKind {
                name: name.clone(),
                kind: path
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_else(|| "no extension".to_string()),
                supported: SUPPORTED_FORMATS.to_string(),
            }
        })?;
        Ok(Self {
            name,
            media_kind,
            content: FileContent::Path(path),
        })
    }

    /// Build from an in-memory buffer with a declared MIME type.
    pub fn from_bytes(
        name: impl Into<String>,
        mime: &str,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<Self, OcrBatchError> {
        let name = name.into();
        let media_kind =
            MediaKind::from_mime(mime).ok_or_else(|| OcrBatchError::UnsupportedMediaKind {
                name: name.clone(),
                kind: mime.to_string(),
                supported: SUPPORTED_FORMATS.to_string(),
            })?;
        Ok(Self::with_kind(name, media_kind, bytes))
    }

    /// Build from an in-memory buffer whose kind is already known.
    pub fn with_kind(
        name: impl Into<String>,
        media_kind: MediaKind,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            name: name.into(),
            media_kind,
            content: FileContent::Bytes(bytes.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_kind(&self) -> MediaKind {
        self.media_kind
    }

    pub fn content(&self) -> &FileContent {
        &self.content
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Expand files and directories into a list of supported source files.
///
/// Directories are walked recursively with entries sorted by name so the
/// batch order is stable across runs. Files with an unsupported extension
/// are skipped, mirroring a folder picker that filters by type.
pub fn collect_sources<I, P>(inputs: I) -> Result<Vec<SourceFile>, OcrBatchError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut files = Vec::new();
    for input in inputs {
        let path = input.as_ref();
        if !path.exists() {
            return Err(OcrBatchError::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        if path.is_dir() {
            walk_dir(path, &mut files)?;
        } else {
            push_if_supported(path, &mut files);
        }
    }

    if files.is_empty() {
        return Err(OcrBatchError::NoSupportedFiles {
            supported: SUPPORTED_FORMATS.to_string(),
        });
    }
    debug!("Collected {} supported files", files.len());
    Ok(files)
}

fn walk_dir(dir: &Path, files: &mut Vec<SourceFile>) -> Result<(), OcrBatchError> {
    let read_err = |source| OcrBatchError::DirectoryReadFailed {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = std::fs::read_dir(dir)
        .map_err(read_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err)?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            walk_dir(&path, files)?;
        } else {
            push_if_supported(&path, files);
        }
    }
    Ok(())
}

fn push_if_supported(path: &Path, files: &mut Vec<SourceFile>) {
    match SourceFile::from_path(path) {
        Ok(file) => files.push(file),
        Err(_) => debug!("Skipping unsupported file: {}", path.display()),
    }
}
