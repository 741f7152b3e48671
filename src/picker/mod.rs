//! Image selection: content-type validation, drop payload parsing and
//! per-slot previews.

mod drop;

pub use drop::resolve_drop;

use image::{imageops::FilterType, ImageFormat, RgbImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Longest edge of a decoded preview, in pixels.
const PREVIEW_MAX: u32 = 48;

const UNKNOWN_MIME: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum PickError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An image payload selected for one view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
    pub path: PathBuf,
}

/// Display-only thumbnail derived from a selected file.
///
/// Owned by the slot showing it, so replacing or clearing the slot drops it.
#[derive(Debug, Clone)]
pub struct Preview {
    pub width: u32,
    pub height: u32,
    pub thumb: RgbImage,
}

impl Preview {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let img = image::load_from_memory(bytes).ok()?;
        let (width, height) = (img.width(), img.height());
        let thumb = img
            .resize(PREVIEW_MAX, PREVIEW_MAX, FilterType::Triangle)
            .to_rgb8();
        Some(Self { width, height, thumb })
    }
}

/// A validated file together with its preview.
#[derive(Debug, Clone)]
pub struct Selection {
    pub file: ImageFile,
    pub preview: Option<Preview>,
}

/// Content type declared by the file name, the way a browser fills `File.type`.
pub fn declared_mime(path: &Path) -> &'static str {
    ImageFormat::from_path(path)
        .map(|format| format.to_mime_type())
        .unwrap_or(UNKNOWN_MIME)
}

pub fn is_image_type(mime: &str) -> bool {
    mime.starts_with("image/")
}

pub fn has_image_extension(path: &Path) -> bool {
    is_image_type(declared_mime(path))
}

/// Load `path` as a selection.
///
/// Files that do not declare an image type yield `Ok(None)`: they are ignored,
/// not reported.
pub fn pick(path: &Path) -> Result<Option<Selection>, PickError> {
    let mime = declared_mime(path);
    if !is_image_type(mime) {
        tracing::debug!("Ignoring non-image file {} ({})", path.display(), mime);
        return Ok(None);
    }

    let bytes = std::fs::read(path).map_err(|source| PickError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let preview = Preview::from_bytes(&bytes);
    if preview.is_none() {
        tracing::debug!("No preview for {}: could not decode", path.display());
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    Ok(Some(Selection {
        file: ImageFile {
            name,
            mime: mime.to_string(),
            bytes,
            path: path.to_path_buf(),
        },
        preview,
    }))
}

/// The value held by a slot's browse control.
///
/// Choosing the path the control already holds is not a change; `reset`
/// forgets the value so the same path can register again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileInput {
    value: Option<PathBuf>,
}

impl FileInput {
    /// Returns true when `path` differs from the current value.
    pub fn change(&mut self, path: &Path) -> bool {
        if self.value.as_deref() == Some(path) {
            return false;
        }
        self.value = Some(path.to_path_buf());
        true
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}
