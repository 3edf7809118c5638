//! Library layout: where a materialized asset lives on disk.
//!
//! `<root>/<genre or "Uncategorized">/<sanitized title>.<ext>`, with the
//! extension sniffed from the source URL.

mod extension;
mod sanitize;

use std::path::{Path, PathBuf};

pub use extension::{
    extension_for_content_type, extension_from_url, AUDIO_EXTENSIONS, DEFAULT_EXTENSION,
};
pub use sanitize::sanitize_component;

/// Directory used when the caller supplies no (usable) genre.
pub const DEFAULT_GENRE: &str = "Uncategorized";

/// File stem used when the title sanitizes to nothing.
pub const DEFAULT_TITLE: &str = "Untitled";

/// Destination path for an asset under `root`.
///
/// # Examples
///
/// - `destination(root, "Kick 01", Some("Trap"), "https://x/kick.wav")` → `<root>/Trap/Kick 01.wav`
/// - `destination(root, "Pad: Warm?", None, "https://x/a")` → `<root>/Uncategorized/Pad Warm.wav`
pub fn destination(root: &Path, title: &str, genre: Option<&str>, source_url: &str) -> PathBuf {
    let dir = genre
        .map(sanitize_component)
        .filter(|g| !g.is_empty())
        .unwrap_or_else(|| DEFAULT_GENRE.to_string());
    let stem = Some(sanitize_component(title))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let ext = extension_from_url(source_url);
    root.join(dir).join(format!("{stem}.{ext}"))
}

/// `n`-th alternative name for `path`: `Kick 01.wav`, `Kick 01 (2).wav`, `Kick 01 (3).wav`, ...
/// Used when the plain destination already belongs to another asset.
pub fn numbered(path: &Path, n: u32) -> PathBuf {
    if n <= 1 {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let name = match path.extension() {
        Some(ext) => format!("{stem} ({n}).{}", ext.to_string_lossy()),
        None => format!("{stem} ({n})"),
    };
    path.with_file_name(name)
}

/// `path` with its extension replaced by the one implied by `content_type`, if that
/// differs from the current extension. `None` means no correction is needed.
pub fn corrected_path(path: &Path, content_type: Option<&str>) -> Option<PathBuf> {
    let ext = content_type.and_then(extension_for_content_type)?;
    let current = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    if current.as_deref() == Some(ext) {
        return None;
    }
    // aif and aiff are the same container.
    if ext == "aiff" && current.as_deref() == Some("aif") {
        return None;
    }
    Some(path.with_extension(ext))
}
