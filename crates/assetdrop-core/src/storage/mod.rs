//! Disk side of a transfer: write into `<dest>.part`, fsync, then atomically
//! rename onto the final name. A crash mid-transfer never leaves a truncated
//! file at the destination path.

mod part_file;

pub use part_file::PartFile;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `kick.wav` → `kick.wav.part`).
pub fn temp_path(final_path: &std::path::Path) -> std::path::PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    std::path::PathBuf::from(o)
}
