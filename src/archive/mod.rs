//! Archive serialization: one export object, three equivalent encodings.
//!
//! YAML and JSON go straight through serde; XML has a dedicated writer and
//! loader. All three are lossless for every field, including explicit nulls,
//! so an archive can be converted freely between formats. Files are written
//! atomically (temp file, sync, rename) so an interrupted run never leaves a
//! partial archive behind.

mod xml;

pub use xml::{from_xml, to_xml};

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::{ExporterError, Result};
use crate::types::LjExport;

/// Supported archive encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
    Xml,
}

impl Format {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        match extension.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            _ => Err(ExporterError::UnknownFormat(path.display().to_string())),
        }
    }
}

/// Serialize an export to a string in the given format.
pub fn to_string(export: &LjExport, format: Format) -> Result<String> {
    match format {
        Format::Yaml => Ok(serde_yaml_ng::to_string(export)?),
        Format::Json => Ok(serde_json::to_string_pretty(export)?),
        Format::Xml => Ok(to_xml(export)),
    }
}

/// Deserialize an export from a string in the given format.
pub fn from_string(content: &str, format: Format) -> Result<LjExport> {
    match format {
        Format::Yaml => Ok(serde_yaml_ng::from_str(content)?),
        Format::Json => Ok(serde_json::from_str(content)?),
        Format::Xml => from_xml(content),
    }
}

/// Save an export to a file; the extension picks the format.
///
/// Counts are recomputed from the collections immediately before
/// serialization; this is the only write path to the metadata counts.
pub fn save(export: &mut LjExport, path: &Path) -> Result<()> {
    let format = Format::from_path(path)?;
    export.update_counts();

    let content = to_string(export, format)?;
    write_atomic(path, &content)
}

/// Load an export from a file; the extension picks the format.
pub fn load(path: &Path) -> Result<LjExport> {
    let format = Format::from_path(path)?;
    let content = fs::read_to_string(path)?;
    from_string(&content, format)
}

/// Write to a temp file, sync it to disk, then rename over the target.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("archive");
    let temp_path = path.with_file_name(format!(".{file_name}.tmp"));

    {
        let mut file = File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }

    // On Windows, rename fails if the destination already exists
    #[cfg(target_os = "windows")]
    if path.exists() {
        fs::remove_file(path)?;
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}
