//! Sensitive-data markers and the extension-to-type table.

use serde::{Deserialize, Serialize};

/// Coarse classification of a file that may hold sensitive data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitiveFileType {
    Text,
    Json,
    Pdf,
    Image,
    Source,
    Spreadsheet,
    Archive,
    Unknown,
}

/// A path flagged as potentially holding sensitive data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitiveData {
    pub path: String,
    pub file_type: SensitiveFileType,
}

/// Classify a path by extension. The table is fixed; unknown extensions map
/// to [`SensitiveFileType::Unknown`].
pub fn classify(path: &str) -> SensitiveFileType {
    let ext = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "txt" | "md" | "log" | "csv" => SensitiveFileType::Text,
        "json" | "ndjson" => SensitiveFileType::Json,
        "pdf" => SensitiveFileType::Pdf,
        "png" | "jpg" | "jpeg" | "gif" | "bmp" | "tiff" | "webp" => SensitiveFileType::Image,
        "rs" | "go" | "py" | "js" | "ts" | "java" | "kt" | "c" | "cc" | "cpp" | "h" | "rb"
        | "sh" => SensitiveFileType::Source,
        "xls" | "xlsx" | "ods" => SensitiveFileType::Spreadsheet,
        "zip" | "tar" | "gz" | "tgz" | "7z" | "rar" => SensitiveFileType::Archive,
        _ => SensitiveFileType::Unknown,
    }
}
