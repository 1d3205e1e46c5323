//! Size formatting and MIME type classification.

use std::fmt;

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Format a byte count as a human-readable string.
///
/// Uses base 1024 and the largest unit the count reaches, up to GB.
/// The value is rounded to at most two decimals with trailing zeros dropped,
/// so 1536 bytes is "1.5 KB" and 1024 bytes is "1 KB".
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit_index = 0;
    while value >= 1024.0 && unit_index < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit_index += 1;
    }

    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", SIZE_UNITS[unit_index])
}

/// Top-level segment of a MIME type ("image" for "image/png").
///
/// Returns "file" for a missing or empty type.
pub fn media_kind(mime_type: Option<&str>) -> String {
    match mime_type.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => t
            .split('/')
            .next()
            .unwrap_or(t)
            .to_lowercase(),
        None => "file".to_string(),
    }
}

/// Coarse category of a file, derived from its MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCategory {
    Image,
    Video,
    Audio,
    Document,
    Spreadsheet,
    Presentation,
    Text,
    Archive,
    Data,
    File,
}

impl FileCategory {
    /// Classify a MIME type. Matching is case-insensitive.
    pub fn from_mime(mime_type: Option<&str>) -> Self {
        let Some(raw) = mime_type.filter(|t| !t.is_empty()) else {
            return FileCategory::File;
        };
        let t = raw.to_lowercase();

        if t.starts_with("image/") {
            FileCategory::Image
        } else if t.starts_with("video/") {
            FileCategory::Video
        } else if t.starts_with("audio/") {
            FileCategory::Audio
        } else if t.contains("pdf") || t.contains("word") || t.contains("document") {
            FileCategory::Document
        } else if t.contains("sheet") || t.contains("excel") {
            FileCategory::Spreadsheet
        } else if t.contains("presentation") || t.contains("powerpoint") {
            FileCategory::Presentation
        } else if t.contains("text/") {
            FileCategory::Text
        } else if t.contains("zip") || t.contains("rar") || t.contains("7z") {
            FileCategory::Archive
        } else if t.contains("json") || t.contains("xml") {
            FileCategory::Data
        } else {
            FileCategory::File
        }
    }

    /// Display label.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Image => "Image",
            FileCategory::Video => "Video",
            FileCategory::Audio => "Audio",
            FileCategory::Document => "Document",
            FileCategory::Spreadsheet => "Spreadsheet",
            FileCategory::Presentation => "Presentation",
            FileCategory::Text => "Text",
            FileCategory::Archive => "Archive",
            FileCategory::Data => "Data",
            FileCategory::File => "File",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Icon token shown next to a file.
///
/// The icon rules differ slightly from [`FileCategory`]: PDFs get their own
/// icon and plain text, 7z and data types fall back to the generic one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileIcon {
    Image,
    FileText,
    File,
    FileSpreadsheet,
    Presentation,
    Video,
    Music,
    Archive,
}

impl FileIcon {
    /// Pick the icon for a MIME type. Matching is case-insensitive.
    pub fn from_mime(mime_type: Option<&str>) -> Self {
        let Some(raw) = mime_type.filter(|t| !t.is_empty()) else {
            return FileIcon::File;
        };
        let t = raw.to_lowercase();

        if t.starts_with("image/") {
            FileIcon::Image
        } else if t.contains("pdf") {
            FileIcon::FileText
        } else if t.contains("document") || t.contains("word") {
            FileIcon::File
        } else if t.contains("sheet") || t.contains("excel") {
            FileIcon::FileSpreadsheet
        } else if t.contains("presentation") || t.contains("powerpoint") {
            FileIcon::Presentation
        } else if t.starts_with("video/") {
            FileIcon::Video
        } else if t.starts_with("audio/") {
            FileIcon::Music
        } else if t.contains("zip") || t.contains("rar") {
            FileIcon::Archive
        } else {
            FileIcon::File
        }
    }

    /// Icon name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileIcon::Image => "Image",
            FileIcon::FileText => "FileText",
            FileIcon::File => "File",
            FileIcon::FileSpreadsheet => "FileSpreadsheet",
            FileIcon::Presentation => "Presentation",
            FileIcon::Video => "Video",
            FileIcon::Music => "Music",
            FileIcon::Archive => "Archive",
        }
    }
}

impl fmt::Display for FileIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_exact_units() {
        assert_eq!(format_size(0), "0 Bytes");
        assert_eq!(format_size(1), "1 Bytes");
        assert_eq!(format_size(1023), "1023 Bytes");
        assert_eq!(format_size(1024), "1 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1_048_576), "1 MB");
        assert_eq!(format_size(1_073_741_824), "1 GB");
    }

    #[test]
    fn test_format_size_rounding() {
        // 1234 / 1024 = 1.205...
        assert_eq!(format_size(1234), "1.21 KB");
        // 10.5 MB
        assert_eq!(format_size(11_010_048), "10.5 MB");
    }

    #[test]
    fn test_format_size_clamps_to_gb() {
        let five_tb = 5 * 1024u64.pow(4);
        assert_eq!(format_size(five_tb), "5120 GB");
    }

    #[test]
    fn test_format_size_unit_follows_magnitude() {
        for exp in 0..4u32 {
            let base = 1024u64.pow(exp);
            for factor in [1u64, 3, 500, 1023] {
                let formatted = format_size(base * factor);
                assert!(
                    formatted.ends_with(SIZE_UNITS[exp as usize]),
                    "{} -> {}",
                    base * factor,
                    formatted
                );
            }
        }
    }

    #[test]
    fn test_category_by_prefix() {
        assert_eq!(FileCategory::from_mime(Some("image/png")), FileCategory::Image);
        assert_eq!(FileCategory::from_mime(Some("video/mp4")), FileCategory::Video);
        assert_eq!(FileCategory::from_mime(Some("audio/mpeg")), FileCategory::Audio);
        assert_eq!(FileCategory::from_mime(Some("IMAGE/JPEG")), FileCategory::Image);
    }

    #[test]
    fn test_category_by_substring() {
        assert_eq!(
            FileCategory::from_mime(Some("application/pdf")),
            FileCategory::Document
        );
        assert_eq!(
            FileCategory::from_mime(Some(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            )),
            FileCategory::Document
        );
        assert_eq!(
            FileCategory::from_mime(Some("application/vnd.ms-excel")),
            FileCategory::Spreadsheet
        );
        assert_eq!(
            FileCategory::from_mime(Some("application/vnd.ms-powerpoint")),
            FileCategory::Presentation
        );
        assert_eq!(
            FileCategory::from_mime(Some(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            )),
            FileCategory::Document
        );
        assert_eq!(
            FileCategory::from_mime(Some(
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            )),
            FileCategory::Document
        );
        assert_eq!(FileCategory::from_mime(Some("text/csv")), FileCategory::Text);
        assert_eq!(
            FileCategory::from_mime(Some("application/x-7z-compressed")),
            FileCategory::Archive
        );
        assert_eq!(
            FileCategory::from_mime(Some("application/json")),
            FileCategory::Data
        );
    }

    #[test]
    fn test_category_fallback() {
        assert_eq!(FileCategory::from_mime(None), FileCategory::File);
        assert_eq!(FileCategory::from_mime(Some("")), FileCategory::File);
        assert_eq!(
            FileCategory::from_mime(Some("application/x-unknown")),
            FileCategory::File
        );
        assert_eq!(FileCategory::File.to_string(), "File");
    }

    #[test]
    fn test_icon_rules() {
        assert_eq!(FileIcon::from_mime(Some("image/gif")), FileIcon::Image);
        assert_eq!(FileIcon::from_mime(Some("application/pdf")), FileIcon::FileText);
        assert_eq!(FileIcon::from_mime(Some("application/msword")), FileIcon::File);
        assert_eq!(
            FileIcon::from_mime(Some("application/vnd.ms-excel")),
            FileIcon::FileSpreadsheet
        );
        // "document" is checked before "sheet".
        assert_eq!(
            FileIcon::from_mime(Some(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            )),
            FileIcon::File
        );
        assert_eq!(FileIcon::from_mime(Some("video/avi")), FileIcon::Video);
        assert_eq!(FileIcon::from_mime(Some("audio/wav")), FileIcon::Music);
        assert_eq!(FileIcon::from_mime(Some("application/zip")), FileIcon::Archive);
        assert_eq!(FileIcon::from_mime(Some("text/plain")), FileIcon::File);
        assert_eq!(FileIcon::from_mime(None), FileIcon::File);
        assert_eq!(FileIcon::Music.to_string(), "Music");
    }

    #[test]
    fn test_media_kind() {
        assert_eq!(media_kind(Some("image/png")), "image");
        assert_eq!(media_kind(Some("Application/PDF")), "application");
        assert_eq!(media_kind(Some("")), "file");
        assert_eq!(media_kind(None), "file");
    }
}
