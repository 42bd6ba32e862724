//! Response types for the conversion backend.

use serde::{Deserialize, Serialize};

/// A Google Docs markdown document available for conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleDoc {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertedFile {
    pub original_file_name: String,
    #[serde(default)]
    pub converted_file_name: Option<String>,
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl ConvertedFile {
    pub fn is_converted(&self) -> bool {
        self.status == "converted"
    }

    /// One-line summary for result lists
    pub fn summary(&self) -> String {
        if self.is_converted() {
            format!(
                "{} - Converted ({})",
                self.original_file_name,
                self.converted_file_name.as_deref().unwrap_or("?")
            )
        } else {
            format!(
                "{} - Failed: {}",
                self.original_file_name,
                self.error.as_deref().unwrap_or("unknown error")
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub total_files: u32,
    #[serde(default)]
    pub converted_files: Vec<ConvertedFile>,
    #[serde(default)]
    pub zip_download_link: Option<String>,
}

impl ConversionResult {
    pub fn converted_count(&self) -> usize {
        self.converted_files.iter().filter(|f| f.is_converted()).count()
    }

    pub fn has_archive(&self) -> bool {
        self.zip_download_link
            .as_deref()
            .map(|link| !link.is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_conversion_result() {
        let json = r#"{
            "totalFiles": 2,
            "convertedFiles": [
                {"originalFileName": "a.md", "convertedFileName": "a.docx", "status": "converted"},
                {"originalFileName": "b.md", "status": "failed", "error": "bad table"}
            ],
            "zipDownloadLink": "/api/download-zip"
        }"#;
        let result: ConversionResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.total_files, 2);
        assert_eq!(result.converted_count(), 1);
        assert!(result.has_archive());
        assert_eq!(result.converted_files[0].summary(), "a.md - Converted (a.docx)");
        assert_eq!(result.converted_files[1].summary(), "b.md - Failed: bad table");
    }

    #[test]
    fn test_conversion_without_archive() {
        let result: ConversionResult =
            serde_json::from_str(r#"{"totalFiles": 0, "convertedFiles": []}"#).unwrap();
        assert!(!result.has_archive());
    }
}
