use serde::Serialize;
use std::path::PathBuf;
use validator::Validate;

/// One uploaded image, persisted to a per-request temp file.
///
/// The file behind `stored_path` is owned exclusively by the current request
/// and must be registered with the request's cleanup tracker as soon as it is
/// created, whether or not composition for it later succeeds.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub stored_path: PathBuf,
    pub original_filename: String,
    /// Intrinsic pixel dimensions probed from the uploaded bytes.
    /// `None` marks an image whose header could not be read; its page is
    /// skipped during composition but the temp file is still cleaned up.
    pub dimensions: Option<(u32, u32)>,
    /// Numeric filename prefix (digits before the first `_`), 0 when absent.
    pub sort_key: u64,
}

/// Order metadata supplied entirely by the caller, immutable per request.
#[derive(Debug, Clone, Validate)]
pub struct OrderMetadata {
    #[validate(length(min = 1, message = "koNumber is required"))]
    pub ko_number: String,
    #[validate(length(min = 1, message = "orderDate is required"))]
    pub order_date: String,
    #[validate(length(min = 1, message = "assignment is required"))]
    pub assignment: String,
    #[validate(length(min = 1, message = "confirmationDate is required"))]
    pub confirmation_date: String,
    #[validate(range(exclusive_min = 0.0, message = "imageRatio must be positive"))]
    pub image_ratio: Option<f64>,
    #[validate(range(exclusive_min = 0.0, message = "smallImageRatio must be positive"))]
    pub small_image_ratio: Option<f64>,
}

/// Output variant, selected by the request route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutputFormat {
    Pdf,
    Docx,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Docx => "docx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

/// The finished document on disk, deleted by the cleanup tracker after the
/// response bytes have been read.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub output_path: PathBuf,
    pub mime_type: &'static str,
    /// Download filename suggested via Content-Disposition.
    pub filename: String,
    pub page_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> OrderMetadata {
        OrderMetadata {
            ko_number: "001/KO/2024".to_string(),
            order_date: "2024-05-01".to_string(),
            assignment: "Banner Toko".to_string(),
            confirmation_date: "2024-05-03".to_string(),
            image_ratio: None,
            small_image_ratio: None,
        }
    }

    #[test]
    fn test_metadata_validation() {
        assert!(metadata().validate().is_ok());

        let mut missing = metadata();
        missing.ko_number = String::new();
        assert!(missing.validate().is_err());

        let mut bad_ratio = metadata();
        bad_ratio.image_ratio = Some(0.0);
        assert!(bad_ratio.validate().is_err());

        let mut ok_ratio = metadata();
        ok_ratio.image_ratio = Some(1.5);
        ok_ratio.small_image_ratio = Some(2.0);
        assert!(ok_ratio.validate().is_ok());
    }

    #[test]
    fn test_output_format() {
        assert_eq!(OutputFormat::Pdf.extension(), "pdf");
        assert_eq!(OutputFormat::Pdf.mime_type(), "application/pdf");
        assert_eq!(OutputFormat::Docx.extension(), "docx");
        assert!(OutputFormat::Docx.mime_type().contains("wordprocessingml"));
    }
}
