use std::env;
use std::path::PathBuf;

/// Page geometry for one output backend, in PostScript points.
#[derive(Debug, Clone, Copy)]
pub struct PageGeometry {
    pub page_width: f64,
    pub page_height: f64,
    pub margin: f64,
}

impl PageGeometry {
    /// A4 in points with the 50pt margin the PDF backend uses.
    pub const A4_PDF: PageGeometry = PageGeometry {
        page_width: 595.28,
        page_height: 841.89,
        margin: 50.0,
    };

    /// 210mm x 297mm with 25.4mm margins, converted to points, for DOCX.
    pub const A4_DOCX: PageGeometry = PageGeometry {
        page_width: 595.275_590_551_181_2,
        page_height: 841.889_763_779_527_6,
        margin: 72.0,
    };

    /// Page width minus left/right margins: the maximum image width.
    pub fn content_width(&self) -> f64 {
        self.page_width - 2.0 * self.margin
    }

    pub fn content_height(&self) -> f64 {
        self.page_height - 2.0 * self.margin
    }
}

/// Font sizes and spacing shared by both composition backends, in points.
#[derive(Debug, Clone, Copy)]
pub struct LayoutConfig {
    pub title_size: f64,
    pub body_size: f64,
    pub caption_size: f64,
    pub footer_size: f64,
    pub line_gap: f64,
    pub rule_gap: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            title_size: 14.0,
            body_size: 11.0,
            caption_size: 11.0,
            footer_size: 9.0,
            line_gap: 6.0,
            rule_gap: 8.0,
        }
    }
}

/// Service configuration for document conversion
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Maximum request body size in bytes (default: 64 MB)
    pub max_file_size: usize,

    /// Directory for per-request temp files (default: "uploads")
    pub upload_dir: PathBuf,

    /// Intrinsic width below which an image counts as "small" (default: 360)
    pub small_image_threshold: u32,

    /// Seconds between stale-upload sweeps (default: 3600)
    pub sweep_interval_secs: u64,

    /// Age in seconds after which an orphaned temp file is removed (default: 3600)
    pub stale_after_secs: u64,

    pub pdf_page: PageGeometry,
    pub docx_page: PageGeometry,
    pub layout: LayoutConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_file_size: 64 * 1024 * 1024, // 64 MB
            upload_dir: PathBuf::from("uploads"),
            small_image_threshold: 360,
            sweep_interval_secs: 3600,
            stale_after_secs: 3600,
            pdf_page: PageGeometry::A4_PDF,
            docx_page: PageGeometry::A4_DOCX,
            layout: LayoutConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            small_image_threshold: env::var("SMALL_IMAGE_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.small_image_threshold),

            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.sweep_interval_secs),

            stale_after_secs: env::var("STALE_UPLOAD_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.stale_after_secs),

            pdf_page: default.pdf_page,
            docx_page: default.docx_page,
            layout: default.layout,
        }
    }

    /// Create config for tests (temp upload dir supplied by the caller)
    pub fn development(upload_dir: PathBuf) -> Self {
        Self {
            upload_dir,
            ..Self::default()
        }
    }
}
