use crate::config::{AppConfig, LayoutConfig, PageGeometry};
use crate::models::{OrderMetadata, UploadedImage};
use crate::services::caption::{self, Caption};
use crate::services::geometry::{self, FitOptions, ImageFit};
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use image::{DynamicImage, ImageFormat};

/// Header line repeated on every page.
pub const HEADER_TITLE: &str = "Konfirmasi Order";

/// Centered document title printed on the first page only.
pub const DOC_TITLE: &str = "Lampiran Design";

/// Which of the two page variants is being composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// Full header, metadata block and document title.
    First,
    /// Simplified header: title line and confirmation date only.
    Subsequent,
}

/// One decoded upload, ready for backend-specific embedding.
pub struct DecodedImage {
    /// Original uploaded bytes, for formats a backend can pass through.
    pub raw: Vec<u8>,
    pub format: ImageFormat,
    pub pixels: DynamicImage,
}

/// Everything a backend needs to draw one page.
pub struct ComposedPage {
    pub kind: PageKind,
    /// 1-based page number, assigned from the sorted pre-filter list.
    pub number: usize,
    /// Denominator printed in the footer. Fixed from the pre-filter file
    /// list; a skipped image leaves it inflated.
    pub total_pages: usize,
    pub caption: String,
    pub fit: ImageFit,
    pub image: DecodedImage,
}

/// Output backend the composer drives one page at a time.
pub trait DocumentWriter {
    fn add_page(&mut self, page: &ComposedPage) -> Result<()>;
    /// Serializes the finished document to `out`.
    fn finish(self: Box<Self>, out: &std::path::Path) -> Result<()>;
}

/// Caption line as printed above the image. Subsequent pages historically
/// carry a `.-` separator; kept as-is.
pub fn caption_line(kind: PageKind, caption: &Caption) -> String {
    match kind {
        PageKind::First => format!("{}. {}", caption.number, caption.text),
        PageKind::Subsequent => format!("{}.- {}", caption.number, caption.text),
    }
}

/// Order metadata block printed on the first page.
pub fn metadata_lines(meta: &OrderMetadata) -> [String; 3] {
    [
        format!("No. KO : {}", meta.ko_number),
        format!("Tanggal Order : {}", display_date(&meta.order_date)),
        format!("Design : {}", meta.assignment),
    ]
}

/// Footer text on the left of every page.
pub fn footer_left(meta: &OrderMetadata) -> String {
    format!("Konfirmasi Order No. {}", meta.ko_number)
}

/// Normalizes a caller-supplied date string to `dd-mm-YYYY` for display.
/// Unparseable input is printed verbatim.
pub fn display_date(raw: &str) -> String {
    for pattern in ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw.trim(), pattern) {
            return date.format("%d-%m-%Y").to_string();
        }
    }
    raw.trim().to_string()
}

/// Vertical space reserved above the image, from the top margin down to
/// where the image may start, plus the footer allowance at the bottom.
pub fn header_reserve(layout: &LayoutConfig, kind: PageKind) -> f64 {
    let title_block = layout.title_size + layout.line_gap + layout.rule_gap;
    let caption_block = layout.caption_size + layout.line_gap;
    let footer_block = layout.footer_size + layout.line_gap;

    let first_page_extra = match kind {
        PageKind::First => {
            3.0 * (layout.body_size + layout.line_gap)
                + layout.rule_gap
                + layout.title_size
                + 2.0 * layout.line_gap
        }
        PageKind::Subsequent => 0.0,
    };

    title_block + first_page_extra + caption_block + footer_block
}

/// Drives a document writer over the sorted file list, one page per image.
///
/// All per-image failures are handled here: an unreadable or undecodable
/// file is logged and its page skipped, the batch always continues. Writer
/// errors are fatal and propagate.
pub struct Composer<'a> {
    config: &'a AppConfig,
    geometry: &'a PageGeometry,
    meta: &'a OrderMetadata,
}

impl<'a> Composer<'a> {
    pub fn new(config: &'a AppConfig, geometry: &'a PageGeometry, meta: &'a OrderMetadata) -> Self {
        Self {
            config,
            geometry,
            meta,
        }
    }

    /// Returns the number of pages actually written.
    pub fn run(&self, images: &[UploadedImage], writer: &mut dyn DocumentWriter) -> Result<usize> {
        // Denominator fixed before any image is read; see ComposedPage docs.
        let total_pages = images.len();
        let mut written = 0;

        for (index, upload) in images.iter().enumerate() {
            match self.compose_page(index, total_pages, upload) {
                Ok(page) => {
                    writer.add_page(&page)?;
                    written += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        file = %upload.original_filename,
                        error = %e,
                        "Skipping image that could not be composed"
                    );
                }
            }
        }

        Ok(written)
    }

    fn compose_page(
        &self,
        index: usize,
        total_pages: usize,
        upload: &UploadedImage,
    ) -> Result<ComposedPage> {
        let intrinsic = upload
            .dimensions
            .ok_or_else(|| anyhow!("image dimensions could not be read"))?;

        let raw = std::fs::read(&upload.stored_path)
            .with_context(|| format!("reading {:?}", upload.stored_path))?;
        let format = image::guess_format(&raw).context("unrecognized image format")?;
        let pixels = image::load_from_memory(&raw).context("image failed to decode")?;

        let kind = if index == 0 {
            PageKind::First
        } else {
            PageKind::Subsequent
        };

        let caption = caption::extract(&upload.original_filename, index);

        let max_height =
            self.geometry.content_height() - header_reserve(&self.config.layout, kind);
        let fit = geometry::fit_image(
            intrinsic,
            self.geometry.content_width(),
            max_height,
            &FitOptions {
                ratio: self.meta.image_ratio,
                small_image_ratio: self.meta.small_image_ratio,
                small_image_threshold: self.config.small_image_threshold,
            },
        );

        Ok(ComposedPage {
            kind,
            number: caption.number,
            total_pages,
            caption: caption_line(kind, &caption),
            fit,
            image: DecodedImage {
                raw,
                format,
                pixels,
            },
        })
    }
}
