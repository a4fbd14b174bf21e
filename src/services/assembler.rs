use crate::config::AppConfig;
use crate::models::{GeneratedDocument, OrderMetadata, OutputFormat, UploadedImage};
use crate::services::compose::{Composer, DocumentWriter};
use crate::services::docx::DocxWriter;
use crate::services::pdf::PdfWriter;
use crate::utils::validation::sanitize_download_filename;
use anyhow::Result;
use std::path::Path;

/// Builds the complete output document from the sorted upload list.
///
/// CPU-bound; callers on the async runtime should run it inside
/// `spawn_blocking`. The output file is complete when this returns: nothing
/// is streamed to the caller before the last page is composed.
pub fn build_document(
    config: &AppConfig,
    format: OutputFormat,
    images: &[UploadedImage],
    meta: &OrderMetadata,
    output_path: &Path,
) -> Result<GeneratedDocument> {
    let geometry = match format {
        OutputFormat::Pdf => config.pdf_page,
        OutputFormat::Docx => config.docx_page,
    };

    let mut writer: Box<dyn DocumentWriter> = match format {
        OutputFormat::Pdf => Box::new(PdfWriter::new(geometry, config.layout, meta.clone())),
        OutputFormat::Docx => Box::new(DocxWriter::new(geometry, config.layout, meta.clone())),
    };

    let composer = Composer::new(config, &geometry, meta);
    let pages_written = composer.run(images, writer.as_mut())?;
    writer.finish(output_path)?;

    tracing::info!(
        ko_number = %meta.ko_number,
        format = ?format,
        pages = pages_written,
        skipped = images.len() - pages_written,
        "Document assembled"
    );

    Ok(GeneratedDocument {
        output_path: output_path.to_path_buf(),
        mime_type: format.mime_type(),
        filename: download_filename(meta, format),
        page_count: pages_written,
    })
}

/// Suggested download name: `"{koNumber} - Lampiran Design {assignment}.{ext}"`
/// with filesystem-unsafe characters replaced.
pub fn download_filename(meta: &OrderMetadata, format: OutputFormat) -> String {
    sanitize_download_filename(&format!(
        "{} - Lampiran Design {}.{}",
        meta.ko_number,
        meta.assignment,
        format.extension()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ordering::sort_key;
    use image::ImageOutputFormat;
    use std::io::Cursor;

    fn sample_meta() -> OrderMetadata {
        OrderMetadata {
            ko_number: "001/X".to_string(),
            order_date: "2024-05-01".to_string(),
            assignment: "Test".to_string(),
            confirmation_date: "2024-05-03".to_string(),
            image_ratio: None,
            small_image_ratio: None,
        }
    }

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> UploadedImage {
        let pixels = image::DynamicImage::new_rgb8(width, height);
        let mut bytes = Vec::new();
        pixels
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();
        let path = dir.join(name);
        std::fs::write(&path, &bytes).unwrap();
        UploadedImage {
            stored_path: path,
            original_filename: name.to_string(),
            dimensions: Some((width, height)),
            sort_key: sort_key(name),
        }
    }

    #[test]
    fn test_download_filename_sanitized() {
        assert_eq!(
            download_filename(&sample_meta(), OutputFormat::Pdf),
            "001-X - Lampiran Design Test.pdf"
        );
        assert_eq!(
            download_filename(&sample_meta(), OutputFormat::Docx),
            "001-X - Lampiran Design Test.docx"
        );
    }

    #[test]
    fn test_build_pdf_counts_pages() {
        let dir = tempfile::tempdir().unwrap();
        let images = vec![
            write_png(dir.path(), "1_a.png", 800, 600),
            write_png(dir.path(), "2_b.png", 640, 480),
        ];
        let out = dir.path().join("out.pdf");

        let doc = build_document(
            &AppConfig::default(),
            OutputFormat::Pdf,
            &images,
            &sample_meta(),
            &out,
        )
        .unwrap();

        assert_eq!(doc.page_count, 2);
        assert_eq!(doc.mime_type, "application/pdf");
        let parsed = lopdf::Document::load(&out).unwrap();
        assert_eq!(parsed.get_pages().len(), 2);
    }

    #[test]
    fn test_corrupt_image_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_png(dir.path(), "1_a.png", 800, 600);

        // valid PNG header, truncated body: dimensions probe fine, decode fails
        let mut broken_bytes = Vec::new();
        image::DynamicImage::new_rgb8(100, 100)
            .write_to(&mut Cursor::new(&mut broken_bytes), ImageOutputFormat::Png)
            .unwrap();
        broken_bytes.truncate(40);
        let broken_path = dir.path().join("2_b.png");
        std::fs::write(&broken_path, &broken_bytes).unwrap();
        let broken = UploadedImage {
            stored_path: broken_path,
            original_filename: "2_b.png".to_string(),
            dimensions: Some((100, 100)),
            sort_key: 2,
        };

        let out = dir.path().join("out.pdf");
        let doc = build_document(
            &AppConfig::default(),
            OutputFormat::Pdf,
            &[good, broken],
            &sample_meta(),
            &out,
        )
        .unwrap();

        // one page was dropped; the denominator keeps counting both
        assert_eq!(doc.page_count, 1);
        let parsed = lopdf::Document::load(&out).unwrap();
        assert_eq!(parsed.get_pages().len(), 1);
        let text = parsed.extract_text(&[1]).unwrap();
        assert!(text.contains("1 dari 2 halaman"));
    }
}
