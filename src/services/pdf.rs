use crate::config::{LayoutConfig, PageGeometry};
use crate::models::OrderMetadata;
use crate::services::compose::{
    ComposedPage, DOC_TITLE, DecodedImage, DocumentWriter, HEADER_TITLE, PageKind, display_date,
    footer_left, metadata_lines,
};
use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageEncoder, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use std::path::Path;

const FONT_REGULAR: &str = "F1";
const FONT_BOLD: &str = "F2";
/// Rough Helvetica advance per glyph, good enough for right/center alignment.
const GLYPH_WIDTH_FACTOR: f64 = 0.6;

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn estimate_text_width(text: &str, size: f64) -> f64 {
    text.chars().count() as f64 * size * GLYPH_WIDTH_FACTOR
}

/// PDF backend: absolute-coordinate text and images drawn into A4 pages via
/// lopdf content streams, built-in Helvetica fonts, images embedded as
/// DCTDecode XObjects.
pub struct PdfWriter {
    doc: Document,
    pages_id: ObjectId,
    font_regular_id: ObjectId,
    font_bold_id: ObjectId,
    page_ids: Vec<ObjectId>,
    geometry: PageGeometry,
    layout: LayoutConfig,
    meta: OrderMetadata,
}

impl PdfWriter {
    pub fn new(geometry: PageGeometry, layout: LayoutConfig, meta: OrderMetadata) -> Self {
        let mut doc = Document::with_version("1.5");

        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![],
            "Count" => 0,
        });
        let font_regular_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let font_bold_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
        });

        Self {
            doc,
            pages_id,
            font_regular_id,
            font_bold_id,
            page_ids: Vec::new(),
            geometry,
            layout,
            meta,
        }
    }

    fn text(ops: &mut Vec<Operation>, font: &str, size: f64, x: f64, y: f64, text: &str) {
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec![font.into(), real(size)]));
        ops.push(Operation::new("Td", vec![real(x), real(y)]));
        ops.push(Operation::new("Tj", vec![Object::string_literal(text)]));
        ops.push(Operation::new("ET", vec![]));
    }

    fn rule(ops: &mut Vec<Operation>, x1: f64, x2: f64, y: f64) {
        ops.push(Operation::new("w", vec![real(0.7)]));
        ops.push(Operation::new("m", vec![real(x1), real(y)]));
        ops.push(Operation::new("l", vec![real(x2), real(y)]));
        ops.push(Operation::new("S", vec![]));
    }

    fn build_operations(&self, page: &ComposedPage) -> Vec<Operation> {
        let layout = &self.layout;
        let margin = self.geometry.margin;
        let right_edge = self.geometry.page_width - margin;
        let mut ops = Vec::new();

        // Header: title line with the confirmation date right-aligned
        let mut y = self.geometry.page_height - margin - layout.title_size;
        Self::text(&mut ops, FONT_BOLD, layout.title_size, margin, y, HEADER_TITLE);

        let date = display_date(&self.meta.confirmation_date);
        let date_x = right_edge - estimate_text_width(&date, layout.body_size);
        Self::text(&mut ops, FONT_REGULAR, layout.body_size, date_x, y, &date);

        y -= layout.line_gap;
        Self::rule(&mut ops, margin, right_edge, y);
        y -= layout.rule_gap;

        if page.kind == PageKind::First {
            for line in metadata_lines(&self.meta) {
                y -= layout.body_size;
                Self::text(&mut ops, FONT_REGULAR, layout.body_size, margin, y, &line);
                y -= layout.line_gap;
            }

            Self::rule(&mut ops, margin, right_edge, y);
            y -= layout.rule_gap;

            y -= layout.title_size;
            let title_x =
                margin + (self.geometry.content_width() - estimate_text_width(DOC_TITLE, layout.title_size)) / 2.0;
            Self::text(&mut ops, FONT_BOLD, layout.title_size, title_x.max(margin), y, DOC_TITLE);
            y -= 2.0 * layout.line_gap;
        }

        // Caption line
        y -= layout.caption_size;
        Self::text(&mut ops, FONT_REGULAR, layout.caption_size, margin, y, &page.caption);
        y -= layout.line_gap;

        // Image, horizontally centered inside the content box
        let image_x = margin + (self.geometry.content_width() - page.fit.width) / 2.0;
        let image_y = y - page.fit.height;
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            vec![
                real(page.fit.width),
                real(0.0),
                real(0.0),
                real(page.fit.height),
                real(image_x),
                real(image_y),
            ],
        ));
        ops.push(Operation::new("Do", vec!["Im0".into()]));
        ops.push(Operation::new("Q", vec![]));

        // Footer, inside the bottom margin
        let footer_y = margin * 0.6;
        let left = footer_left(&self.meta);
        Self::text(&mut ops, FONT_REGULAR, layout.footer_size, margin, footer_y, &left);

        let right = format!("{} dari {} halaman", page.number, page.total_pages);
        let right_x = right_edge - estimate_text_width(&right, layout.footer_size);
        Self::text(&mut ops, FONT_REGULAR, layout.footer_size, right_x, footer_y, &right);

        ops
    }
}

impl DocumentWriter for PdfWriter {
    fn add_page(&mut self, page: &ComposedPage) -> Result<()> {
        let (jpeg, px_width, px_height, color_space) = encode_jpeg(&page.image)?;

        let image_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => px_width as i64,
                "Height" => px_height as i64,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        ));

        let content = Content {
            operations: self.build_operations(page),
        };
        let content_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), content.encode()?));

        let resources = dictionary! {
            "Font" => dictionary! {
                FONT_REGULAR => self.font_regular_id,
                FONT_BOLD => self.font_bold_id,
            },
            "XObject" => dictionary! { "Im0" => image_id },
        };

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Resources" => resources,
            "MediaBox" => vec![
                real(0.0),
                real(0.0),
                real(self.geometry.page_width),
                real(self.geometry.page_height),
            ],
            "Contents" => content_id,
        });

        self.page_ids.push(page_id);
        Ok(())
    }

    fn finish(self: Box<Self>, out: &Path) -> Result<()> {
        let mut this = *self;

        let kids: Vec<Object> = this.page_ids.iter().map(|id| (*id).into()).collect();
        let count = kids.len() as i64;

        let pages = this
            .doc
            .get_object_mut(this.pages_id)
            .and_then(Object::as_dict_mut)
            .context("pages object missing")?;
        pages.set("Kids", kids);
        pages.set("Count", count);

        let catalog_id = this.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => this.pages_id,
        });
        this.doc.trailer.set("Root", catalog_id);

        this.doc
            .save(out)
            .with_context(|| format!("writing PDF to {:?}", out))?;
        Ok(())
    }
}

/// JPEG data for the page's image XObject. JPEG uploads pass through
/// byte-for-byte; everything else is re-encoded from the decoded pixels.
fn encode_jpeg(image: &DecodedImage) -> Result<(Vec<u8>, u32, u32, &'static str)> {
    if image.format == ImageFormat::Jpeg {
        let color_space = match image.pixels.color() {
            image::ColorType::L8 | image::ColorType::L16 => "DeviceGray",
            _ => "DeviceRGB",
        };
        return Ok((
            image.raw.clone(),
            image.pixels.width(),
            image.pixels.height(),
            color_space,
        ));
    }

    let rgb = image.pixels.to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, 90)
        .write_image(rgb.as_raw(), width, height, image::ColorType::Rgb8)
        .context("JPEG encoding failed")?;
    Ok((jpeg, width, height, "DeviceRGB"))
}
