use crate::config::{LayoutConfig, PageGeometry};
use crate::models::OrderMetadata;
use crate::services::compose::{
    ComposedPage, DOC_TITLE, DocumentWriter, HEADER_TITLE, PageKind, display_date, footer_left,
    metadata_lines,
};
use anyhow::{Context, Result};
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, ImageFormat};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::collections::BTreeSet;
use std::io::{Cursor, Write as _};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const NS_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CT: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_HEADER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";
const REL_FOOTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer";
const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

fn pt_to_twips(points: f64) -> i64 {
    (points * 20.0).round() as i64
}

fn pt_to_emu(points: f64) -> i64 {
    (points * 12700.0).round() as i64
}

fn half_points(points: f64) -> i64 {
    (points * 2.0).round() as i64
}

/// Small builder over the quick-xml event writer; OOXML nests deeply and the
/// raw event API gets noisy without it.
struct Xml {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl Xml {
    fn new() -> Result<Self> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        Ok(Self { writer })
    }

    fn open(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let mut element = BytesStart::new(tag);
        for attr in attrs {
            element.push_attribute(*attr);
        }
        self.writer.write_event(Event::Start(element))?;
        Ok(())
    }

    fn close(&mut self, tag: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(tag)))?;
        Ok(())
    }

    fn empty(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let mut element = BytesStart::new(tag);
        for attr in attrs {
            element.push_attribute(*attr);
        }
        self.writer.write_event(Event::Empty(element))?;
        Ok(())
    }

    fn text_element(&mut self, tag: &str, attrs: &[(&str, &str)], text: &str) -> Result<()> {
        self.open(tag, attrs)?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.close(tag)
    }

    fn finish(self) -> Vec<u8> {
        self.writer.into_inner().into_inner()
    }
}

/// One image part stored under word/media/.
struct Media {
    file_name: String,
    extension: &'static str,
    bytes: Vec<u8>,
}

/// One single-page document section: caption, picture and its own footer.
struct Section {
    kind: PageKind,
    caption: String,
    footer_text: String,
    extent_emu: (i64, i64),
    media: Media,
}

/// DOCX backend: one document section per image, each re-declaring header,
/// footer and page geometry; the whole package is serialized with zip +
/// quick-xml into an in-memory buffer written once at the end.
pub struct DocxWriter {
    geometry: PageGeometry,
    layout: LayoutConfig,
    meta: OrderMetadata,
    sections: Vec<Section>,
}

impl DocxWriter {
    pub fn new(geometry: PageGeometry, layout: LayoutConfig, meta: OrderMetadata) -> Self {
        Self {
            geometry,
            layout,
            meta,
            sections: Vec::new(),
        }
    }

    fn content_width_twips(&self) -> i64 {
        pt_to_twips(self.geometry.content_width())
    }

    fn has_header(&self, kind: PageKind) -> bool {
        self.sections.iter().any(|s| s.kind == kind)
    }

    /// Paragraph holding a right tab stop at the content edge: left text,
    /// tab, right text. Used by the header title line and the footer.
    fn tabbed_line(
        &self,
        xml: &mut Xml,
        left: &str,
        left_bold: bool,
        left_size: f64,
        right: &str,
        right_size: f64,
    ) -> Result<()> {
        let pos = self.content_width_twips().to_string();

        xml.open("w:p", &[])?;
        xml.open("w:pPr", &[])?;
        xml.open("w:tabs", &[])?;
        xml.empty("w:tab", &[("w:val", "right"), ("w:pos", &pos)])?;
        xml.close("w:tabs")?;
        xml.close("w:pPr")?;

        xml.open("w:r", &[])?;
        xml.open("w:rPr", &[])?;
        if left_bold {
            xml.empty("w:b", &[])?;
        }
        xml.empty("w:sz", &[("w:val", &half_points(left_size).to_string())])?;
        xml.close("w:rPr")?;
        xml.text_element("w:t", &[("xml:space", "preserve")], left)?;
        xml.close("w:r")?;

        xml.open("w:r", &[])?;
        xml.empty("w:tab", &[])?;
        xml.close("w:r")?;

        xml.open("w:r", &[])?;
        xml.open("w:rPr", &[])?;
        xml.empty("w:sz", &[("w:val", &half_points(right_size).to_string())])?;
        xml.close("w:rPr")?;
        xml.text_element("w:t", &[("xml:space", "preserve")], right)?;
        xml.close("w:r")?;

        xml.close("w:p")
    }

    fn text_paragraph(
        &self,
        xml: &mut Xml,
        text: &str,
        bold: bool,
        size: f64,
        centered: bool,
    ) -> Result<()> {
        xml.open("w:p", &[])?;
        if centered {
            xml.open("w:pPr", &[])?;
            xml.empty("w:jc", &[("w:val", "center")])?;
            xml.close("w:pPr")?;
        }
        xml.open("w:r", &[])?;
        xml.open("w:rPr", &[])?;
        if bold {
            xml.empty("w:b", &[])?;
        }
        xml.empty("w:sz", &[("w:val", &half_points(size).to_string())])?;
        xml.close("w:rPr")?;
        xml.text_element("w:t", &[("xml:space", "preserve")], text)?;
        xml.close("w:r")?;
        xml.close("w:p")
    }

    /// Empty paragraph whose bottom border draws the horizontal rule.
    fn rule_paragraph(&self, xml: &mut Xml) -> Result<()> {
        xml.open("w:p", &[])?;
        xml.open("w:pPr", &[])?;
        xml.open("w:pBdr", &[])?;
        xml.empty(
            "w:bottom",
            &[
                ("w:val", "single"),
                ("w:sz", "6"),
                ("w:space", "1"),
                ("w:color", "auto"),
            ],
        )?;
        xml.close("w:pBdr")?;
        xml.close("w:pPr")?;
        xml.close("w:p")
    }

    fn header_xml(&self, kind: PageKind) -> Result<Vec<u8>> {
        let mut xml = Xml::new()?;
        xml.open("w:hdr", &[("xmlns:w", NS_W), ("xmlns:r", NS_R)])?;

        let date = display_date(&self.meta.confirmation_date);
        self.tabbed_line(
            &mut xml,
            HEADER_TITLE,
            true,
            self.layout.title_size,
            &date,
            self.layout.body_size,
        )?;
        self.rule_paragraph(&mut xml)?;

        if kind == PageKind::First {
            for line in metadata_lines(&self.meta) {
                self.text_paragraph(&mut xml, &line, false, self.layout.body_size, false)?;
            }
            self.rule_paragraph(&mut xml)?;
            self.text_paragraph(&mut xml, DOC_TITLE, true, self.layout.title_size, true)?;
        }

        xml.close("w:hdr")?;
        Ok(xml.finish())
    }

    fn footer_xml(&self, footer_text: &str) -> Result<Vec<u8>> {
        let mut xml = Xml::new()?;
        xml.open("w:ftr", &[("xmlns:w", NS_W), ("xmlns:r", NS_R)])?;
        self.tabbed_line(
            &mut xml,
            &footer_left(&self.meta),
            false,
            self.layout.footer_size,
            footer_text,
            self.layout.footer_size,
        )?;
        xml.close("w:ftr")?;
        Ok(xml.finish())
    }

    /// Section properties re-declared for every section: header/footer
    /// references plus the full page geometry.
    fn section_properties(
        &self,
        xml: &mut Xml,
        section: Option<(usize, &Section)>,
    ) -> Result<()> {
        xml.open("w:sectPr", &[])?;

        if let Some((index, section)) = section {
            let header_rel = match section.kind {
                PageKind::First => "rIdHdr1",
                PageKind::Subsequent => "rIdHdr2",
            };
            xml.empty(
                "w:headerReference",
                &[("w:type", "default"), ("r:id", header_rel)],
            )?;
            let footer_rel = format!("rIdFtr{}", index + 1);
            xml.empty(
                "w:footerReference",
                &[("w:type", "default"), ("r:id", &footer_rel)],
            )?;
        }

        let width = pt_to_twips(self.geometry.page_width).to_string();
        let height = pt_to_twips(self.geometry.page_height).to_string();
        let margin = pt_to_twips(self.geometry.margin).to_string();

        xml.empty("w:pgSz", &[("w:w", &width), ("w:h", &height)])?;
        xml.empty(
            "w:pgMar",
            &[
                ("w:top", &margin),
                ("w:right", &margin),
                ("w:bottom", &margin),
                ("w:left", &margin),
                ("w:header", "720"),
                ("w:footer", "720"),
                ("w:gutter", "0"),
            ],
        )?;

        xml.close("w:sectPr")
    }

    fn drawing_paragraph(&self, xml: &mut Xml, index: usize, section: &Section) -> Result<()> {
        let (cx, cy) = section.extent_emu;
        let cx = cx.to_string();
        let cy = cy.to_string();
        let doc_pr_id = (index + 1).to_string();
        let name = format!("Gambar {}", index + 1);
        let embed = format!("rIdImg{}", index + 1);

        xml.open("w:p", &[])?;
        xml.open("w:pPr", &[])?;
        xml.empty("w:jc", &[("w:val", "center")])?;
        xml.close("w:pPr")?;
        xml.open("w:r", &[])?;
        xml.open("w:drawing", &[])?;
        xml.open(
            "wp:inline",
            &[
                ("xmlns:wp", NS_WP),
                ("distT", "0"),
                ("distB", "0"),
                ("distL", "0"),
                ("distR", "0"),
            ],
        )?;
        xml.empty("wp:extent", &[("cx", &cx), ("cy", &cy)])?;
        xml.empty("wp:docPr", &[("id", &doc_pr_id), ("name", &name)])?;
        xml.open("a:graphic", &[("xmlns:a", NS_A)])?;
        xml.open("a:graphicData", &[("uri", NS_PIC)])?;
        xml.open("pic:pic", &[("xmlns:pic", NS_PIC)])?;

        xml.open("pic:nvPicPr", &[])?;
        xml.empty("pic:cNvPr", &[("id", &doc_pr_id), ("name", &section.media.file_name)])?;
        xml.empty("pic:cNvPicPr", &[])?;
        xml.close("pic:nvPicPr")?;

        xml.open("pic:blipFill", &[])?;
        xml.empty("a:blip", &[("r:embed", &embed)])?;
        xml.open("a:stretch", &[])?;
        xml.empty("a:fillRect", &[])?;
        xml.close("a:stretch")?;
        xml.close("pic:blipFill")?;

        xml.open("pic:spPr", &[])?;
        xml.open("a:xfrm", &[])?;
        xml.empty("a:off", &[("x", "0"), ("y", "0")])?;
        xml.empty("a:ext", &[("cx", &cx), ("cy", &cy)])?;
        xml.close("a:xfrm")?;
        xml.open("a:prstGeom", &[("prst", "rect")])?;
        xml.empty("a:avLst", &[])?;
        xml.close("a:prstGeom")?;
        xml.close("pic:spPr")?;

        xml.close("pic:pic")?;
        xml.close("a:graphicData")?;
        xml.close("a:graphic")?;
        xml.close("wp:inline")?;
        xml.close("w:drawing")?;
        xml.close("w:r")?;
        xml.close("w:p")
    }

    fn document_xml(&self) -> Result<Vec<u8>> {
        let mut xml = Xml::new()?;
        xml.open("w:document", &[("xmlns:w", NS_W), ("xmlns:r", NS_R)])?;
        xml.open("w:body", &[])?;

        let last = self.sections.len().saturating_sub(1);
        for (index, section) in self.sections.iter().enumerate() {
            self.text_paragraph(&mut xml, &section.caption, false, self.layout.caption_size, false)?;
            self.drawing_paragraph(&mut xml, index, section)?;

            if index < last {
                // intermediate section break, carried by an empty paragraph
                xml.open("w:p", &[])?;
                xml.open("w:pPr", &[])?;
                self.section_properties(&mut xml, Some((index, section)))?;
                xml.close("w:pPr")?;
                xml.close("w:p")?;
            }
        }

        // the final (or only) section properties close the body
        self.section_properties(&mut xml, self.sections.last().map(|s| (last, s)))?;

        xml.close("w:body")?;
        xml.close("w:document")?;
        Ok(xml.finish())
    }

    fn content_types_xml(&self) -> Result<Vec<u8>> {
        let mut xml = Xml::new()?;
        xml.open("Types", &[("xmlns", NS_CT)])?;
        xml.empty(
            "Default",
            &[
                ("Extension", "rels"),
                ("ContentType", "application/vnd.openxmlformats-package.relationships+xml"),
            ],
        )?;
        xml.empty(
            "Default",
            &[("Extension", "xml"), ("ContentType", "application/xml")],
        )?;

        let extensions: BTreeSet<&'static str> = self
            .sections
            .iter()
            .map(|s| s.media.extension)
            .collect();
        for extension in extensions {
            let mime = match extension {
                "png" => "image/png",
                "jpeg" => "image/jpeg",
                "gif" => "image/gif",
                _ => continue,
            };
            xml.empty("Default", &[("Extension", extension), ("ContentType", mime)])?;
        }

        xml.empty(
            "Override",
            &[
                ("PartName", "/word/document.xml"),
                (
                    "ContentType",
                    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
                ),
            ],
        )?;

        if self.has_header(PageKind::First) {
            xml.empty(
                "Override",
                &[
                    ("PartName", "/word/header1.xml"),
                    (
                        "ContentType",
                        "application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml",
                    ),
                ],
            )?;
        }
        if self.has_header(PageKind::Subsequent) {
            xml.empty(
                "Override",
                &[
                    ("PartName", "/word/header2.xml"),
                    (
                        "ContentType",
                        "application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml",
                    ),
                ],
            )?;
        }
        for index in 0..self.sections.len() {
            let part = format!("/word/footer{}.xml", index + 1);
            xml.empty(
                "Override",
                &[
                    ("PartName", &part),
                    (
                        "ContentType",
                        "application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml",
                    ),
                ],
            )?;
        }

        xml.close("Types")?;
        Ok(xml.finish())
    }

    fn package_rels_xml(&self) -> Result<Vec<u8>> {
        let mut xml = Xml::new()?;
        xml.open("Relationships", &[("xmlns", NS_REL)])?;
        xml.empty(
            "Relationship",
            &[
                ("Id", "rId1"),
                ("Type", REL_OFFICE_DOCUMENT),
                ("Target", "word/document.xml"),
            ],
        )?;
        xml.close("Relationships")?;
        Ok(xml.finish())
    }

    fn document_rels_xml(&self) -> Result<Vec<u8>> {
        let mut xml = Xml::new()?;
        xml.open("Relationships", &[("xmlns", NS_REL)])?;

        if self.has_header(PageKind::First) {
            xml.empty(
                "Relationship",
                &[("Id", "rIdHdr1"), ("Type", REL_HEADER), ("Target", "header1.xml")],
            )?;
        }
        if self.has_header(PageKind::Subsequent) {
            xml.empty(
                "Relationship",
                &[("Id", "rIdHdr2"), ("Type", REL_HEADER), ("Target", "header2.xml")],
            )?;
        }

        for (index, section) in self.sections.iter().enumerate() {
            let footer_id = format!("rIdFtr{}", index + 1);
            let footer_target = format!("footer{}.xml", index + 1);
            xml.empty(
                "Relationship",
                &[("Id", &footer_id), ("Type", REL_FOOTER), ("Target", &footer_target)],
            )?;

            let image_id = format!("rIdImg{}", index + 1);
            let image_target = format!("media/{}", section.media.file_name);
            xml.empty(
                "Relationship",
                &[("Id", &image_id), ("Type", REL_IMAGE), ("Target", &image_target)],
            )?;
        }

        xml.close("Relationships")?;
        Ok(xml.finish())
    }
}

impl DocumentWriter for DocxWriter {
    fn add_page(&mut self, page: &ComposedPage) -> Result<()> {
        let index = self.sections.len();
        let media = prepare_media(&page.image, index)?;

        self.sections.push(Section {
            kind: page.kind,
            caption: page.caption.clone(),
            footer_text: format!("{} dari {}", page.number, page.total_pages),
            extent_emu: (pt_to_emu(page.fit.width), pt_to_emu(page.fit.height)),
            media,
        });
        Ok(())
    }

    fn finish(self: Box<Self>, out: &Path) -> Result<()> {
        let this = *self;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(&this.content_types_xml()?)?;

        zip.start_file("_rels/.rels", options)?;
        zip.write_all(&this.package_rels_xml()?)?;

        zip.start_file("word/document.xml", options)?;
        zip.write_all(&this.document_xml()?)?;

        zip.start_file("word/_rels/document.xml.rels", options)?;
        zip.write_all(&this.document_rels_xml()?)?;

        if this.has_header(PageKind::First) {
            zip.start_file("word/header1.xml", options)?;
            zip.write_all(&this.header_xml(PageKind::First)?)?;
        }
        if this.has_header(PageKind::Subsequent) {
            zip.start_file("word/header2.xml", options)?;
            zip.write_all(&this.header_xml(PageKind::Subsequent)?)?;
        }

        for (index, section) in this.sections.iter().enumerate() {
            let name = format!("word/footer{}.xml", index + 1);
            zip.start_file(name, options)?;
            zip.write_all(&this.footer_xml(&section.footer_text)?)?;
        }

        for section in &this.sections {
            let name = format!("word/media/{}", section.media.file_name);
            zip.start_file(name, options)?;
            zip.write_all(&section.media.bytes)?;
        }

        let buffer = zip.finish().context("finalizing DOCX package")?.into_inner();
        std::fs::write(out, buffer).with_context(|| format!("writing DOCX to {:?}", out))?;
        Ok(())
    }
}

/// Image part for one section. PNG/JPEG/GIF uploads are embedded as-is;
/// anything else (webp) is converted to PNG first, since Word cannot
/// display it.
fn prepare_media(
    image: &crate::services::compose::DecodedImage,
    index: usize,
) -> Result<Media> {
    let (extension, bytes) = match image.format {
        ImageFormat::Png => ("png", image.raw.clone()),
        ImageFormat::Jpeg => ("jpeg", image.raw.clone()),
        ImageFormat::Gif => ("gif", image.raw.clone()),
        _ => {
            let rgb = image.pixels.to_rgb8();
            let (width, height) = rgb.dimensions();
            let mut png = Vec::new();
            PngEncoder::new(&mut png)
                .write_image(rgb.as_raw(), width, height, image::ColorType::Rgb8)
                .context("PNG conversion failed")?;
            ("png", png)
        }
    };

    Ok(Media {
        file_name: format!("image{}.{}", index + 1, extension),
        extension,
        bytes,
    })
}
