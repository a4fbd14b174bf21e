use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use lampiran_backend::config::AppConfig;
use lampiran_backend::services::storage::TempStorage;
use lampiran_backend::{AppState, create_app};
use std::io::{Cursor, Read};
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "---------------------------123456789012345678901234567";

fn test_app(dir: &tempfile::TempDir) -> Router {
    let config = AppConfig::development(dir.path().to_path_buf());
    let storage = Arc::new(TempStorage::new(config.upload_dir.clone()));

    create_app(AppState { config, storage })
}

fn png_bytes(width: u32, height: u32, shade: u8) -> Vec<u8> {
    let mut pixels = image::RgbImage::new(width, height);
    for pixel in pixels.pixels_mut() {
        *pixel = image::Rgb([shade, shade, 128]);
    }
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(pixels)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .unwrap();
    bytes
}

fn jpeg_bytes(width: u32, height: u32, shade: u8) -> Vec<u8> {
    let mut pixels = image::RgbImage::new(width, height);
    for pixel in pixels.pixels_mut() {
        *pixel = image::Rgb([shade, 64, 64]);
    }
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(pixels)
        .write_to(
            &mut Cursor::new(&mut bytes),
            image::ImageOutputFormat::Jpeg(90),
        )
        .unwrap();
    bytes
}

struct MultipartBuilder {
    body: Vec<u8>,
}

impl MultipartBuilder {
    fn new() -> Self {
        Self { body: Vec::new() }
    }

    fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    fn file(mut self, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn build(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

fn standard_fields(builder: MultipartBuilder) -> MultipartBuilder {
    builder
        .text("koNumber", "001/X")
        .text("orderDate", "2024-05-01")
        .text("assignment", "Test")
        .text("confirmationDate", "2024-05-03")
}

async fn post_convert(app: Router, path: &str, body: Vec<u8>) -> (StatusCode, Vec<u8>, String) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let disposition = response
        .headers()
        .get("content-disposition")
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec(), disposition)
}

fn three_image_body() -> Vec<u8> {
    // uploaded out of order on purpose; the numeric prefix decides
    standard_fields(MultipartBuilder::new())
        .file("2_b.jpg", "image/jpeg", &jpeg_bytes(640, 480, 10))
        .file("1_a.jpg", "image/jpeg", &jpeg_bytes(800, 600, 90))
        .file("3_c.jpg", "image/jpeg", &jpeg_bytes(320, 240, 200))
        .build()
}

fn dir_is_empty(dir: &tempfile::TempDir) -> bool {
    std::fs::read_dir(dir.path()).unwrap().next().is_none()
}

#[tokio::test]
async fn test_convert_pdf_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let (status, body, disposition) = post_convert(app, "/convert/pdf", three_image_body()).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with(b"%PDF"));
    assert!(disposition.contains("001-X - Lampiran Design Test.pdf"));

    let doc = lopdf::Document::load_mem(&body).unwrap();
    assert_eq!(doc.get_pages().len(), 3);

    // first page: extended header, metadata block, first caption
    let page1 = doc.extract_text(&[1]).unwrap();
    assert!(page1.contains("Konfirmasi Order"));
    assert!(page1.contains("No. KO : 001/X"));
    assert!(page1.contains("Tanggal Order : 01-05-2024"));
    assert!(page1.contains("Design : Test"));
    assert!(page1.contains("Lampiran Design"));
    assert!(page1.contains("1. 1_a"));
    assert!(page1.contains("1 dari 3 halaman"));

    // later pages: simplified header, `.-` caption separator
    let page2 = doc.extract_text(&[2]).unwrap();
    assert!(page2.contains("Konfirmasi Order"));
    assert!(!page2.contains("No. KO"));
    assert!(!page2.contains("Lampiran Design"));
    assert!(page2.contains("2.- 2_b"));
    assert!(page2.contains("2 dari 3 halaman"));

    let page3 = doc.extract_text(&[3]).unwrap();
    assert!(page3.contains("3.- 3_c"));
    assert!(page3.contains("3 dari 3 halaman"));

    // every temp file is gone once the response is built
    assert!(dir_is_empty(&dir));
}

#[tokio::test]
async fn test_convert_docx_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let body = standard_fields(MultipartBuilder::new())
        .file("2_b.png", "image/png", &png_bytes(640, 480, 10))
        .file("1_a.png", "image/png", &png_bytes(800, 600, 90))
        .file("3_c.png", "image/png", &png_bytes(320, 240, 200))
        .build();
    let (status, body, disposition) = post_convert(app, "/convert/docx", body).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with(b"PK"));
    assert!(disposition.contains("001-X - Lampiran Design Test.docx"));

    let mut archive = zip::ZipArchive::new(Cursor::new(body)).unwrap();

    let document = read_zip_entry(&mut archive, "word/document.xml");
    let first = document.find("1. 1_a").unwrap();
    let second = document.find("2.- 2_b").unwrap();
    let third = document.find("3.- 3_c").unwrap();
    assert!(first < second && second < third);
    assert_eq!(document.matches("<w:sectPr>").count(), 3);

    // DOCX footers have no "halaman" suffix
    let footer2 = read_zip_entry(&mut archive, "word/footer2.xml");
    assert!(footer2.contains("2 dari 3"));
    assert!(!footer2.contains("halaman"));

    let header1 = read_zip_entry(&mut archive, "word/header1.xml");
    assert!(header1.contains("No. KO : 001/X"));
    let header2 = read_zip_entry(&mut archive, "word/header2.xml");
    assert!(!header2.contains("No. KO"));

    for name in ["image1.png", "image2.png", "image3.png"] {
        assert!(archive.by_name(&format!("word/media/{}", name)).is_ok());
    }

    assert!(dir_is_empty(&dir));
}

fn read_zip_entry(archive: &mut zip::ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
    let mut entry = archive.by_name(name).unwrap();
    let mut content = String::new();
    entry.read_to_string(&mut content).unwrap();
    content
}

#[tokio::test]
async fn test_identical_requests_produce_identical_documents() {
    let dir = tempfile::tempdir().unwrap();

    let (status_a, first, _) =
        post_convert(test_app(&dir), "/convert/pdf", three_image_body()).await;
    let (status_b, second, _) =
        post_convert(test_app(&dir), "/convert/pdf", three_image_body()).await;

    assert_eq!(status_a, StatusCode::OK);
    assert_eq!(status_b, StatusCode::OK);
    assert_eq!(first, second);

    let (_, first_docx, _) =
        post_convert(test_app(&dir), "/convert/docx", three_image_body()).await;
    let (_, second_docx, _) =
        post_convert(test_app(&dir), "/convert/docx", three_image_body()).await;
    assert_eq!(first_docx, second_docx);
}

#[tokio::test]
async fn test_corrupt_image_skipped_request_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    // valid PNG signature and header, body chopped off: passes upload
    // validation, fails to decode during composition
    let mut corrupt = png_bytes(100, 100, 50);
    corrupt.truncate(40);

    let body = standard_fields(MultipartBuilder::new())
        .file("1_a.png", "image/png", &png_bytes(800, 600, 90))
        .file("2_b.png", "image/png", &corrupt)
        .file("3_c.png", "image/png", &png_bytes(320, 240, 200))
        .build();
    let (status, body, _) = post_convert(app, "/convert/pdf", body).await;

    assert_eq!(status, StatusCode::OK);

    let doc = lopdf::Document::load_mem(&body).unwrap();
    assert_eq!(doc.get_pages().len(), 2);

    // the denominator still counts the dropped file; preserved behavior
    let last = doc.extract_text(&[2]).unwrap();
    assert!(last.contains("3 dari 3 halaman"));

    // the corrupt upload is cleaned up with everything else
    assert!(dir_is_empty(&dir));
}

#[tokio::test]
async fn test_no_images_produces_document_shell() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let body = standard_fields(MultipartBuilder::new()).build();
    let (status, body, _) = post_convert(app, "/convert/pdf", body).await;

    assert_eq!(status, StatusCode::OK);
    let doc = lopdf::Document::load_mem(&body).unwrap();
    assert_eq!(doc.get_pages().len(), 0);
}

#[tokio::test]
async fn test_image_ratio_override_changes_geometry() {
    let dir = tempfile::tempdir().unwrap();

    let body = standard_fields(MultipartBuilder::new())
        .text("imageRatio", "2.0")
        .file("1_a.png", "image/png", &png_bytes(800, 600, 90))
        .build();
    let (status, with_ratio, _) = post_convert(test_app(&dir), "/convert/pdf", body).await;
    assert_eq!(status, StatusCode::OK);

    let body = standard_fields(MultipartBuilder::new())
        .file("1_a.png", "image/png", &png_bytes(800, 600, 90))
        .build();
    let (_, without_ratio, _) = post_convert(test_app(&dir), "/convert/pdf", body).await;

    // same pixels, different declared placement size
    assert_ne!(with_ratio, without_ratio);
}

#[tokio::test]
async fn test_missing_metadata_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let body = MultipartBuilder::new()
        .text("koNumber", "001/X")
        .file("1_a.png", "image/png", &png_bytes(100, 100, 10))
        .build();
    let (status, body, _) = post_convert(app, "/convert/pdf", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].is_string());

    // rejected uploads must not leak temp files either
    assert!(dir_is_empty(&dir));
}

#[tokio::test]
async fn test_non_image_upload_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let body = standard_fields(MultipartBuilder::new())
        .file("notes.txt", "text/plain", b"these are not pixels")
        .build();
    let (status, _, _) = post_convert(app, "/convert/pdf", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(dir_is_empty(&dir));
}

#[tokio::test]
async fn test_invalid_ratio_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let body = standard_fields(MultipartBuilder::new())
        .text("imageRatio", "-1.0")
        .file("1_a.png", "image/png", &png_bytes(100, 100, 10))
        .build();
    let (status, _, _) = post_convert(app, "/convert/pdf", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["storage"], "ready");
}
