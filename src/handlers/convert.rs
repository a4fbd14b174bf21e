use crate::api::error::AppError;
use crate::models::{OrderMetadata, OutputFormat, UploadedImage};
use crate::services::assembler;
use crate::services::cleanup::TempFileTracker;
use crate::services::ordering::{self, sort_key};
use crate::utils::validation::{ValidationError, validate_image_upload};
use axum::{
    body::Body,
    extract::{Multipart, State},
    http::{StatusCode, header},
    response::Response,
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use validator::Validate;

#[utoipa::path(
    post,
    path = "/convert/pdf",
    request_body(
        content = Vec<u8>,
        content_type = "multipart/form-data",
        description = "Order metadata fields plus one or more `images` file parts"
    ),
    responses(
        (status = 200, description = "Generated PDF document stream"),
        (status = 400, description = "Missing metadata or non-image upload"),
        (status = 500, description = "Document generation failed")
    ),
    tag = "convert"
)]
pub async fn convert_pdf(
    State(state): State<crate::AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    convert(state, multipart, OutputFormat::Pdf).await
}

#[utoipa::path(
    post,
    path = "/convert/docx",
    request_body(
        content = Vec<u8>,
        content_type = "multipart/form-data",
        description = "Order metadata fields plus one or more `images` file parts"
    ),
    responses(
        (status = 200, description = "Generated DOCX document stream"),
        (status = 400, description = "Missing metadata or non-image upload"),
        (status = 500, description = "Document generation failed")
    ),
    tag = "convert"
)]
pub async fn convert_docx(
    State(state): State<crate::AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    convert(state, multipart, OutputFormat::Docx).await
}

async fn convert(
    state: crate::AppState,
    multipart: Multipart,
    format: OutputFormat,
) -> Result<Response, AppError> {
    let mut tracker = TempFileTracker::new();
    let result = run_pipeline(&state, multipart, format, &mut tracker).await;

    // Every temp path is removed exactly once, wherever the pipeline stopped.
    tracker.cleanup().await;

    result
}

/// Raw multipart text fields, collected before validation.
#[derive(Default)]
struct MetadataFields {
    ko_number: Option<String>,
    order_date: Option<String>,
    assignment: Option<String>,
    confirmation_date: Option<String>,
    image_ratio: Option<String>,
    small_image_ratio: Option<String>,
}

impl MetadataFields {
    fn set(&mut self, name: &str, value: String) {
        match name {
            "koNumber" => self.ko_number = Some(value),
            "orderDate" => self.order_date = Some(value),
            "assignment" => self.assignment = Some(value),
            "confirmationDate" => self.confirmation_date = Some(value),
            "imageRatio" => self.image_ratio = Some(value),
            "smallImageRatio" => self.small_image_ratio = Some(value),
            other => tracing::debug!("Ignoring unknown form field '{}'", other),
        }
    }

    fn into_metadata(self) -> Result<OrderMetadata, AppError> {
        let metadata = OrderMetadata {
            ko_number: self.ko_number.unwrap_or_default(),
            order_date: self.order_date.unwrap_or_default(),
            assignment: self.assignment.unwrap_or_default(),
            confirmation_date: self.confirmation_date.unwrap_or_default(),
            image_ratio: parse_ratio("imageRatio", self.image_ratio)?,
            small_image_ratio: parse_ratio("smallImageRatio", self.small_image_ratio)?,
        };

        metadata
            .validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        Ok(metadata)
    }
}

fn parse_ratio(name: &str, raw: Option<String>) -> Result<Option<f64>, AppError> {
    match raw {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("{} must be a number", name))),
    }
}

async fn run_pipeline(
    state: &crate::AppState,
    mut multipart: Multipart,
    format: OutputFormat,
    tracker: &mut TempFileTracker,
) -> Result<Response, AppError> {
    let mut fields = MetadataFields::default();
    let mut images: Vec<UploadedImage> = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "images" {
            let original_filename = field.file_name().unwrap_or("unnamed").to_string();
            let content_type = field.content_type().map(|s| s.to_string());
            let bytes = field.bytes().await?;

            let sanitized = validate_image_upload(
                &original_filename,
                content_type.as_deref(),
                &bytes,
                state.config.max_file_size,
            )
            .map_err(|e| {
                let too_large = e
                    .downcast_ref::<ValidationError>()
                    .is_some_and(|v| v.code == "FILE_TOO_LARGE");
                if too_large {
                    AppError::PayloadTooLarge(e.to_string())
                } else {
                    AppError::BadRequest(e.to_string())
                }
            })?;

            // probe before the bytes leave memory; failures surface later as
            // a skipped page, never as a rejected request
            let dimensions = probe_dimensions(&bytes);
            if dimensions.is_none() {
                tracing::warn!(file = %original_filename, "Could not read image dimensions");
            }

            let stored_path = state.storage.store_upload(&sanitized, &bytes).await?;
            tracker.register(stored_path.clone());

            images.push(UploadedImage {
                stored_path,
                sort_key: sort_key(&original_filename),
                original_filename,
                dimensions,
            });
        } else {
            fields.set(&name, field.text().await?);
        }
    }

    let meta = fields.into_metadata()?;

    ordering::sort_images(&mut images);

    let output_path = state.storage.output_path(format.extension());
    tracker.register(output_path.clone());

    let config = state.config.clone();
    let build_meta = meta.clone();
    let build_images = images.clone();
    let build_path = output_path.clone();
    let document = tokio::task::spawn_blocking(move || {
        assembler::build_document(&config, format, &build_images, &build_meta, &build_path)
    })
    .await
    .map_err(|e| AppError::Internal(format!("document build task failed: {}", e)))??;

    // The document is complete before a single response byte is produced.
    let bytes = tokio::fs::read(&document.output_path).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, document.mime_type)
        .header(
            header::CONTENT_DISPOSITION,
            attachment_disposition(&document.filename),
        )
        .header(header::CONTENT_LENGTH, bytes.len())
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(format!("failed to build response: {}", e)))
}

fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::io::Reader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Content-Disposition with an ASCII fallback plus an RFC 5987 encoded name.
fn attachment_disposition(filename: &str) -> String {
    let ascii_filename = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\' && *c != ';')
        .take(128)
        .collect::<String>();
    let fallback_filename = if ascii_filename.is_empty() {
        "file"
    } else {
        &ascii_filename
    };

    let encoded_filename = utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback_filename, encoded_filename
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_disposition() {
        let value = attachment_disposition("001-X - Lampiran Design Tes.pdf");
        assert!(value.starts_with("attachment; filename=\"001-X - Lampiran Design Tes.pdf\""));
        assert!(value.contains("filename*=UTF-8''"));
    }

    #[test]
    fn test_parse_ratio() {
        assert_eq!(parse_ratio("imageRatio", None).unwrap(), None);
        assert_eq!(parse_ratio("imageRatio", Some("".to_string())).unwrap(), None);
        assert_eq!(
            parse_ratio("imageRatio", Some("1.5".to_string())).unwrap(),
            Some(1.5)
        );
        assert!(parse_ratio("imageRatio", Some("abc".to_string())).is_err());
    }

    #[test]
    fn test_missing_fields_rejected() {
        let fields = MetadataFields {
            ko_number: Some("001".to_string()),
            ..Default::default()
        };
        assert!(fields.into_metadata().is_err());
    }

    #[test]
    fn test_probe_dimensions() {
        let mut png = Vec::new();
        image::DynamicImage::new_rgb8(12, 7)
            .write_to(
                &mut std::io::Cursor::new(&mut png),
                image::ImageOutputFormat::Png,
            )
            .unwrap();
        assert_eq!(probe_dimensions(&png), Some((12, 7)));
        assert_eq!(probe_dimensions(b"not an image"), None);
    }
}
