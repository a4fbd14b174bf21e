use anyhow::{Result, anyhow};
use std::path::Path;

/// Image MIME types the composition pipeline can decode
pub const ALLOWED_IMAGE_MIME_TYPES: &[&str] =
    &["image/jpeg", "image/png", "image/gif", "image/webp"];

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<()> {
    if size == 0 {
        return Err(anyhow!(ValidationError {
            code: "EMPTY_FILE",
            message: "File appears to be empty".to_string(),
        }));
    }
    if size > max_size {
        return Err(anyhow!(ValidationError {
            code: "FILE_TOO_LARGE",
            message: format!(
                "File size {} bytes exceeds maximum allowed {} bytes ({} MB)",
                size,
                max_size,
                max_size / 1024 / 1024
            ),
        }));
    }
    Ok(())
}

/// Validates the claimed MIME type against the image allowlist
pub fn validate_image_mime_type(content_type: &str) -> Result<()> {
    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    if ALLOWED_IMAGE_MIME_TYPES
        .iter()
        .any(|&allowed| allowed == normalized)
    {
        return Ok(());
    }

    Err(anyhow!(ValidationError {
        code: "INVALID_MIME_TYPE",
        message: format!(
            "MIME type '{}' is not allowed. Only image uploads are permitted.",
            content_type
        ),
    }))
}

/// Verifies the actual bytes carry an allowed image signature
pub fn verify_image_magic_bytes(header: &[u8]) -> Result<()> {
    let detected = infer::get(header).map(|kind| kind.mime_type());

    match detected {
        Some(mime) if ALLOWED_IMAGE_MIME_TYPES.contains(&mime) => Ok(()),
        Some(mime) => Err(anyhow!(ValidationError {
            code: "NOT_AN_IMAGE",
            message: format!("File content detected as '{}', expected an image", mime),
        })),
        None => Err(anyhow!(ValidationError {
            code: "UNKNOWN_CONTENT",
            message: "File content does not match any supported image format".to_string(),
        })),
    }
}

/// Sanitizes filename to prevent path traversal and injection attacks
pub fn sanitize_filename(filename: &str) -> Result<String> {
    // Get only the filename component (remove any path)
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.is_empty() {
        return Err(anyhow!(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot be empty".to_string(),
        }));
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == '/'
                || c == '\\'
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Limit length safely for UTF-8
    let sanitized = if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    Ok(sanitized)
}

/// Replaces filesystem-unsafe characters in a suggested download filename.
pub fn sanitize_download_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '/' | '\\' | '?' | '%' | '*' | ':' | '|' | '"' | '<' | '>' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect()
}

/// Full validation pipeline for one uploaded image part
pub fn validate_image_upload(
    filename: &str,
    content_type: Option<&str>,
    bytes: &[u8],
    max_size: usize,
) -> Result<String> {
    // 1. Size check
    validate_file_size(bytes.len(), max_size)?;

    // 2. Sanitize filename
    let sanitized_filename = sanitize_filename(filename)?;

    // 3. MIME type check
    let mime = content_type.unwrap_or("application/octet-stream");
    validate_image_mime_type(mime)?;

    // 4. Magic bytes verification
    verify_image_magic_bytes(bytes)?;

    Ok(sanitized_filename)
}
