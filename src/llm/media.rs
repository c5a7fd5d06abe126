use std::io::Cursor;

use base64::{engine::general_purpose, Engine as _};
use tracing::warn;

use crate::utils::http::get_http_client;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("Failed to read the uploaded file: {0}")]
    Read(String),
    #[error("Uploaded file is not an image (type: {0})")]
    UnsupportedType(String),
    #[error("Uploaded file is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
}

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub fn normalize_image_mime(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => lowered,
    }
}

pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type.trim().to_ascii_lowercase().starts_with("image/")
}

/// Sniffs the MIME type of a base64 payload from its first bytes.
pub fn mime_for_base64(data: &str) -> String {
    // 64 base64 chars decode to 48 bytes, enough for every signature `infer` checks here.
    let prefix: String = data.chars().filter(|c| !c.is_whitespace()).take(64).collect();
    general_purpose::STANDARD
        .decode(prefix.as_bytes())
        .ok()
        .and_then(|bytes| detect_mime_type(&bytes))
        .filter(|mime| is_image_mime(mime))
        .map(|mime| normalize_image_mime(&mime))
        .unwrap_or_else(|| "image/jpeg".to_string())
}

/// A user photo that passed the edge checks and is ready to be sent for validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub base64: String,
}

impl ImageUpload {
    pub fn from_bytes(
        bytes: Vec<u8>,
        declared_mime: Option<&str>,
        max_bytes: usize,
    ) -> Result<Self, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Read("file is empty".to_string()));
        }
        if bytes.len() > max_bytes {
            return Err(UploadError::TooLarge {
                size: bytes.len(),
                limit: max_bytes,
            });
        }

        let declared = declared_mime
            .map(normalize_image_mime)
            .filter(|mime| !mime.is_empty());
        let sniffed = detect_mime_type(&bytes);
        let mime_type = match (declared, sniffed) {
            (Some(declared), _) if is_image_mime(&declared) => declared,
            (_, Some(sniffed)) if is_image_mime(&sniffed) => normalize_image_mime(&sniffed),
            (declared, sniffed) => {
                let seen = declared
                    .or(sniffed)
                    .unwrap_or_else(|| "unknown".to_string());
                return Err(UploadError::UnsupportedType(seen));
            }
        };

        let base64 = general_purpose::STANDARD.encode(&bytes);
        Ok(Self {
            bytes,
            mime_type,
            base64,
        })
    }
}

/// Returns PNG bytes for a generated image. Payloads that are already PNG, or that
/// cannot be decoded, are passed through untouched.
pub fn png_for_download(image_base64: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let bytes = general_purpose::STANDARD.decode(image_base64.trim())?;
    if detect_mime_type(&bytes).as_deref() == Some("image/png") {
        return Ok(bytes);
    }

    let decoded = match image::load_from_memory(&bytes) {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!("Could not decode generated image for PNG conversion: {}", err);
            return Ok(bytes);
        }
    };

    let mut output = Cursor::new(Vec::new());
    match decoded.write_to(&mut output, image::ImageFormat::Png) {
        Ok(()) => Ok(output.into_inner()),
        Err(err) => {
            warn!("PNG conversion failed: {}", err);
            Ok(bytes)
        }
    }
}

pub async fn download_media(url: &str) -> Result<Vec<u8>, UploadError> {
    let client = get_http_client();
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| UploadError::Read(err.without_url().to_string()))?;

    if !response.status().is_success() {
        return Err(UploadError::Read(format!(
            "download failed with status {}",
            response.status()
        )));
    }

    response
        .bytes()
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|err| UploadError::Read(err.without_url().to_string()))
}
