use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::FileId;
use tracing::debug;

use crate::config::CONFIG;
use crate::llm::media::{download_media, ImageUpload, UploadError};

pub async fn get_file_url(bot: &Bot, file_id: &FileId) -> Result<String> {
    let file = bot.get_file(file_id.clone()).await?;
    Ok(format!(
        "https://api.telegram.org/file/bot{}/{}",
        CONFIG.bot_token,
        file.path
    ))
}

struct IncomingFile {
    id: FileId,
    size: usize,
    declared_mime: Option<String>,
}

fn incoming_file(message: &Message) -> Option<IncomingFile> {
    if let Some(largest) = message.photo().and_then(|sizes| sizes.last()) {
        return Some(IncomingFile {
            id: largest.file.id.clone(),
            size: largest.file.size as usize,
            declared_mime: Some("image/jpeg".to_string()),
        });
    }

    message.document().map(|document| IncomingFile {
        id: document.file.id.clone(),
        size: document.file.size as usize,
        declared_mime: document
            .mime_type
            .as_ref()
            .map(|mime| mime.essence_str().to_string()),
    })
}

pub fn message_has_upload(message: &Message) -> bool {
    message.photo().is_some() || message.document().is_some()
}

/// Downloads the photo or document attached to `message` and runs the edge checks.
pub async fn fetch_upload(bot: &Bot, message: &Message) -> Result<ImageUpload, UploadError> {
    let Some(file) = incoming_file(message) else {
        return Err(UploadError::Read("message has no file".to_string()));
    };

    let limit = CONFIG.upload_max_bytes;
    if file.size > limit {
        return Err(UploadError::TooLarge {
            size: file.size,
            limit,
        });
    }
    if let Some(mime) = &file.declared_mime {
        if !mime.starts_with("image/") && mime != "application/octet-stream" {
            return Err(UploadError::UnsupportedType(mime.clone()));
        }
    }

    let url = get_file_url(bot, &file.id)
        .await
        .map_err(|err| UploadError::Read(err.to_string()))?;
    let bytes = download_media(&url).await?;
    debug!(
        bytes = bytes.len(),
        declared = file.declared_mime.as_deref().unwrap_or("none"),
        "Downloaded upload"
    );
    ImageUpload::from_bytes(bytes, file.declared_mime.as_deref(), limit)
}
