use std::time::Duration;

use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId};
use teloxide::{ApiError, RequestError};
use tracing::{debug, warn};

use crate::llm::media::png_for_download;
use crate::state::AppState;
use crate::views::{render, Button, DownloadItem, ImageCard};
use crate::workflow::Step;

fn keyboard(rows: &[Vec<Button>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|button| InlineKeyboardButton::callback(button.label.clone(), button.action.encode()))
            .collect::<Vec<_>>()
    }))
}

fn card_signature(card: &ImageCard) -> String {
    let actions: Vec<String> = card
        .buttons
        .iter()
        .map(|button| button.action.encode())
        .collect();
    format!("{}|{}", card.caption, actions.join(","))
}

fn decode_data_url(url: &str) -> Option<Vec<u8>> {
    let (_, data) = url.strip_prefix("data:")?.split_once(";base64,")?;
    general_purpose::STANDARD.decode(data).ok()
}

fn is_not_modified(err: &RequestError) -> bool {
    matches!(err, RequestError::Api(ApiError::MessageNotModified))
}

async fn edit_text_with_retry(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    text: &str,
    markup: InlineKeyboardMarkup,
) -> Result<(), RequestError> {
    let mut delay = Duration::from_secs_f32(1.5);
    for attempt in 0..3 {
        let request = bot
            .edit_message_text(chat_id, message_id, text.to_string())
            .reply_markup(markup.clone());

        match request.await {
            Ok(_) => return Ok(()),
            Err(err) if is_not_modified(&err) => return Ok(()),
            Err(err @ RequestError::Api(_)) => return Err(err),
            Err(err) => {
                if attempt == 2 {
                    return Err(err);
                }
                warn!("edit_message_text failed: {err}");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }

    Ok(())
}

async fn sync_cards(bot: &Bot, state: &AppState, chat_id: ChatId, cards: &[ImageCard]) -> bool {
    let mut sent_new = false;
    for card in cards {
        let signature = card_signature(card);
        let posted = state.with_view(chat_id.0, |view| view.cards.get(&card.image_id).cloned());
        match posted {
            Some((_, previous)) if previous == signature => {}
            Some((message_id, _)) => {
                let result = bot
                    .edit_message_caption(chat_id, message_id)
                    .caption(card.caption.clone())
                    .reply_markup(keyboard(std::slice::from_ref(&card.buttons)))
                    .await;
                match result {
                    Ok(_) => {}
                    Err(err) if is_not_modified(&err) => {}
                    Err(err) => {
                        warn!("Failed to update review card {}: {}", card.image_id, err);
                        continue;
                    }
                }
                state.with_view(chat_id.0, |view| {
                    view.cards
                        .insert(card.image_id.clone(), (message_id, signature));
                });
            }
            None => {
                let bytes = match general_purpose::STANDARD.decode(card.image_data.trim()) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        warn!("Generated image {} is not valid base64: {}", card.image_id, err);
                        continue;
                    }
                };
                let result = bot
                    .send_photo(chat_id, InputFile::memory(bytes))
                    .caption(card.caption.clone())
                    .reply_markup(keyboard(std::slice::from_ref(&card.buttons)))
                    .await;
                match result {
                    Ok(sent) => {
                        sent_new = true;
                        state.with_view(chat_id.0, |view| {
                            view.cards
                                .insert(card.image_id.clone(), (sent.id, signature));
                        });
                    }
                    Err(err) => warn!("Failed to send review card {}: {}", card.image_id, err),
                }
            }
        }
    }
    sent_new
}

async fn send_preview(bot: &Bot, state: &AppState, chat_id: ChatId, preview: &str) -> bool {
    if state.with_view(chat_id.0, |view| view.preview_sent) {
        return false;
    }
    let Some(bytes) = decode_data_url(preview) else {
        warn!("Uploaded photo preview is not a base64 data URL");
        return false;
    };
    match bot
        .send_photo(chat_id, InputFile::memory(bytes))
        .caption("Sua foto enviada")
        .await
    {
        Ok(_) => {
            state.with_view(chat_id.0, |view| view.preview_sent = true);
            true
        }
        Err(err) => {
            warn!("Failed to send uploaded photo preview: {}", err);
            false
        }
    }
}

async fn send_downloads(
    bot: &Bot,
    state: &AppState,
    chat_id: ChatId,
    downloads: &[DownloadItem],
) -> bool {
    let mut sent_new = false;
    for item in downloads {
        let already_sent =
            state.with_view(chat_id.0, |view| view.sent_downloads.contains(&item.image_id));
        if already_sent {
            continue;
        }
        let bytes = match png_for_download(&item.image_data) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("Generated image {} is not valid base64: {}", item.image_id, err);
                continue;
            }
        };
        let result = bot
            .send_document(chat_id, InputFile::memory(bytes).file_name(item.file_name.clone()))
            .caption(item.caption.clone())
            .await;
        match result {
            Ok(_) => {
                sent_new = true;
                state.with_view(chat_id.0, |view| {
                    view.sent_downloads.insert(item.image_id.clone());
                });
            }
            Err(err) => warn!("Failed to send {}: {}", item.file_name, err),
        }
    }
    sent_new
}

/// Brings the chat's messages in line with the current session: posts or updates
/// review cards, sends new gallery files, then edits or reposts the panel.
pub async fn refresh_chat(bot: &Bot, state: &AppState, chat_id: ChatId) -> Result<()> {
    let session = state.session(chat_id.0);
    let view = render(&session);

    let mut sent_new = false;
    match session.step {
        Step::Generate => sent_new |= sync_cards(bot, state, chat_id, &view.cards).await,
        Step::Gallery => sent_new |= send_downloads(bot, state, chat_id, &view.downloads).await,
        Step::Configure => {
            if let Some(preview) = &view.preview {
                sent_new |= send_preview(bot, state, chat_id, preview).await;
            }
        }
        Step::Upload => {}
    }

    let text = view.text();
    let markup = keyboard(&view.buttons);
    let panel = state.with_view(chat_id.0, |chat_view| chat_view.panel);

    if let (Some(message_id), false) = (panel, sent_new) {
        match edit_text_with_retry(bot, chat_id, message_id, &text, markup.clone()).await {
            Ok(()) => return Ok(()),
            Err(err) => debug!("Panel edit failed, posting a new one: {err}"),
        }
    }

    let sent = bot
        .send_message(chat_id, text)
        .reply_markup(markup)
        .await?;
    state.with_view(chat_id.0, |chat_view| chat_view.panel = Some(sent.id));

    if let Some(old) = panel {
        if let Err(err) = bot.delete_message(chat_id, old).await {
            debug!("Could not delete old panel: {err}");
        }
    }
    Ok(())
}
