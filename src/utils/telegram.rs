use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatAction;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Telegram clears a chat action after about five seconds.
const LOADING_INDICATOR_INTERVAL: Duration = Duration::from_secs(4);

/// Keeps "sending photo..." (or "typing...") visible while a generation call runs.
/// Stops when dropped.
pub struct LoadingIndicator {
    chat_id: ChatId,
    task_handle: Option<JoinHandle<()>>,
}

impl Drop for LoadingIndicator {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
            debug!(chat_id = self.chat_id.0, "Loading indicator stopped");
        }
    }
}

pub fn start_loading_indicator(bot: Bot, chat_id: ChatId, action: ChatAction) -> LoadingIndicator {
    let task_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(LOADING_INDICATOR_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(err) = bot.send_chat_action(chat_id, action.clone()).await {
                warn!(chat_id = chat_id.0, "send_chat_action failed: {err}");
            }
        }
    });

    LoadingIndicator {
        chat_id,
        task_handle: Some(task_handle),
    }
}
