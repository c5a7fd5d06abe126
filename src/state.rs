use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use teloxide::types::MessageId;

use crate::generation::GenerationClient;
use crate::llm::gemini::GeminiBackend;
use crate::workflow::{Effect, Event, Session};

/// Which Telegram messages currently show this chat's wizard.
#[derive(Debug, Default)]
pub struct ChatView {
    pub panel: Option<MessageId>,
    /// Posted review cards: message id plus the caption/keyboard signature last sent.
    pub cards: HashMap<String, (MessageId, String)>,
    pub sent_downloads: HashSet<String>,
    pub preview_sent: bool,
}

#[derive(Debug, Default)]
pub struct ChatState {
    pub session: Session,
    pub view: ChatView,
}

#[derive(Clone)]
pub struct AppState {
    pub chats: Arc<Mutex<HashMap<i64, ChatState>>>,
    pub client: Arc<GenerationClient<GeminiBackend>>,
}

impl AppState {
    pub fn new(client: GenerationClient<GeminiBackend>) -> Self {
        AppState {
            chats: Arc::new(Mutex::new(HashMap::new())),
            client: Arc::new(client),
        }
    }

    /// Applies one event to the chat's session. The lock is released before returning.
    pub fn dispatch(&self, chat_id: i64, event: Event) -> Option<Effect> {
        let mut chats = self.chats.lock();
        let chat = chats.entry(chat_id).or_default();
        let resets = matches!(event, Event::NewProject);
        let new_photo = matches!(event, Event::UploadSubmitted { .. });
        let effect = chat.session.apply(event);
        if resets {
            chat.view.cards.clear();
            chat.view.sent_downloads.clear();
        }
        if resets || new_photo {
            chat.view.preview_sent = false;
        }
        effect
    }

    pub fn session(&self, chat_id: i64) -> Session {
        self.chats
            .lock()
            .get(&chat_id)
            .map(|chat| chat.session.clone())
            .unwrap_or_default()
    }

    pub fn with_view<T>(&self, chat_id: i64, f: impl FnOnce(&mut ChatView) -> T) -> T {
        let mut chats = self.chats.lock();
        f(&mut chats.entry(chat_id).or_default().view)
    }
}
