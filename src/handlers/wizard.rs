use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ReplyParameters};
use tracing::{info, warn};

use crate::handlers::media::fetch_upload;
use crate::handlers::responses::refresh_chat;
use crate::llm::media::{ImageUpload, UploadError};
use crate::state::AppState;
use crate::utils::telegram::start_loading_indicator;
use crate::utils::timing::start_action_timer;
use crate::views::{WizardAction, MAX_APPROVED_NOTICE};
use crate::workflow::{execute, Effect, Event, Step};

const HELP_TEXT: &str = "Estúdio de Retratos Profissionais com IA

1. Envie uma foto sua (como foto ou arquivo de imagem).
2. Escolha o gênero e o estilo de roupa.
3. Aprove até 5 retratos gerados.
4. Baixe seus favoritos e gere variações.

Comandos:
/start - Mostra o passo atual
/novo - Começa um novo projeto
/voltar - Volta ao passo anterior
/help - Mostra esta ajuda";

const UPLOAD_ELSEWHERE_HINT: &str =
    "A foto só pode ser enviada no Passo 1. Use /novo para começar um novo projeto.";

fn effect_chat_action(effect: &Effect) -> ChatAction {
    match effect {
        Effect::Validate { .. } => ChatAction::Typing,
        Effect::GenerateInitial { .. } | Effect::GenerateVariations { .. } => {
            ChatAction::UploadPhoto
        }
    }
}

/// Runs an effect outside the session lock and folds its completion back in.
async fn run_effect(bot: &Bot, state: &AppState, chat_id: ChatId, effect: Effect) -> Result<()> {
    let _indicator = start_loading_indicator(bot.clone(), chat_id, effect_chat_action(&effect));
    let completion = execute(&state.client, effect).await;
    if let Some(follow_up) = state.dispatch(chat_id.0, completion) {
        warn!("Completion produced an unexpected effect: {:?}", follow_up);
    }
    refresh_chat(bot, state, chat_id).await
}

/// A started effect always runs; a failed panel refresh before it is only logged.
async fn apply_and_run(bot: &Bot, state: &AppState, chat_id: ChatId, event: Event) -> Result<()> {
    let Some(effect) = state.dispatch(chat_id.0, event) else {
        return refresh_chat(bot, state, chat_id).await;
    };
    if let Err(err) = refresh_chat(bot, state, chat_id).await {
        warn!(chat_id = chat_id.0, "Could not show the loading panel: {err:#}");
    }
    run_effect(bot, state, chat_id, effect).await
}

/// The glasses choice is read here, after the download, not when the photo arrived.
fn upload_event(state: &AppState, chat_id: ChatId, fetched: Result<ImageUpload, UploadError>) -> Event {
    match fetched {
        Ok(upload) => Event::UploadSubmitted {
            upload,
            allow_glasses: state.session(chat_id.0).allow_glasses,
        },
        Err(err) => Event::UploadFailed(err),
    }
}

pub async fn start_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    let step = state.session(message.chat.id.0).step;
    let _timer = start_action_timer("start", message.chat.id.0, step.as_str());
    state.with_view(message.chat.id.0, |view| view.panel = None);
    refresh_chat(&bot, &state, message.chat.id).await
}

pub async fn help_handler(bot: Bot, message: Message) -> Result<()> {
    bot.send_message(message.chat.id, HELP_TEXT)
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;
    Ok(())
}

pub async fn new_project_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    let step = state.session(message.chat.id.0).step;
    let _timer = start_action_timer("new_project", message.chat.id.0, step.as_str());
    info!(chat_id = message.chat.id.0, "Starting a new project");
    state.with_view(message.chat.id.0, |view| view.panel = None);
    apply_and_run(&bot, &state, message.chat.id, Event::NewProject).await
}

pub async fn back_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    let step = state.session(message.chat.id.0).step;
    let _timer = start_action_timer("go_back", message.chat.id.0, step.as_str());
    apply_and_run(&bot, &state, message.chat.id, Event::GoBack).await
}

pub async fn upload_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    let chat_id = message.chat.id;
    let session = state.session(chat_id.0);
    let mut timer = start_action_timer("upload", chat_id.0, session.step.as_str());

    if session.is_loading {
        timer.mark_status("ignored", Some("loading".to_string()));
        return Ok(());
    }
    if session.step != Step::Upload {
        timer.mark_status("ignored", Some(session.step.as_str().to_string()));
        bot.send_message(chat_id, UPLOAD_ELSEWHERE_HINT)
            .reply_parameters(ReplyParameters::new(message.id))
            .await?;
        return Ok(());
    }

    let fetched = {
        let _indicator = start_loading_indicator(bot.clone(), chat_id, ChatAction::UploadPhoto);
        fetch_upload(&bot, &message).await
    };
    if let Err(err) = &fetched {
        timer.mark_status("rejected", Some(err.to_string()));
    }
    let event = upload_event(&state, chat_id, fetched);
    apply_and_run(&bot, &state, chat_id, event).await
}

pub async fn callback_handler(bot: Bot, state: AppState, query: CallbackQuery) -> Result<()> {
    let Some(data) = query.data.as_deref() else {
        return Ok(());
    };
    let Some(chat_id) = query.message.as_ref().map(|message| message.chat().id) else {
        bot.answer_callback_query(query.id.clone()).await?;
        return Ok(());
    };
    let Some(action) = WizardAction::decode(data) else {
        warn!("Unknown callback data: {}", data);
        bot.answer_callback_query(query.id.clone()).await?;
        return Ok(());
    };

    let session = state.session(chat_id.0);
    let mut timer = start_action_timer(data, chat_id.0, session.step.as_str());

    let answer = bot.answer_callback_query(query.id.clone());
    let answer = if matches!(action, WizardAction::Approve(_)) && session.gallery_is_full() {
        timer.mark_status("ignored", Some("gallery full".to_string()));
        answer.text(MAX_APPROVED_NOTICE)
    } else if session.is_loading && !matches!(action, WizardAction::NewProject) {
        timer.mark_status("ignored", Some("loading".to_string()));
        answer.text(session.loading_message.clone())
    } else {
        answer
    };
    if let Err(err) = answer.await {
        warn!("answer_callback_query failed: {err}");
    }

    if matches!(action, WizardAction::NewProject) {
        state.with_view(chat_id.0, |view| view.panel = None);
    }
    apply_and_run(&bot, &state, chat_id, action.into_event()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::generation::GenerationClient;
    use crate::llm::GeminiBackend;
    use crate::workflow::machine::LOADING_VALIDATING;

    const UNREACHABLE: &str = "http://127.0.0.1:9";

    fn offline_bot() -> Bot {
        let url = reqwest::Url::parse(&format!("{UNREACHABLE}/")).unwrap();
        Bot::new("123456:offline").set_api_url(url)
    }

    fn offline_state() -> AppState {
        let config = Config {
            bot_token: "123456:offline".into(),
            log_level: "info".into(),
            gemini_api_key: String::new(),
            gemini_base_url: UNREACHABLE.into(),
            gemini_text_model: "text-model".into(),
            gemini_image_model: "image-model".into(),
            gemini_request_timeout_seconds: 5,
            variation_tiers: Vec::new(),
            upload_max_bytes: 1024,
        };
        AppState::new(GenerationClient::new(
            GeminiBackend::from_config(&config),
            config.variation_tiers.clone(),
        ))
    }

    fn jpeg() -> ImageUpload {
        ImageUpload::from_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0], Some("image/jpeg"), 1024).unwrap()
    }

    #[tokio::test]
    async fn failed_panel_send_still_finishes_the_effect() {
        let bot = offline_bot();
        let state = offline_state();
        let chat_id = ChatId(7);

        let event = Event::UploadSubmitted {
            upload: jpeg(),
            allow_glasses: false,
        };
        let _ = apply_and_run(&bot, &state, chat_id, event).await;

        let session = state.session(chat_id.0);
        assert!(!session.is_loading);
        assert_eq!(session.step, Step::Upload);
        assert!(session
            .error
            .as_deref()
            .is_some_and(|err| err.starts_with("A validação falhou")));

        assert!(state.dispatch(chat_id.0, Event::ToggleGlasses).is_none());
        assert!(state.session(chat_id.0).allow_glasses);
    }

    #[tokio::test]
    async fn edge_upload_failure_sets_the_step_error() {
        let bot = offline_bot();
        let state = offline_state();
        let chat_id = ChatId(8);

        let event = Event::UploadFailed(UploadError::TooLarge {
            size: 30 * 1024 * 1024,
            limit: 10 * 1024 * 1024,
        });
        let _ = apply_and_run(&bot, &state, chat_id, event).await;

        let session = state.session(chat_id.0);
        assert!(!session.is_loading);
        assert_eq!(session.step, Step::Upload);
        assert_eq!(
            session.error.as_deref(),
            Some("A imagem excede o tamanho máximo de 10 MB.")
        );
    }

    #[test]
    fn upload_uses_the_glasses_choice_at_dispatch_time() {
        let state = offline_state();
        let chat_id = ChatId(9);
        state.dispatch(chat_id.0, Event::ToggleGlasses);

        let Event::UploadSubmitted { allow_glasses, .. } = upload_event(&state, chat_id, Ok(jpeg()))
        else {
            panic!("expected an upload submission");
        };
        assert!(allow_glasses);

        let effect = state.dispatch(chat_id.0, upload_event(&state, chat_id, Ok(jpeg())));
        assert!(matches!(
            effect,
            Some(Effect::Validate {
                allow_glasses: true,
                ..
            })
        ));
        assert_eq!(state.session(chat_id.0).loading_message, LOADING_VALIDATING);
    }
}
