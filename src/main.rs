use std::error::Error;

use dotenvy::dotenv;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::error;

mod catalog;
mod config;
mod generation;
mod handlers;
mod llm;
mod state;
mod utils;
mod views;
mod workflow;

use config::Config;
use generation::GenerationClient;
use handlers::media::message_has_upload;
use handlers::wizard;
use llm::GeminiBackend;
use state::AppState;
use utils::logging::init_logging;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    Start,
    Help,
    Novo,
    Voltar,
}

type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

#[tokio::main]
async fn main() -> HandlerResult {
    dotenv().ok();
    let config = Config::load()?;
    let _guards = init_logging(&config.log_level);
    config.log_summary();

    let bot = Bot::new(config.bot_token.clone());
    let client = GenerationClient::new(
        GeminiBackend::from_config(&config),
        config.variation_tiers.clone(),
    );
    let state = AppState::new(client);

    let command_handler = dptree::entry()
        .filter_command::<Command>()
        .endpoint(handle_command);

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(dptree::filter(|msg: Message| message_has_upload(&msg)).endpoint(handle_upload))
        .endpoint(ignore_message);

    let callback_handler = Update::filter_callback_query().endpoint(handle_callback_query);

    let handler = dptree::entry()
        .branch(message_handler)
        .branch(callback_handler);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(
    bot: Bot,
    state: AppState,
    message: Message,
    command: Command,
) -> HandlerResult {
    match command {
        Command::Help => wizard::help_handler(bot, message).await?,
        Command::Start => wizard::start_handler(bot, state, message).await?,
        Command::Novo => {
            tokio::spawn(async move {
                if let Err(err) = wizard::new_project_handler(bot, state, message).await {
                    error!("new project handler failed: {err}");
                }
            });
        }
        Command::Voltar => wizard::back_handler(bot, state, message).await?,
    }
    Ok(())
}

async fn handle_upload(bot: Bot, state: AppState, message: Message) -> HandlerResult {
    tokio::spawn(async move {
        if let Err(err) = wizard::upload_handler(bot, state, message).await {
            error!("upload handler failed: {err}");
        }
    });
    Ok(())
}

async fn handle_callback_query(bot: Bot, state: AppState, query: CallbackQuery) -> HandlerResult {
    tokio::spawn(async move {
        if let Err(err) = wizard::callback_handler(bot, state, query).await {
            error!("wizard callback failed: {err}");
        }
    });
    Ok(())
}

async fn ignore_message(_message: Message) -> HandlerResult {
    Ok(())
}
