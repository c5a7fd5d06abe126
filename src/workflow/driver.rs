use tracing::debug;

use crate::generation::{GenerationBackend, GenerationClient};
use crate::workflow::machine::{Effect, Event};

/// Runs the network work behind an effect and returns the completion event for it.
/// Must be called without holding the session lock.
pub async fn execute<B: GenerationBackend>(client: &GenerationClient<B>, effect: Effect) -> Event {
    match effect {
        Effect::Validate {
            epoch,
            upload,
            allow_glasses,
        } => {
            debug!(epoch, mime = %upload.mime_type, "Running validation");
            let verdict = client.validate(&upload.base64, allow_glasses).await;
            Event::UploadValidated {
                epoch,
                upload,
                verdict,
            }
        }
        Effect::GenerateInitial {
            epoch,
            image_base64,
            gender,
            clothing,
        } => {
            debug!(epoch, %gender, clothing = %clothing, "Running initial generation");
            let result = client
                .generate_initial_portraits(&image_base64, gender, &clothing)
                .await;
            Event::PortraitsGenerated { epoch, result }
        }
        Effect::GenerateVariations { epoch, approved } => {
            debug!(epoch, approved = approved.len(), "Running variation generation");
            let result = client.generate_variations(&approved).await;
            Event::VariationsGenerated { epoch, result }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Gender, VariationTier};
    use crate::generation::testing::ScriptedBackend;
    use crate::generation::ImageStatus;
    use crate::llm::media::ImageUpload;
    use crate::workflow::machine::{ERROR_INITIAL_FAILED, ERROR_VARIATIONS_FAILED};
    use crate::workflow::session::{Session, Step};

    fn client(backend: ScriptedBackend) -> GenerationClient<ScriptedBackend> {
        GenerationClient::new(
            backend,
            vec![VariationTier::Background, VariationTier::BackgroundAndPose],
        )
    }

    async fn drive(
        session: &mut Session,
        client: &GenerationClient<ScriptedBackend>,
        event: Event,
    ) {
        if let Some(effect) = session.apply(event) {
            let completion = execute(client, effect).await;
            session.apply(completion);
        }
    }

    fn upload() -> ImageUpload {
        ImageUpload::from_bytes(b"\x89PNG\r\n\x1a\n0000".to_vec(), Some("image/png"), 1024)
            .unwrap()
    }

    async fn run_to_gallery(client: &GenerationClient<ScriptedBackend>) -> Session {
        let mut session = Session::new();
        drive(
            &mut session,
            client,
            Event::UploadSubmitted {
                upload: upload(),
                allow_glasses: false,
            },
        )
        .await;
        assert_eq!(session.step, Step::Configure);
        drive(&mut session, client, Event::SelectGender(Gender::Mulher)).await;
        drive(&mut session, client, Event::SelectClothing("brilho_sutil".into())).await;
        drive(&mut session, client, Event::SubmitConfig).await;
        assert_eq!(session.step, Step::Generate);

        let id = session.initial_generations[0].id.clone();
        drive(&mut session, client, Event::Approve(id)).await;
        drive(&mut session, client, Event::CompleteReview).await;
        assert_eq!(session.step, Step::Gallery);
        session
    }

    #[tokio::test]
    async fn full_run_produces_pending_portraits_and_variations() {
        let client = client(ScriptedBackend::new());
        let mut session = run_to_gallery(&client).await;

        assert_eq!(session.initial_generations.len(), 2);
        assert_eq!(session.initial_generations[1].status, ImageStatus::Pending);
        assert!(session
            .initial_generations
            .iter()
            .all(|image| !image.is_variation));

        drive(&mut session, &client, Event::RequestVariations).await;
        assert_eq!(session.variations.len(), 2);
        assert!(session
            .variations
            .iter()
            .all(|image| image.is_variation && image.status == ImageStatus::Approved));
        assert!(!session.is_loading);
        assert!(session.error.is_none());
    }

    #[tokio::test]
    async fn validation_rejection_is_surfaced() {
        let client = client(ScriptedBackend::with_verdict(false, "Rosto coberto"));
        let mut session = Session::new();
        drive(
            &mut session,
            &client,
            Event::UploadSubmitted {
                upload: upload(),
                allow_glasses: true,
            },
        )
        .await;
        assert_eq!(session.step, Step::Upload);
        assert_eq!(
            session.error.as_deref(),
            Some("A validação falhou: Rosto coberto")
        );
    }

    #[tokio::test]
    async fn unreadable_verdict_fails_closed() {
        let client = client(ScriptedBackend::with_classify_reply(Ok("not json".into())));
        let mut session = Session::new();
        drive(
            &mut session,
            &client,
            Event::UploadSubmitted {
                upload: upload(),
                allow_glasses: false,
            },
        )
        .await;
        assert_eq!(session.step, Step::Upload);
        assert!(session.original_image.is_none());
        assert!(session
            .error
            .as_deref()
            .is_some_and(|error| error.starts_with("A validação falhou: ")));
    }

    #[tokio::test]
    async fn one_failed_initial_call_discards_both() {
        let client = client(ScriptedBackend::new().failing_on_render(1));
        let mut session = Session::new();
        drive(
            &mut session,
            &client,
            Event::UploadSubmitted {
                upload: upload(),
                allow_glasses: false,
            },
        )
        .await;
        drive(&mut session, &client, Event::SelectGender(Gender::Homem)).await;
        drive(
            &mut session,
            &client,
            Event::SelectClothing("terno_bege_camisa_preta".into()),
        )
        .await;
        drive(&mut session, &client, Event::SubmitConfig).await;

        assert_eq!(session.step, Step::Configure);
        assert!(session.initial_generations.is_empty());
        assert_eq!(session.error.as_deref(), Some(ERROR_INITIAL_FAILED));
    }

    #[tokio::test]
    async fn one_failed_variation_discards_the_batch() {
        // Calls 0 and 1 are the initial pair; 3 is the second variation.
        let client = client(ScriptedBackend::new().failing_on_render(3));
        let mut session = run_to_gallery(&client).await;

        drive(&mut session, &client, Event::RequestVariations).await;
        assert!(session.variations.is_empty());
        assert_eq!(session.error.as_deref(), Some(ERROR_VARIATIONS_FAILED));
        assert!(!session.is_loading);
    }

    #[tokio::test]
    async fn completion_after_reset_is_ignored() {
        let client = client(ScriptedBackend::new());
        let mut session = run_to_gallery(&client).await;

        let effect = session
            .apply(Event::RequestVariations)
            .expect("variations effect");
        session.apply(Event::NewProject);
        let completion = execute(&client, effect).await;
        session.apply(completion);

        assert_eq!(session, {
            let mut fresh = Session::new();
            fresh.epoch = session.epoch();
            fresh
        });
    }
}
