use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{info, warn};

use crate::catalog::{
    compose_portrait_prompt, validation_prompt, Gender, VariationTier, ALTERNATE_ANGLE_SUFFIX,
};
use crate::generation::error::GenerationError;
use crate::generation::types::{GeneratedImage, ImageStatus, ValidationVerdict};

pub const VALIDATION_UNAVAILABLE_REASON: &str =
    "Não foi possível analisar a imagem devido a um erro na API.";

/// Wire-level access to the hosted multimodal model.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Sends the image with a text instruction and returns the model's raw text answer.
    async fn classify_image(
        &self,
        image_base64: &str,
        prompt: &str,
    ) -> Result<String, GenerationError>;

    /// Sends the image with an editing prompt. `Ok(None)` means the service answered
    /// without an image part.
    async fn render_image(
        &self,
        image_base64: &str,
        prompt: &str,
    ) -> Result<Option<String>, GenerationError>;

    fn image_model(&self) -> &str;
}

pub struct GenerationClient<B> {
    backend: B,
    variation_tiers: Vec<VariationTier>,
}

fn parse_verdict(text: &str) -> Result<ValidationVerdict, GenerationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::MalformedResponse(
            "empty validation response".to_string(),
        ));
    }
    serde_json::from_str::<ValidationVerdict>(trimmed)
        .map_err(|err| GenerationError::MalformedResponse(err.to_string()))
}

impl<B: GenerationBackend> GenerationClient<B> {
    pub fn new(backend: B, variation_tiers: Vec<VariationTier>) -> Self {
        Self {
            backend,
            variation_tiers,
        }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn try_validate(
        &self,
        image_base64: &str,
        allow_glasses: bool,
    ) -> Result<ValidationVerdict, GenerationError> {
        let prompt = validation_prompt(allow_glasses);
        let text = self.backend.classify_image(image_base64, &prompt).await?;
        parse_verdict(&text)
    }

    /// Never fails: any transport or schema problem becomes a rejected verdict.
    pub async fn validate(&self, image_base64: &str, allow_glasses: bool) -> ValidationVerdict {
        match self.try_validate(image_base64, allow_glasses).await {
            Ok(verdict) => {
                info!(
                    is_valid = verdict.is_valid,
                    allow_glasses, "Image validation completed"
                );
                verdict
            }
            Err(err) => {
                warn!("Image validation failed: {}", err);
                ValidationVerdict::rejected(VALIDATION_UNAVAILABLE_REASON)
            }
        }
    }

    pub async fn generate_image(
        &self,
        image_base64: &str,
        prompt: &str,
    ) -> Result<String, GenerationError> {
        match self.backend.render_image(image_base64, prompt).await? {
            Some(data) if !data.trim().is_empty() => Ok(data),
            _ => Err(GenerationError::NoImageProduced {
                model: self.backend.image_model().to_string(),
            }),
        }
    }

    pub async fn generate_initial_portraits(
        &self,
        image_base64: &str,
        gender: Gender,
        clothing_key: &str,
    ) -> Result<Vec<GeneratedImage>, GenerationError> {
        let prompt = compose_portrait_prompt(gender, clothing_key);
        let alternate_prompt = format!("{prompt}{ALTERNATE_ANGLE_SUFFIX}");

        let (first, second) = tokio::try_join!(
            self.generate_image(image_base64, &prompt),
            self.generate_image(image_base64, &alternate_prompt)
        )?;

        info!(gender = %gender, clothing = clothing_key, "Generated initial portraits");
        Ok(vec![
            GeneratedImage::new(first, prompt, ImageStatus::Pending, false),
            GeneratedImage::new(second, alternate_prompt, ImageStatus::Pending, false),
        ])
    }

    /// One call per approved image and configured tier, all in flight at once.
    /// The first failure fails the batch and drops the remaining requests.
    pub async fn generate_variations(
        &self,
        approved: &[GeneratedImage],
    ) -> Result<Vec<GeneratedImage>, GenerationError> {
        let tiers = &self.variation_tiers;
        let calls = approved.iter().flat_map(move |image| {
            tiers.iter().map(move |tier| async move {
                let prompt = tier.prompt();
                let data = self.generate_image(&image.image_data, prompt).await?;
                Ok::<_, GenerationError>(GeneratedImage::new(
                    data,
                    prompt.to_string(),
                    ImageStatus::Approved,
                    true,
                ))
            })
        });

        let variations = try_join_all(calls).await?;
        info!(
            approved = approved.len(),
            tiers = tiers.len(),
            generated = variations.len(),
            "Generated variations"
        );
        Ok(variations)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::catalog::{PROMPT_MASCULINO_VARIANT, PROMPT_VARIATION_TYPE_1, PROMPT_VARIATION_TYPE_2};
    use crate::generation::testing::ScriptedBackend;

    fn client(backend: ScriptedBackend) -> GenerationClient<ScriptedBackend> {
        GenerationClient::new(
            backend,
            vec![VariationTier::Background, VariationTier::BackgroundAndPose],
        )
    }

    fn approved(data: &str) -> GeneratedImage {
        GeneratedImage::new(data.to_string(), "p".into(), ImageStatus::Approved, false)
    }

    #[tokio::test]
    async fn validate_passes_through_service_verdict() {
        let client = client(ScriptedBackend::with_verdict(false, "Mais de uma pessoa"));
        let verdict = client.validate("AAAA", false).await;
        assert!(!verdict.is_valid);
        assert_eq!(verdict.reason, "Mais de uma pessoa");
    }

    #[tokio::test]
    async fn validate_fails_closed_on_transport_error() {
        let client = client(ScriptedBackend::with_classify_reply(Err(
            GenerationError::Transport("connection reset".into()),
        )));
        let verdict = client.validate("AAAA", true).await;
        assert!(!verdict.is_valid);
        assert_eq!(verdict.reason, VALIDATION_UNAVAILABLE_REASON);
    }

    #[tokio::test]
    async fn malformed_validation_payload_is_reported() {
        let client = client(ScriptedBackend::with_classify_reply(Ok(
            "Sure! The image looks fine.".into(),
        )));
        let err = client.try_validate("AAAA", false).await.unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));

        let verdict = client.validate("AAAA", false).await;
        assert!(!verdict.is_valid);
    }

    #[tokio::test]
    async fn missing_image_part_is_no_image_produced() {
        let client = client(ScriptedBackend::without_images());
        let err = client.generate_image("AAAA", "prompt").await.unwrap_err();
        assert_eq!(
            err,
            GenerationError::NoImageProduced {
                model: "scripted-image".into()
            }
        );
    }

    #[tokio::test]
    async fn initial_portraits_are_two_pending_images_with_distinct_ids() {
        let client = client(ScriptedBackend::new());
        let images = client
            .generate_initial_portraits("AAAA", Gender::Homem, "terno_azul_camisa_branca")
            .await
            .unwrap();

        assert_eq!(images.len(), 2);
        assert!(images
            .iter()
            .all(|image| image.status == ImageStatus::Pending && !image.is_variation));
        assert_ne!(images[0].id, images[1].id);
        assert!(images[0].prompt.contains("Terno Azul, Camisa Branca"));
        assert!(images[0].prompt.contains(PROMPT_MASCULINO_VARIANT));
        assert!(images[1].prompt.ends_with(ALTERNATE_ANGLE_SUFFIX));
        assert_eq!(client.backend().render_count(), 2);
        let sent: HashSet<String> = client.backend().rendered_prompts().into_iter().collect();
        let stored: HashSet<String> = images.iter().map(|image| image.prompt.clone()).collect();
        assert_eq!(sent, stored);
    }

    #[tokio::test]
    async fn one_failing_portrait_call_fails_the_whole_batch() {
        let client = client(ScriptedBackend::new().failing_on_render(1));
        let result = client
            .generate_initial_portraits("AAAA", Gender::Mulher, "social_preto")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn variations_cover_every_approved_image_and_tier() {
        let client = client(ScriptedBackend::new());
        let approved = vec![approved("one"), approved("two"), approved("three")];
        let variations = client.generate_variations(&approved).await.unwrap();

        assert_eq!(variations.len(), 6);
        assert!(variations
            .iter()
            .all(|image| image.status == ImageStatus::Approved && image.is_variation));
        let ids: HashSet<_> = variations.iter().map(|image| image.id.clone()).collect();
        assert_eq!(ids.len(), 6);
        assert_eq!(variations[0].prompt, PROMPT_VARIATION_TYPE_1);
        assert_eq!(variations[1].prompt, PROMPT_VARIATION_TYPE_2);

        let inputs = client.backend().rendered_inputs();
        for data in ["one", "two", "three"] {
            assert_eq!(inputs.iter().filter(|input| input.as_str() == data).count(), 2);
        }
    }

    #[tokio::test]
    async fn variation_tiers_are_configurable() {
        let client = GenerationClient::new(
            ScriptedBackend::new(),
            vec![VariationTier::BackgroundPoseAndClothing],
        );
        let variations = client.generate_variations(&[approved("one")]).await.unwrap();
        assert_eq!(variations.len(), 1);
        assert_eq!(
            variations[0].prompt,
            VariationTier::BackgroundPoseAndClothing.prompt()
        );
    }

    #[tokio::test]
    async fn failing_variation_call_returns_no_partial_results() {
        let client = client(ScriptedBackend::new().failing_on_render(3));
        let result = client
            .generate_variations(&[approved("one"), approved("two")])
            .await;
        assert!(result.is_err());
    }
}
