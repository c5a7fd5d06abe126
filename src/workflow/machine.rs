use tracing::{debug, info, warn};

use crate::catalog::{find_clothing, Gender};
use crate::generation::{GeneratedImage, GenerationError, ImageStatus, ValidationVerdict};
use crate::llm::media::{ImageUpload, UploadError};
use crate::workflow::session::{Session, Step};

pub const LOADING_VALIDATING: &str = "Validando imagem...";
pub const LOADING_INITIAL: &str = "Gerando retratos iniciais...";
pub const LOADING_VARIATIONS: &str = "Criando variações...";

pub const ERROR_READ_FAILED: &str = "Falha ao ler o arquivo.";
pub const ERROR_NOT_AN_IMAGE: &str = "O arquivo enviado não é uma imagem.";
pub const ERROR_INITIAL_FAILED: &str =
    "Falha ao gerar os retratos iniciais. Por favor, tente novamente.";
pub const ERROR_VARIATIONS_FAILED: &str = "Falha ao gerar variações.";

#[derive(Debug, Clone)]
pub enum Event {
    ToggleGlasses,
    UploadSubmitted {
        upload: ImageUpload,
        allow_glasses: bool,
    },
    UploadFailed(UploadError),
    UploadValidated {
        epoch: u64,
        upload: ImageUpload,
        verdict: ValidationVerdict,
    },
    SelectGender(Gender),
    SelectClothing(String),
    SubmitConfig,
    PortraitsGenerated {
        epoch: u64,
        result: Result<Vec<GeneratedImage>, GenerationError>,
    },
    Approve(String),
    Reject(String),
    CompleteReview,
    RequestVariations,
    VariationsGenerated {
        epoch: u64,
        result: Result<Vec<GeneratedImage>, GenerationError>,
    },
    GoBack,
    NewProject,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::ToggleGlasses => "toggle_glasses",
            Event::UploadSubmitted { .. } => "upload_submitted",
            Event::UploadFailed(_) => "upload_failed",
            Event::UploadValidated { .. } => "upload_validated",
            Event::SelectGender(_) => "select_gender",
            Event::SelectClothing(_) => "select_clothing",
            Event::SubmitConfig => "submit_config",
            Event::PortraitsGenerated { .. } => "portraits_generated",
            Event::Approve(_) => "approve",
            Event::Reject(_) => "reject",
            Event::CompleteReview => "complete_review",
            Event::RequestVariations => "request_variations",
            Event::VariationsGenerated { .. } => "variations_generated",
            Event::GoBack => "go_back",
            Event::NewProject => "new_project",
        }
    }
}

/// Network work requested by a transition. The result comes back as the matching
/// completion event carrying the same epoch.
#[derive(Debug, Clone)]
pub enum Effect {
    Validate {
        epoch: u64,
        upload: ImageUpload,
        allow_glasses: bool,
    },
    GenerateInitial {
        epoch: u64,
        image_base64: String,
        gender: Gender,
        clothing: String,
    },
    GenerateVariations {
        epoch: u64,
        approved: Vec<GeneratedImage>,
    },
}

fn upload_error_message(err: &UploadError) -> String {
    match err {
        UploadError::Read(_) => ERROR_READ_FAILED.to_string(),
        UploadError::UnsupportedType(_) => ERROR_NOT_AN_IMAGE.to_string(),
        UploadError::TooLarge { limit, .. } => format!(
            "A imagem excede o tamanho máximo de {} MB.",
            (limit / (1024 * 1024)).max(1)
        ),
    }
}

impl Session {
    /// Applies one event. Every field change for the event happens inside this call.
    pub fn apply(&mut self, event: Event) -> Option<Effect> {
        debug!(event = event.name(), step = self.step.as_str(), "Applying workflow event");
        match event {
            Event::NewProject => {
                self.reset();
                None
            }
            Event::UploadValidated {
                epoch,
                upload,
                verdict,
            } => {
                if !self.accepts_completion(epoch) {
                    return None;
                }
                self.finish_loading();
                if verdict.is_valid {
                    self.original_image = Some(upload.into());
                    self.step = Step::Configure;
                } else {
                    self.error = Some(format!("A validação falhou: {}", verdict.reason));
                }
                None
            }
            Event::PortraitsGenerated { epoch, result } => {
                if !self.accepts_completion(epoch) {
                    return None;
                }
                self.finish_loading();
                match result {
                    Ok(images) => {
                        self.initial_generations = images;
                        self.step = Step::Generate;
                    }
                    Err(err) => {
                        warn!("Initial portrait generation failed: {}", err);
                        self.error = Some(ERROR_INITIAL_FAILED.to_string());
                    }
                }
                None
            }
            Event::VariationsGenerated { epoch, result } => {
                if !self.accepts_completion(epoch) {
                    return None;
                }
                self.finish_loading();
                match result {
                    Ok(images) => self.variations.extend(images),
                    Err(err) => {
                        warn!("Variation generation failed: {}", err);
                        self.error = Some(ERROR_VARIATIONS_FAILED.to_string());
                    }
                }
                None
            }
            _ if self.is_loading => {
                debug!(event = event.name(), "Ignoring event while loading");
                None
            }
            Event::ToggleGlasses => {
                if self.step == Step::Upload {
                    self.allow_glasses = !self.allow_glasses;
                }
                None
            }
            Event::UploadSubmitted {
                upload,
                allow_glasses,
            } => {
                if self.step != Step::Upload {
                    return None;
                }
                self.begin_loading(LOADING_VALIDATING);
                Some(Effect::Validate {
                    epoch: self.epoch,
                    upload,
                    allow_glasses,
                })
            }
            Event::UploadFailed(err) => {
                if self.step == Step::Upload {
                    info!("Upload rejected at the edge: {}", err);
                    self.error = Some(upload_error_message(&err));
                }
                None
            }
            Event::SelectGender(gender) => {
                if self.step == Step::Configure {
                    self.gender = Some(gender);
                    self.clothing = None;
                }
                None
            }
            Event::SelectClothing(key) => {
                if self.step != Step::Configure {
                    return None;
                }
                if let Some(gender) = self.gender {
                    if find_clothing(gender, &key).is_some() {
                        self.clothing = Some(key);
                    }
                }
                None
            }
            Event::SubmitConfig => self.submit_config(),
            Event::Approve(id) => {
                self.approve(&id);
                None
            }
            Event::Reject(id) => {
                self.reject(&id);
                None
            }
            Event::CompleteReview => {
                if self.step == Step::Generate && !self.approved_gallery.is_empty() {
                    self.step = Step::Gallery;
                }
                None
            }
            Event::RequestVariations => {
                if self.step != Step::Gallery || self.approved_gallery.is_empty() {
                    return None;
                }
                self.begin_loading(LOADING_VARIATIONS);
                Some(Effect::GenerateVariations {
                    epoch: self.epoch,
                    approved: self.approved_gallery.clone(),
                })
            }
            Event::GoBack => {
                if let Some(previous) = self.step.previous() {
                    self.step = previous;
                    self.error = None;
                }
                None
            }
        }
    }

    fn accepts_completion(&self, epoch: u64) -> bool {
        if epoch != self.epoch || !self.is_loading {
            debug!(
                epoch,
                current = self.epoch,
                "Dropping completion from a stale run"
            );
            return false;
        }
        true
    }

    fn submit_config(&mut self) -> Option<Effect> {
        if self.step != Step::Configure {
            return None;
        }
        let (Some(original), Some(gender), Some(clothing)) =
            (&self.original_image, self.gender, &self.clothing)
        else {
            return None;
        };
        let effect = Effect::GenerateInitial {
            epoch: self.epoch,
            image_base64: original.base64.clone(),
            gender,
            clothing: clothing.clone(),
        };
        self.begin_loading(LOADING_INITIAL);
        Some(effect)
    }

    fn approve(&mut self, id: &str) {
        if self.step != Step::Generate || self.gallery_is_full() {
            return;
        }
        let Some(entry) = self
            .initial_generations
            .iter_mut()
            .find(|image| image.id == id && image.status == ImageStatus::Pending)
        else {
            return;
        };
        entry.status = ImageStatus::Approved;
        self.approved_gallery.push(entry.with_status(ImageStatus::Approved));
    }

    fn reject(&mut self, id: &str) {
        if self.step != Step::Generate {
            return;
        }
        if let Some(entry) = self
            .initial_generations
            .iter_mut()
            .find(|image| image.id == id && image.status == ImageStatus::Pending)
        {
            entry.status = ImageStatus::Rejected;
        }
    }
}
