use crate::catalog::Gender;
use crate::generation::GeneratedImage;
use crate::llm::media::ImageUpload;

pub const MAX_APPROVED: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    #[default]
    Upload,
    Configure,
    Generate,
    Gallery,
}

impl Step {
    pub const fn previous(self) -> Option<Step> {
        match self {
            Step::Upload => None,
            Step::Configure => Some(Step::Upload),
            Step::Generate => Some(Step::Configure),
            Step::Gallery => Some(Step::Generate),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Step::Upload => "upload",
            Step::Configure => "configure",
            Step::Generate => "generate",
            Step::Gallery => "gallery",
        }
    }
}

/// The validated source photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub base64: String,
}

impl OriginalImage {
    /// `data:<mime>;base64,<data>`, usable wherever an image URL is expected.
    pub fn display_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

impl From<ImageUpload> for OriginalImage {
    fn from(upload: ImageUpload) -> Self {
        Self {
            bytes: upload.bytes,
            mime_type: upload.mime_type,
            base64: upload.base64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub step: Step,
    pub original_image: Option<OriginalImage>,
    pub gender: Option<Gender>,
    pub clothing: Option<String>,
    pub allow_glasses: bool,
    pub initial_generations: Vec<GeneratedImage>,
    pub approved_gallery: Vec<GeneratedImage>,
    pub variations: Vec<GeneratedImage>,
    pub is_loading: bool,
    pub loading_message: String,
    pub error: Option<String>,
    pub(crate) epoch: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn approved_count(&self) -> usize {
        self.approved_gallery.len()
    }

    pub fn gallery_is_full(&self) -> bool {
        self.approved_gallery.len() >= MAX_APPROVED
    }

    pub fn is_config_ready(&self) -> bool {
        self.original_image.is_some() && self.gender.is_some() && self.clothing.is_some()
    }

    /// Clears every field and invalidates in-flight work from the previous run.
    pub(crate) fn reset(&mut self) {
        let epoch = self.epoch.wrapping_add(1);
        *self = Session {
            epoch,
            ..Session::default()
        };
    }

    pub(crate) fn begin_loading(&mut self, message: &str) {
        self.is_loading = true;
        self.loading_message = message.to_string();
        self.error = None;
    }

    pub(crate) fn finish_loading(&mut self) {
        self.is_loading = false;
        self.loading_message.clear();
    }
}
