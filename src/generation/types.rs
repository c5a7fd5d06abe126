use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Pending,
    Approved,
    Rejected,
}

impl ImageStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ImageStatus::Pending => "Pendente",
            ImageStatus::Approved => "Aprovado",
            ImageStatus::Rejected => "Rejeitado",
        }
    }
}

/// One unit of generated output: the base64 payload plus the prompt that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub id: String,
    pub image_data: String,
    pub prompt: String,
    pub status: ImageStatus,
    pub is_variation: bool,
}

impl GeneratedImage {
    pub fn new(image_data: String, prompt: String, status: ImageStatus, is_variation: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            image_data,
            prompt,
            status,
            is_variation,
        }
    }

    pub fn with_status(&self, status: ImageStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(8) {
            Some((index, _)) => &self.id[..index],
            None => &self.id,
        }
    }

    pub fn download_file_name(&self) -> String {
        format!("portrait-{}.png", self.short_id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ValidationVerdict {
    pub is_valid: bool,
    pub reason: String,
}

impl ValidationVerdict {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_name_uses_first_eight_id_chars() {
        let mut image = GeneratedImage::new("AAAA".into(), "p".into(), ImageStatus::Approved, false);
        image.id = "0123456789abcdef".to_string();
        assert_eq!(image.download_file_name(), "portrait-01234567.png");

        image.id = "abc".to_string();
        assert_eq!(image.download_file_name(), "portrait-abc.png");
    }

    #[test]
    fn fresh_images_get_distinct_ids() {
        let a = GeneratedImage::new("x".into(), "p".into(), ImageStatus::Pending, false);
        let b = GeneratedImage::new("x".into(), "p".into(), ImageStatus::Pending, false);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn verdict_requires_both_fields() {
        let parsed: ValidationVerdict =
            serde_json::from_str(r#"{"isValid": true, "reason": ""}"#).unwrap();
        assert!(parsed.is_valid);
        assert!(serde_json::from_str::<ValidationVerdict>(r#"{"isValid": true}"#).is_err());
        assert!(serde_json::from_str::<ValidationVerdict>(r#"{"isValid": "yes", "reason": ""}"#).is_err());
    }
}
