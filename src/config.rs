use std::env;

use anyhow::Result;
use once_cell::sync::Lazy;
use tracing::{info, warn};

use crate::catalog::VariationTier;

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub log_level: String,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_text_model: String,
    pub gemini_image_model: String,
    pub gemini_request_timeout_seconds: u64,
    pub variation_tiers: Vec<VariationTier>,
    pub upload_max_bytes: usize,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

const DEFAULT_VARIATION_TIERS: &str = "1,2";

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

/// Parses a comma separated list of tier numbers (`"1,2"`). Unknown entries are
/// skipped; duplicates keep their first position.
pub fn parse_variation_tiers(value: &str) -> Vec<VariationTier> {
    let mut tiers = Vec::new();
    for entry in value.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.parse::<u8>().ok().and_then(VariationTier::from_number) {
            Some(tier) if !tiers.contains(&tier) => tiers.push(tier),
            Some(_) => {}
            None => warn!("Ignoring unknown VARIATION_TIERS entry '{}'", entry),
        }
    }
    tiers
}

fn normalize_base_url(value: String) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return "https://generativelanguage.googleapis.com".to_string();
    }
    trimmed.to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        let bot_token = env::var("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(anyhow::anyhow!("BOT_TOKEN is required"));
        }

        let gemini_api_key = env_string("GEMINI_API_KEY", "");

        let mut variation_tiers =
            parse_variation_tiers(&env_string("VARIATION_TIERS", DEFAULT_VARIATION_TIERS));
        if variation_tiers.is_empty() {
            warn!("VARIATION_TIERS resolved to no tiers; using {}", DEFAULT_VARIATION_TIERS);
            variation_tiers = parse_variation_tiers(DEFAULT_VARIATION_TIERS);
        }

        Ok(Config {
            bot_token,
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            gemini_api_key,
            gemini_base_url: normalize_base_url(env_string(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com",
            )),
            gemini_text_model: env_string("GEMINI_TEXT_MODEL", "gemini-2.5-flash"),
            gemini_image_model: env_string("GEMINI_IMAGE_MODEL", "gemini-2.5-flash-image"),
            gemini_request_timeout_seconds: env_u64("GEMINI_REQUEST_TIMEOUT_SECONDS", 120),
            variation_tiers,
            upload_max_bytes: env_usize("UPLOAD_MAX_BYTES", 10 * 1024 * 1024),
        })
    }
}

impl Config {
    /// Logs the effective settings. Call after logging is initialised.
    pub fn log_summary(&self) {
        if self.gemini_api_key.trim().is_empty() {
            warn!("GEMINI_API_KEY is not set; every generation request will fail.");
        }
        let tiers: Vec<String> = self
            .variation_tiers
            .iter()
            .map(|tier| format!("{tier:?}"))
            .collect();
        info!(
            text_model = %self.gemini_text_model,
            image_model = %self.gemini_image_model,
            timeout_s = self.gemini_request_timeout_seconds,
            upload_max_bytes = self.upload_max_bytes,
            tiers = %tiers.join(","),
            "Starting portrait studio bot"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_tiers_in_order() {
        assert_eq!(
            parse_variation_tiers("1,2"),
            vec![VariationTier::Background, VariationTier::BackgroundAndPose]
        );
    }

    #[test]
    fn skips_unknown_and_duplicate_tiers() {
        assert_eq!(
            parse_variation_tiers(" 3, 9,3 ,x,1"),
            vec![VariationTier::BackgroundPoseAndClothing, VariationTier::Background]
        );
    }

    #[test]
    fn trailing_slash_is_removed_from_base_url() {
        assert_eq!(
            normalize_base_url("https://example.test/".to_string()),
            "https://example.test"
        );
        assert_eq!(
            normalize_base_url("  ".to_string()),
            "https://generativelanguage.googleapis.com"
        );
    }
}
