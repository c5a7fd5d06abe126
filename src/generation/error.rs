#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("Generation request failed: {0}")]
    Transport(String),
    #[error("Generation service returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Malformed response from generation service: {0}")]
    MalformedResponse(String),
    #[error("No image returned by the generation service (model: {model})")]
    NoImageProduced { model: String },
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GenerationError::MalformedResponse(err.to_string())
        } else {
            GenerationError::Transport(err.to_string())
        }
    }
}
