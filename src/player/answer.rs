//! Answer service
//!
//! Questions are answered by an external language model. The player only
//! sees the [`AnswerService`] trait; [`OllamaAnswerService`] talks to a local
//! Ollama server over HTTP.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Request sent to an answer service
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerRequest {
    pub question: String,
    /// Slide the student was looking at, if any
    pub current_slide: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("service returned HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ServiceError::Malformed(e.to_string())
        } else {
            ServiceError::Transport(e.to_string())
        }
    }
}

/// Turns a question into answer text
///
/// Implementations may block; they are only called from worker threads.
pub trait AnswerService: Send + Sync {
    fn answer(&self, request: &AnswerRequest) -> Result<String, ServiceError>;
}

pub const DEFAULT_ANSWER_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2:3b";

const SYSTEM_PROMPT: &str = "You are an AI teacher presenting a lecture. \
A student has raised their hand with a question. \
Answer clearly and concisely in 2-3 sentences, using the lecture content when it is relevant. \
Speak naturally, as if talking to the student in class.";

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    system: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Result of an answer service health check
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceStatus {
    pub running: bool,
    pub model_available: bool,
    pub models: Vec<String>,
    pub message: String,
}

/// Answer service backed by Ollama's `/api/generate`
pub struct OllamaAnswerService {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    context: String,
}

impl OllamaAnswerService {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            context: String::new(),
        })
    }

    /// Lecture narration included with every question
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    fn prompt(&self, request: &AnswerRequest) -> String {
        let mut prompt = String::new();
        if !self.context.is_empty() {
            prompt.push_str(&self.context);
            prompt.push('\n');
        }
        if let Some(slide) = request.current_slide {
            prompt.push_str(&format!("The student is currently on slide {}.\n\n", slide));
        }
        prompt.push_str(&format!("Student's question: {}\n\nAnswer:", request.question.trim()));
        prompt
    }

    /// Check that the server is up and the model is installed
    pub fn status(&self) -> ServiceStatus {
        let url = format!("{}/api/tags", self.base_url);
        let tags = match self.client.get(&url).send() {
            Ok(resp) if resp.status().is_success() => resp.json::<TagsResponse>(),
            Ok(resp) => {
                return ServiceStatus {
                    running: false,
                    model_available: false,
                    models: Vec::new(),
                    message: format!("Ollama returned HTTP {}", resp.status().as_u16()),
                }
            }
            Err(e) => {
                debug!(error = %e, "answer service unreachable");
                return ServiceStatus {
                    running: false,
                    model_available: false,
                    models: Vec::new(),
                    message: format!("Ollama not reachable at {}", self.base_url),
                };
            }
        };

        let models: Vec<String> = match tags {
            Ok(tags) => tags.models.into_iter().map(|m| m.name).collect(),
            Err(e) => {
                warn!(error = %e, "unreadable model list");
                Vec::new()
            }
        };
        let model_available = model_installed(&models, &self.model);
        let message = if model_available {
            format!("Ollama ready with {}", self.model)
        } else {
            format!("Model {} not installed (ollama pull {})", self.model, self.model)
        };
        ServiceStatus {
            running: true,
            model_available,
            models,
            message,
        }
    }
}

/// True when `model` or its base name (before `:`) is among `installed`
fn model_installed(installed: &[String], model: &str) -> bool {
    let base = model.split(':').next().unwrap_or(model);
    installed
        .iter()
        .any(|name| name == model || name.split(':').next() == Some(base))
}

impl AnswerService for OllamaAnswerService {
    fn answer(&self, request: &AnswerRequest) -> Result<String, ServiceError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt: self.prompt(request),
            system: SYSTEM_PROMPT,
            stream: false,
            options: GenerateOptions {
                temperature: 0.7,
                top_p: 0.9,
                num_predict: 256,
            },
        };

        info!(model = %self.model, slide = ?request.current_slide, "asking answer service");
        let resp = self.client.post(&url).json(&body).send()?;
        if !resp.status().is_success() {
            return Err(ServiceError::Status(resp.status().as_u16()));
        }
        let answer = resp.json::<GenerateResponse>()?.response.trim().to_string();
        if answer.is_empty() {
            return Err(ServiceError::Malformed("empty answer".into()));
        }
        debug!(chars = answer.len(), "answer received");
        Ok(answer)
    }
}
