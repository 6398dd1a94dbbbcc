//! Media Collaborators
//!
//! Image generation, speech synthesis and file upload are external services.
//! This module defines the seams the dispatcher and the chat session call,
//! plus implementations backed by an OpenAI-compatible API.

use anyhow::{Context, Result, anyhow, bail};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        CreateImageRequestArgs, CreateSpeechRequestArgs, Image, ImageModel,
        ImageResponseFormat, ImageSize, SpeechModel, SpeechResponseFormat, Voice,
    },
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Requested shape of a generated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatio {
    Square,
    Landscape,
    Portrait,
}

impl AspectRatio {
    fn image_size(&self) -> ImageSize {
        match self {
            AspectRatio::Square => ImageSize::S1024x1024,
            AspectRatio::Landscape => ImageSize::S1792x1024,
            AspectRatio::Portrait => ImageSize::S1024x1792,
        }
    }
}

/// Turns a text prompt into an image reachable by URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, aspect_ratio: Option<AspectRatio>) -> Result<String>;
}

/// Turns text into an audio resource reachable by URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<String>;
}

/// Stores a file and returns the URL it is served from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileUploader: Send + Sync {
    async fn upload(&self, file_name: &str, mime_type: &str, bytes: Vec<u8>) -> Result<String>;
}

/// Image generation through the OpenAI images endpoint.
pub struct OpenAIImageGenerator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIImageGenerator {
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl ImageGenerator for OpenAIImageGenerator {
    async fn generate(&self, prompt: &str, aspect_ratio: Option<AspectRatio>) -> Result<String> {
        let size = aspect_ratio.unwrap_or(AspectRatio::Square).image_size();
        let request = CreateImageRequestArgs::default()
            .prompt(prompt)
            .model(ImageModel::Other(self.model.clone()))
            .n(1)
            .size(size)
            .response_format(ImageResponseFormat::Url)
            .build()?;

        let response = self.client.images().create(request).await?;
        let image = response
            .data
            .first()
            .context("Image response contained no images")?;

        match image.as_ref() {
            Image::Url { url, .. } => {
                debug!(%url, "Image generated");
                Ok(url.clone())
            }
            Image::B64Json { .. } => Err(anyhow!("Image service returned inline data instead of a URL")),
        }
    }
}

/// Maps the voice names offered in settings onto the service's voices.
fn voice_for(name: &str) -> Voice {
    match name {
        "en-male" | "onyx" => Voice::Onyx,
        "en-female" | "nova" => Voice::Nova,
        "echo" => Voice::Echo,
        "fable" => Voice::Fable,
        "shimmer" => Voice::Shimmer,
        _ => Voice::Alloy,
    }
}

/// Speech synthesis through the OpenAI audio endpoint.
///
/// The service answers with raw audio, so the bytes are handed to a
/// [`FileUploader`] to obtain a playable URL.
pub struct OpenAISpeechSynthesizer {
    client: Client<OpenAIConfig>,
    model: String,
    storage: Arc<dyn FileUploader>,
}

impl OpenAISpeechSynthesizer {
    pub fn new(config: OpenAIConfig, model: String, storage: Arc<dyn FileUploader>) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            storage,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAISpeechSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<String> {
        let request = CreateSpeechRequestArgs::default()
            .input(text)
            .voice(voice_for(voice))
            .model(SpeechModel::Other(self.model.clone()))
            .response_format(SpeechResponseFormat::Mp3)
            .build()?;

        let response = self.client.audio().speech(request).await?;
        self.storage
            .upload("speech.mp3", "audio/mpeg", response.bytes.to_vec())
            .await
    }
}

/// Stand-in used when no media backend is configured. Every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableMedia;

#[async_trait]
impl ImageGenerator for UnavailableMedia {
    async fn generate(&self, _prompt: &str, _aspect_ratio: Option<AspectRatio>) -> Result<String> {
        bail!("Image generation is not configured")
    }
}

#[async_trait]
impl SpeechSynthesizer for UnavailableMedia {
    async fn synthesize(&self, _text: &str, _voice: &str) -> Result<String> {
        bail!("Speech synthesis is not configured")
    }
}
