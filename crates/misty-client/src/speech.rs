//! Pluggable text-to-speech
//!
//! The robot only plays audio files, so `text_to_speech` needs something
//! that turns text into audio bytes. Implement [`SpeechSynthesizer`] for
//! whichever engine is available.

use async_trait::async_trait;

use crate::error::Result;

/// Turns text into encoded audio (mp3, wav, ...) the robot can play
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` spoken in `language` (e.g. "es", "en")
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>>;
}
