//! System settings

use serde_json::json;
use tracing::instrument;

use crate::client::MistyClient;
use crate::error::Result;

impl MistyClient {
    /// Default volume for system audio, 0..=100
    #[instrument(skip(self))]
    pub async fn set_default_volume(&self, volume: u8) -> Result<()> {
        self.post("audio/volume", &json!({"Volume": volume})).await?;
        Ok(())
    }

    /// Speak `text` with the robot's on-board voice
    #[instrument(skip(self))]
    pub async fn speak(&self, text: &str, flush: bool) -> Result<()> {
        self.post("tts/speak", &json!({"Text": text, "Flush": flush}))
            .await?;
        Ok(())
    }
}
