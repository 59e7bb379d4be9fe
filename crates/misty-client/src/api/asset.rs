//! Audio file management and text-to-speech

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::json;
use tracing::{debug, instrument};

use crate::client::MistyClient;
use crate::error::{MistyClientError, Result};
use crate::speech::SpeechSynthesizer;
use crate::types::{AudioFile, AudioSource, SaveAudioRequest, TtsOptions};

impl MistyClient {
    /// Names of the audio files stored on the robot
    #[instrument(skip(self))]
    pub async fn get_audio_list(&self) -> Result<Vec<String>> {
        let files: Vec<AudioFile> = self.get("audio/list").await?;
        Ok(files.into_iter().map(|f| f.name).collect())
    }

    /// Upload audio to the robot, optionally playing it right away
    #[instrument(skip(self, source))]
    pub async fn save_audio(
        &self,
        file_name: &str,
        source: AudioSource,
        immediately_apply: bool,
        overwrite_existing: bool,
    ) -> Result<()> {
        let data = match source {
            AudioSource::Base64(encoded) => encoded,
            AudioSource::Bytes(bytes) => BASE64.encode(bytes),
            AudioSource::Path(path) => BASE64.encode(tokio::fs::read(&path).await?),
        };
        debug!("Uploading {} ({} base64 chars)", file_name, data.len());

        let request = SaveAudioRequest {
            file_name,
            data,
            immediately_apply,
            overwrite_existing,
        };
        self.post("audio", &request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_audio(&self, file_name: &str) -> Result<()> {
        self.delete("audio", &json!({"FileName": file_name})).await?;
        Ok(())
    }

    /// Synthesize `text`, play it on the robot, and clean up afterwards
    #[instrument(skip(self, synthesizer))]
    pub async fn text_to_speech(
        &self,
        synthesizer: &dyn SpeechSynthesizer,
        text: &str,
        options: &TtsOptions,
    ) -> Result<()> {
        if options.file_name.is_empty() {
            return Err(MistyClientError::InvalidArgument(
                "Audio file name is empty".to_string(),
            ));
        }
        let audio = synthesizer.synthesize(text, &options.language).await?;

        self.save_audio(&options.file_name, AudioSource::Bytes(audio), true, true)
            .await?;
        if options.delete_after {
            self.delete_audio(&options.file_name).await?;
        }
        Ok(())
    }
}
