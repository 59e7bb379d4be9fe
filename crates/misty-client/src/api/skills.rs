//! Skill upload and lifecycle
//!
//! Skills are identified by the `UniqueId` from their JSON meta file.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde_json::json;
use tracing::{debug, instrument};

use crate::client::MistyClient;
use crate::error::{MistyClientError, Result};
use crate::types::SkillInfo;

impl MistyClient {
    /// Upload a zipped skill package (code, meta and assets) verbatim
    ///
    /// With `immediately_apply` the robot runs the skill right away;
    /// otherwise it is only loaded.
    #[instrument(skip(self, path))]
    pub async fn save_skill(
        &self,
        path: impl AsRef<Path>,
        immediately_apply: bool,
        overwrite_existing: bool,
    ) -> Result<()> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                MistyClientError::InvalidArgument(format!("Not a file path: {}", path.display()))
            })?
            .to_string();
        debug!("Uploading skill package {} ({} bytes)", file_name, data.len());

        let part = Part::bytes(data)
            .file_name(file_name)
            .mime_str("application/zip")?;
        let form = Form::new()
            .part("File", part)
            .text("ImmediatelyApply", immediately_apply.to_string())
            .text("OverwriteExisting", overwrite_existing.to_string());

        let url = self.base_url().join("skills")?;
        let response = self
            .http_client()
            .post(url)
            .header("Expires", "0")
            .multipart(form)
            .send()
            .await?;
        self.handle_response(response).await?;
        Ok(())
    }

    /// Skills uploaded to the robot
    #[instrument(skip(self))]
    pub async fn get_skills(&self) -> Result<Vec<SkillInfo>> {
        self.get("skills").await
    }

    /// Skills currently running; empty when idle
    #[instrument(skip(self))]
    pub async fn get_running_skills(&self) -> Result<Vec<SkillInfo>> {
        self.get("skills/running").await
    }

    /// Make an uploaded skill runnable, picking up any changes
    #[instrument(skip(self))]
    pub async fn load_skill(&self, skill: &str) -> Result<()> {
        self.post("skills/load", &json!({"Skill": skill})).await?;
        Ok(())
    }

    /// Reload every uploaded skill; loading may finish well after this returns
    #[instrument(skip(self))]
    pub async fn reload_skills(&self) -> Result<()> {
        self.post_empty("skills/reload").await?;
        Ok(())
    }

    /// Run a skill, or only `method` within it
    #[instrument(skip(self))]
    pub async fn run_skill(&self, skill: &str, method: Option<&str>) -> Result<()> {
        self.post("skills/start", &json!({"Skill": skill, "Method": method}))
            .await?;
        Ok(())
    }

    /// Stop one running skill, or all of them with `None`
    #[instrument(skip(self))]
    pub async fn cancel_skill(&self, skill: Option<&str>) -> Result<()> {
        self.post("skills/cancel", &json!({"Skill": skill})).await?;
        Ok(())
    }

    /// Remove a skill's code, meta and assets from the robot
    #[instrument(skip(self))]
    pub async fn delete_skill(&self, skill: &str) -> Result<()> {
        let mut url = self.base_url().join("skills")?;
        url.query_pairs_mut().append_pair("Skill", skill);

        let response = self.http_client().delete(url).send().await?;
        self.handle_response(response).await?;
        Ok(())
    }
}
