use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use super::traits::{BaseUserDirectory, PresenceStatus, UserProfile};

/// HTTP client for the auth service's user directory endpoints.
pub struct AuthClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PresenceRequest<'a> {
    user_id: &'a str,
    status: &'a str,
}

impl AuthClient {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl BaseUserDirectory for AuthClient {
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let url = format!("{}/api/oauth", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("userId", user_id)])
            .header("X-User-ID", user_id)
            .send()
            .await
            .context("profile request failed")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .context("auth service returned an error status")?;

        let profile: UserProfile = response
            .json()
            .await
            .context("invalid profile response body")?;

        Ok(Some(profile))
    }

    async fn set_presence(&self, user_id: &str, status: PresenceStatus) -> Result<()> {
        let url = format!("{}/api/oauth/status", self.base_url);

        self.client
            .post(&url)
            .header("X-User-ID", user_id)
            .json(&PresenceRequest {
                user_id,
                status: status.as_str(),
            })
            .send()
            .await
            .context("presence request failed")?
            .error_for_status()
            .context("auth service rejected presence update")?;

        Ok(())
    }
}
