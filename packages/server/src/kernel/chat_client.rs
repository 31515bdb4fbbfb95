use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use super::traits::{BaseChatService, ChatRoom};

/// HTTP client for the chat service that provisions rooms for matched pairs.
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateChatRoomRequest<'a> {
    user_id_1: &'a str,
    user_id_2: &'a str,
    concern_1: &'a str,
    concern_2: &'a str,
    similarity_score: f64,
}

impl ChatClient {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl BaseChatService for ChatClient {
    async fn create_chat_room(
        &self,
        user_id_1: &str,
        user_id_2: &str,
        concern_1: &str,
        concern_2: &str,
        similarity_score: f64,
    ) -> Result<ChatRoom> {
        let url = format!("{}/api/chat/match", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&CreateChatRoomRequest {
                user_id_1,
                user_id_2,
                concern_1,
                concern_2,
                similarity_score,
            })
            .send()
            .await
            .context("chat room request failed")?
            .error_for_status()
            .context("chat service returned an error status")?;

        let room: ChatRoom = response
            .json()
            .await
            .context("invalid chat room response body")?;

        Ok(room)
    }
}
