use super::SlackError;
use deploybot_core::config::SlackCredentials;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Clone)]
pub struct SlackApiClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    app_token: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackEnvelope<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    data: T,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct EmptyData {}

#[derive(Debug, Clone, Deserialize)]
struct OpenConnectionData {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
}

impl SlackApiClient {
    pub fn new(credentials: &SlackCredentials) -> Self {
        let api_base = credentials
            .api_base
            .clone()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SLACK_API_BASE.to_string());
        Self {
            http: reqwest::Client::new(),
            api_base,
            bot_token: credentials.bot_token.clone(),
            app_token: credentials.app_token.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), path)
    }

    async fn post_json_with_token<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        token: &str,
    ) -> Result<SlackEnvelope<T>, SlackError> {
        let response = self
            .http
            .post(self.endpoint(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| SlackError::ApiRequest(e.to_string()))?;

        let envelope: SlackEnvelope<T> = response
            .json()
            .await
            .map_err(|e| SlackError::ApiRequest(e.to_string()))?;
        if !envelope.ok {
            return Err(SlackError::ApiResponse(
                envelope
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("{path} failed")),
            ));
        }
        Ok(envelope)
    }

    /// Ask Slack for a socket-mode websocket URL. Uses the app-level token.
    pub async fn open_connection_url(&self) -> Result<String, SlackError> {
        let conn: SlackEnvelope<OpenConnectionData> = self
            .post_json_with_token("apps.connections.open", &json!({}), &self.app_token)
            .await?;
        conn.data
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                SlackError::ApiResponse("apps.connections.open returned no url".to_string())
            })
    }

    /// Post `text` to `channel` as the bot user.
    pub async fn post_message(&self, channel: &str, text: &str) -> Result<(), SlackError> {
        let _: SlackEnvelope<EmptyData> = self
            .post_json_with_token(
                "chat.postMessage",
                &PostMessage { channel, text },
                &self.bot_token,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(base: &str) -> SlackApiClient {
        SlackApiClient::new(&SlackCredentials {
            bot_token: "xoxb-bot".into(),
            signing_secret: "secret".into(),
            app_token: "xapp-app".into(),
            api_base: Some(base.to_string()),
        })
    }

    #[tokio::test]
    async fn open_connection_uses_app_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/apps.connections.open")
            .match_header("authorization", "Bearer xapp-app")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"url":"wss://example.invalid/link"}"#)
            .create_async()
            .await;

        let url = client(&server.url()).open_connection_url().await.unwrap();
        assert_eq!(url, "wss://example.invalid/link");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn post_message_uses_bot_token_and_channel() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat.postMessage")
            .match_header("authorization", "Bearer xoxb-bot")
            .match_body(Matcher::PartialJson(
                json!({"channel": "C1", "text": "pong! 🏓"}),
            ))
            .with_status(200)
            .with_body(r#"{"ok":true,"ts":"1.0"}"#)
            .create_async()
            .await;

        client(&server.url())
            .post_message("C1", "pong! 🏓")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn slack_error_field_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat.postMessage")
            .with_status(200)
            .with_body(r#"{"ok":false,"error":"channel_not_found"}"#)
            .create_async()
            .await;

        let err = client(&server.url())
            .post_message("C404", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, SlackError::ApiResponse(ref e) if e == "channel_not_found"));
    }

    #[tokio::test]
    async fn missing_socket_url_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/apps.connections.open")
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        assert!(client(&server.url()).open_connection_url().await.is_err());
    }
}
