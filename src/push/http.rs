use async_trait::async_trait;
use serde::Deserialize;

use crate::error::GatewayError;
use crate::models::notification::NotificationMessage;
use crate::push::PushGateway;

/// Posts each message as JSON to an HTTP push relay.
pub struct HttpPushGateway {
    client: reqwest::Client,
    url: String,
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(alias = "name", alias = "message_id")]
    id: String,
}

impl HttpPushGateway {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl PushGateway for HttpPushGateway {
    async fn send(&self, message: &NotificationMessage) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|err| GatewayError::Unreachable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!("{status}: {detail}")));
        }

        // Relays that answer with an empty body still count as delivered.
        match response.json::<SendResponse>().await {
            Ok(body) => Ok(body.id),
            Err(_) => Ok(status.to_string()),
        }
    }
}
