//! services/api/src/adapters/resend.rs
//!
//! This module contains the adapter for the Resend transactional email API.
//! It implements the `EmailService` port from the `core` crate.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, error};
use visitor_core::ports::{EmailMessage, EmailService, PortError, PortResult};

const DEFAULT_ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `EmailService` port using Resend.
pub struct ResendMailer {
    http_client: reqwest::Client,
    api_key: Option<SecretString>,
    from: String,
    endpoint: String,
}

impl ResendMailer {
    /// Creates a new `ResendMailer`. Without an API key every send fails.
    pub fn new(api_key: Option<SecretString>, from: impl Into<String>, timeout: Duration) -> PortResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http_client,
            api_key,
            from: from.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

//=========================================================================================
// `EmailService` Trait Implementation
//=========================================================================================

#[async_trait]
impl EmailService for ResendMailer {
    async fn send_email(&self, message: &EmailMessage) -> PortResult<()> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| PortError::delivery("email delivery is not configured", None))?;

        let request = SendEmailRequest {
            from: &self.from,
            to: [message.to.as_str()],
            subject: &message.subject,
            html: &message.html,
        };

        debug!(to = %message.to, "Sending email");
        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| PortError::delivery(format!("email request failed: {}", e), None))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, upstream = %body, "Email provider rejected the request");
            return Err(PortError::delivery(
                format!("email provider returned {}", status),
                Some(body),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> EmailMessage {
        EmailMessage {
            to: "resident@example.com".to_string(),
            subject: "Visit approved: v-1".to_string(),
            html: "<p>Hi</p>".to_string(),
        }
    }

    fn mailer(server: &MockServer, key: Option<&str>) -> ResendMailer {
        ResendMailer::new(
            key.map(|k| SecretString::new(k.to_string())),
            "Kikao Homes <onboarding@resend.dev>",
            Duration::from_secs(5),
        )
        .unwrap()
        .with_endpoint(format!("{}/emails", server.uri()))
    }

    #[tokio::test]
    async fn posts_message_with_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer re_test"))
            .and(body_json(json!({
                "from": "Kikao Homes <onboarding@resend.dev>",
                "to": ["resident@example.com"],
                "subject": "Visit approved: v-1",
                "html": "<p>Hi</p>"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "email-1" })))
            .expect(1)
            .mount(&server)
            .await;

        mailer(&server, Some("re_test")).send_email(&message()).await.unwrap();
    }

    #[tokio::test]
    async fn provider_error_carries_upstream_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(ResponseTemplate::new(422).set_body_string("{\"message\":\"invalid from\"}"))
            .mount(&server)
            .await;

        let err = mailer(&server, Some("re_test")).send_email(&message()).await.unwrap_err();
        assert!(
            matches!(err, PortError::Delivery { upstream: Some(body), .. } if body.contains("invalid from"))
        );
    }

    #[tokio::test]
    async fn missing_key_fails_without_calling_provider() {
        let server = MockServer::start().await;
        let err = mailer(&server, None).send_email(&message()).await.unwrap_err();
        assert!(matches!(err, PortError::Delivery { .. }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
