//! services/api/src/adapters/fcm.rs
//!
//! This module contains the adapter for the Firebase Cloud Messaging push gateway.
//! It implements the `PushGateway` port from the `core` crate.
//!
//! Two strategies live behind the one adapter:
//!
//! 1. **OAuth2 (preferred)**: sign a service-account JWT, exchange it for a bearer
//!    token with the JWT-bearer grant, then call the project-scoped v1 send API.
//! 2. **Legacy key**: a single POST to the legacy endpoint with the static server key.
//!
//! OAuth is used whenever its three settings are present; the legacy key is the
//! fallback. With neither, nothing is sent and `ConfigurationIncomplete` is returned.
//! The access token is minted fresh for every send.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};
use visitor_core::domain::PushPayload;
use visitor_core::ports::{DeliveryOutcome, PortError, PortResult, PushGateway};

use crate::config::Config;

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;

const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_SEND_BASE_URL: &str = "https://fcm.googleapis.com";
const DEFAULT_LEGACY_URL: &str = "https://fcm.googleapis.com/fcm/send";

//=========================================================================================
// Configuration
//=========================================================================================

/// Credentials and endpoints for the push gateway.
#[derive(Clone)]
pub struct FcmConfig {
    project_id: Option<String>,
    service_account_email: Option<String>,
    private_key: Option<SecretString>,
    server_key: Option<SecretString>,
    timeout: Duration,
    token_url: String,
    send_base_url: String,
    legacy_url: String,
}

impl FcmConfig {
    /// A configuration with no credentials; every send reports `ConfigurationIncomplete`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            project_id: None,
            service_account_email: None,
            private_key: None,
            server_key: None,
            timeout,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            send_base_url: DEFAULT_SEND_BASE_URL.to_string(),
            legacy_url: DEFAULT_LEGACY_URL.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            project_id: config.fcm_project_id.clone(),
            service_account_email: config.fcm_service_account_email.clone(),
            private_key: config.fcm_private_key.clone(),
            server_key: config.fcm_server_key.clone(),
            ..Self::new(config.push_timeout)
        }
    }

    pub fn with_oauth(
        mut self,
        project_id: impl Into<String>,
        service_account_email: impl Into<String>,
        private_key_pem: impl Into<String>,
    ) -> Self {
        self.project_id = Some(project_id.into());
        self.service_account_email = Some(service_account_email.into());
        self.private_key = Some(SecretString::new(private_key_pem.into()));
        self
    }

    pub fn with_server_key(mut self, server_key: impl Into<String>) -> Self {
        self.server_key = Some(SecretString::new(server_key.into()));
        self
    }

    /// Points the adapter at different endpoints (for testing).
    pub fn with_endpoints(
        mut self,
        token_url: impl Into<String>,
        send_base_url: impl Into<String>,
        legacy_url: impl Into<String>,
    ) -> Self {
        self.token_url = token_url.into();
        self.send_base_url = send_base_url.into();
        self.legacy_url = legacy_url.into();
        self
    }
}

/// The delivery path chosen for one send.
enum Strategy<'a> {
    OAuth {
        project_id: &'a str,
        service_account_email: &'a str,
        private_key: &'a SecretString,
    },
    Legacy {
        server_key: &'a SecretString,
    },
    Unconfigured,
}

//=========================================================================================
// Wire Types
//=========================================================================================

/// Claims asserted by the service account when requesting an access token.
#[derive(Debug, Serialize, Deserialize)]
struct ServiceAccountClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `PushGateway` port using Firebase Cloud Messaging.
pub struct FcmGateway {
    config: FcmConfig,
    http_client: reqwest::Client,
}

impl FcmGateway {
    /// Creates a new `FcmGateway`. The HTTP client is built once with the configured timeout.
    pub fn new(config: FcmConfig) -> PortResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn strategy(&self) -> Strategy<'_> {
        let c = &self.config;
        match (&c.project_id, &c.service_account_email, &c.private_key, &c.server_key) {
            (Some(project_id), Some(service_account_email), Some(private_key), _) => {
                Strategy::OAuth {
                    project_id,
                    service_account_email,
                    private_key,
                }
            }
            (_, _, _, Some(server_key)) => Strategy::Legacy { server_key },
            _ => Strategy::Unconfigured,
        }
    }

    /// Signs the service-account assertion and exchanges it for a bearer token.
    async fn mint_access_token(
        &self,
        service_account_email: &str,
        private_key: &SecretString,
    ) -> PortResult<String> {
        let now = Utc::now().timestamp();
        let claims = ServiceAccountClaims {
            iss: service_account_email.to_string(),
            scope: FCM_SCOPE.to_string(),
            aud: self.config.token_url.clone(),
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(private_key.expose_secret().as_bytes())
            .map_err(|e| PortError::delivery("invalid service account private key", Some(e.to_string())))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| PortError::delivery("failed to sign service account assertion", Some(e.to_string())))?;

        debug!(url = %self.config.token_url, "Requesting push gateway access token");
        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| PortError::delivery(format!("token request failed: {}", e), None))?;
        let response = ensure_success(response, "token endpoint").await?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PortError::delivery("token endpoint returned an invalid body", Some(e.to_string())))?;
        Ok(token.access_token)
    }

    async fn send_oauth(
        &self,
        project_id: &str,
        service_account_email: &str,
        private_key: &SecretString,
        device_token: &str,
        payload: &PushPayload,
    ) -> PortResult<()> {
        let access_token = self
            .mint_access_token(service_account_email, private_key)
            .await?;

        let url = format!(
            "{}/v1/projects/{}/messages:send",
            self.config.send_base_url.trim_end_matches('/'),
            project_id
        );
        let body = json!({
            "message": {
                "token": device_token,
                "notification": { "title": payload.title(), "body": payload.body() },
                "data": payload.data(),
            }
        });

        debug!(%url, "Sending push notification");
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::delivery(format!("push request failed: {}", e), None))?;
        ensure_success(response, "push endpoint").await?;
        Ok(())
    }

    async fn send_legacy(
        &self,
        server_key: &SecretString,
        device_token: &str,
        payload: &PushPayload,
    ) -> PortResult<()> {
        let body = json!({
            "to": device_token,
            "notification": { "title": payload.title(), "body": payload.body() },
            "data": payload.data(),
        });

        debug!(url = %self.config.legacy_url, "Sending push notification (legacy key)");
        let response = self
            .http_client
            .post(&self.config.legacy_url)
            .header(AUTHORIZATION, format!("key={}", server_key.expose_secret()))
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::delivery(format!("push request failed: {}", e), None))?;
        ensure_success(response, "legacy push endpoint").await?;
        Ok(())
    }
}

/// Turns a non-2xx response into a `Delivery` error carrying the upstream body.
async fn ensure_success(response: reqwest::Response, what: &str) -> PortResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    error!(%status, upstream = %body, "{} rejected the request", what);
    Err(PortError::delivery(
        format!("{} returned {}", what, status),
        Some(body),
    ))
}

//=========================================================================================
// `PushGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl PushGateway for FcmGateway {
    async fn send(&self, device_token: &str, payload: &PushPayload) -> PortResult<DeliveryOutcome> {
        match self.strategy() {
            Strategy::OAuth {
                project_id,
                service_account_email,
                private_key,
            } => {
                self.send_oauth(project_id, service_account_email, private_key, device_token, payload)
                    .await?
            }
            Strategy::Legacy { server_key } => {
                self.send_legacy(server_key, device_token, payload).await?
            }
            Strategy::Unconfigured => return Ok(DeliveryOutcome::ConfigurationIncomplete),
        }
        Ok(DeliveryOutcome::Delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};
    use visitor_core::domain::VisitorContext;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_KEY: &str = include_str!("../../testdata/service_account_key.pem");
    const TEST_PUBLIC_KEY: &str = include_str!("../../testdata/service_account_key.pub.pem");
    const SERVICE_ACCOUNT: &str = "push@kikao.iam.gserviceaccount.com";

    fn config_for(server: &MockServer) -> FcmConfig {
        FcmConfig::new(Duration::from_secs(5)).with_endpoints(
            format!("{}/token", server.uri()),
            server.uri(),
            format!("{}/fcm/send", server.uri()),
        )
    }

    fn alert() -> PushPayload {
        PushPayload::for_notification("Kikao Homes", "Water off at noon", "alert", None).unwrap()
    }

    fn visitor_alert() -> PushPayload {
        PushPayload::for_notification(
            "Kikao Homes",
            "Jane Doe is at the gate",
            "visitor",
            Some(VisitorContext {
                visitor_id: "v-1".to_string(),
                visitor_name: "Jane Doe".to_string(),
                visitor_phone: "0700000000".to_string(),
            }),
        )
        .unwrap()
    }

    fn assertion_from_form(body: &[u8]) -> String {
        String::from_utf8_lossy(body)
            .split('&')
            .find_map(|pair| pair.strip_prefix("assertion="))
            .map(str::to_string)
            .unwrap()
    }

    #[tokio::test]
    async fn unconfigured_gateway_sends_nothing() {
        let server = MockServer::start().await;
        let gateway = FcmGateway::new(config_for(&server)).unwrap();

        let outcome = gateway.send("device-1", &alert()).await.unwrap();

        assert_eq!(outcome, DeliveryOutcome::ConfigurationIncomplete);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn legacy_send_uses_server_key_and_flat_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fcm/send"))
            .and(header("authorization", "key=legacy-key"))
            .and(body_partial_json(json!({
                "to": "device-1",
                "notification": { "title": "Kikao Homes", "body": "Water off at noon" },
                "data": { "type": "alert" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": 1 })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = FcmGateway::new(config_for(&server).with_server_key("legacy-key")).unwrap();
        let outcome = gateway.send("device-1", &alert()).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Delivered);
    }

    #[tokio::test]
    async fn oauth_send_mints_token_then_posts_structured_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.test-token",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/kikao/messages:send"))
            .and(header("authorization", "Bearer ya29.test-token"))
            .and(body_partial_json(json!({
                "message": {
                    "token": "device-1",
                    "notification": { "title": "Kikao Homes" },
                    "data": { "type": "visitor", "visitor_name": "Jane Doe" }
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "msg-1" })))
            .expect(1)
            .mount(&server)
            .await;

        let config = config_for(&server)
            .with_oauth("kikao", SERVICE_ACCOUNT, TEST_KEY)
            .with_server_key("legacy-key");
        let gateway = FcmGateway::new(config).unwrap();
        let outcome = gateway.send("device-1", &visitor_alert()).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Delivered);

        // The assertion is a valid RS256 JWT with the expected claims.
        let requests = server.received_requests().await.unwrap();
        let token_request = requests.iter().find(|r| r.url.path() == "/token").unwrap();
        let form = String::from_utf8_lossy(&token_request.body).to_string();
        assert!(form.contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"));

        let assertion = assertion_from_form(&token_request.body);
        let token_url = format!("{}/token", server.uri());
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[token_url.as_str()]);
        validation.set_issuer(&[SERVICE_ACCOUNT]);
        let decoded = decode::<ServiceAccountClaims>(
            &assertion,
            &DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();
        assert_eq!(decoded.claims.scope, FCM_SCOPE);
        assert_eq!(decoded.claims.exp - decoded.claims.iat, TOKEN_LIFETIME_SECS);
    }

    #[tokio::test]
    async fn token_endpoint_failure_is_a_delivery_error_with_upstream_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("{\"error\":\"invalid_grant\"}"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/kikao/messages:send"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = config_for(&server).with_oauth("kikao", SERVICE_ACCOUNT, TEST_KEY);
        let gateway = FcmGateway::new(config).unwrap();
        let err = gateway.send("device-1", &alert()).await.unwrap_err();

        match err {
            PortError::Delivery { upstream, .. } => {
                assert!(upstream.unwrap().contains("invalid_grant"))
            }
            other => panic!("expected delivery error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn push_endpoint_failure_is_a_delivery_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "access_token": "ya29.t" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/kikao/messages:send"))
            .respond_with(
                ResponseTemplate::new(404).set_body_string("{\"error\":\"UNREGISTERED\"}"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = config_for(&server).with_oauth("kikao", SERVICE_ACCOUNT, TEST_KEY);
        let gateway = FcmGateway::new(config).unwrap();
        let err = gateway.send("device-1", &alert()).await.unwrap_err();
        assert!(
            matches!(err, PortError::Delivery { upstream: Some(body), .. } if body.contains("UNREGISTERED"))
        );
    }

    #[tokio::test]
    async fn malformed_private_key_fails_before_any_request() {
        let server = MockServer::start().await;
        let config = config_for(&server).with_oauth("kikao", SERVICE_ACCOUNT, "not a pem");
        let gateway = FcmGateway::new(config).unwrap();

        let err = gateway.send("device-1", &alert()).await.unwrap_err();
        assert!(matches!(err, PortError::Delivery { .. }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn partial_oauth_settings_fall_back_to_legacy_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fcm/send"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = config_for(&server).with_server_key("legacy-key");
        config.project_id = Some("kikao".to_string());
        let gateway = FcmGateway::new(config).unwrap();
        assert_eq!(
            gateway.send("device-1", &alert()).await.unwrap(),
            DeliveryOutcome::Delivered
        );
    }
}
