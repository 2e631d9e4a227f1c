//! src/email_client.rs

use crate::campaign::{MessagePayload, TemplateFields};
use crate::domain::SubscriberEmail;
use crate::error::error_chain_fmt;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use std::time::Duration;

/// Transactional email service used to deliver campaigns.
#[async_trait]
pub trait DeliveryProvider: Send + Sync {
    /// Allocate an id grouping all messages of one campaign.
    async fn allocate_batch_id(&self) -> Result<String, EmailClientError>;

    async fn send(
        &self,
        payload: &MessagePayload,
        batch_id: Option<&str>,
    ) -> Result<(), EmailClientError>;
}

#[derive(thiserror::Error)]
pub enum EmailClientError {
    #[error("Failed to reach the email provider: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("The email provider rejected our credentials ({0}).")]
    CredentialsRejected(StatusCode),
    #[error("The email provider rejected the request ({status}): {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("The email provider sent an unexpected response.")]
    InvalidResponse(#[source] reqwest::Error),
}

impl std::fmt::Debug for EmailClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl EmailClientError {
    /// Every further request would fail the same way.
    pub fn is_credentials_rejected(&self) -> bool {
        matches!(self, EmailClientError::CredentialsRejected(_))
    }
}

/// Client for a SendGrid v3 style API.
#[derive(Debug)]
pub struct EmailClient {
    http_client: Client,
    base_url: String,
    sender: SubscriberEmail,
    sender_name: String,
    api_key: Secret<String>,
}

#[derive(serde::Serialize)]
struct SendEmailRequest<'a> {
    from: EmailAddress<'a>,
    template_id: &'a str,
    personalizations: [Personalization<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    batch_id: Option<&'a str>,
}

#[derive(serde::Serialize)]
struct EmailAddress<'a> {
    email: &'a str,
    name: &'a str,
}

#[derive(serde::Serialize)]
struct Personalization<'a> {
    to: [EmailAddress<'a>; 1],
    dynamic_template_data: &'a TemplateFields,
}

#[derive(serde::Deserialize)]
struct BatchIdResponse {
    batch_id: String,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: SubscriberEmail,
        sender_name: String,
        api_key: Secret<String>,
        timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build the HTTP client for the email provider.")?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            sender,
            sender_name,
            api_key,
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.expose_secret())
    }
}

#[async_trait]
impl DeliveryProvider for EmailClient {
    #[tracing::instrument(name = "Allocate a campaign batch id", skip(self))]
    async fn allocate_batch_id(&self) -> Result<String, EmailClientError> {
        let url = format!("{}/v3/mail/batch", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .header("Authorization", self.bearer())
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: BatchIdResponse = response
            .json()
            .await
            .map_err(EmailClientError::InvalidResponse)?;
        Ok(body.batch_id)
    }

    #[tracing::instrument(name = "Send a templated email", skip(self, payload))]
    async fn send(
        &self,
        payload: &MessagePayload,
        batch_id: Option<&str>,
    ) -> Result<(), EmailClientError> {
        let url = format!("{}/v3/mail/send", self.base_url);
        let request_body = SendEmailRequest {
            from: EmailAddress {
                email: self.sender.as_ref(),
                name: &self.sender_name,
            },
            template_id: &payload.template_id,
            personalizations: [Personalization {
                to: [EmailAddress {
                    email: &payload.recipient.email,
                    name: &payload.recipient.name,
                }],
                dynamic_template_data: &payload.fields,
            }],
            batch_id,
        };
        let response = self
            .http_client
            .post(&url)
            .header("Authorization", self.bearer())
            .json(&request_body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response, EmailClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(EmailClientError::CredentialsRejected(status));
    }
    let body = response.text().await.unwrap_or_default();
    Err(EmailClientError::Rejected { status, body })
}
