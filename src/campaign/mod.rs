//! src/campaign/mod.rs
//!
//! One campaign turns a single article link into one templated email per
//! active subscriber. The [`Dispatcher`] drives the run; content extraction,
//! subscriber lookup and delivery sit behind traits so each of them can be
//! swapped or faked.

mod authorize;
mod content;
mod dispatcher;
mod personalize;

pub use authorize::PasscodeVerifier;
pub use content::{
    derive_preview, ArticleContent, ContentExtractor, ExtractionError, HtmlContentExtractor,
    PREVIEW_DELIMITER,
};
pub use dispatcher::{Dispatcher, DEFAULT_MAX_CONCURRENT_SENDS};
pub use personalize::{MessagePayload, Personalizer, Recipient, TemplateFields};

use crate::error::error_chain_fmt;
use crate::repository::RepositoryError;
use actix_web::http::StatusCode;
use secrecy::Secret;
use uuid::Uuid;

/// Operator input for one campaign run.
#[derive(Debug)]
pub struct CampaignRequest {
    pub source_url: String,
    pub auth_token: Secret<String>,
}

/// Result of handing one subscriber's message to the provider.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DispatchOutcome {
    pub subscriber_id: Uuid,
    pub delivered: bool,
    pub error_detail: Option<String>,
}

impl DispatchOutcome {
    pub fn delivered(subscriber_id: Uuid) -> Self {
        Self {
            subscriber_id,
            delivered: true,
            error_detail: None,
        }
    }

    pub fn failed(subscriber_id: Uuid, error_detail: impl Into<String>) -> Self {
        Self {
            subscriber_id,
            delivered: false,
            error_detail: Some(error_detail.into()),
        }
    }
}

/// Aggregate of one campaign run.
///
/// `total_delivered + failures.len()` always equals `total_recipients`.
/// Subscribers skipped after the provider rejected our credentials count
/// as failures but not as attempts.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CampaignResult {
    pub total_recipients: usize,
    pub total_attempted: usize,
    pub total_delivered: usize,
    pub failures: Vec<DispatchOutcome>,
    pub batch_id: Option<String>,
    pub halted: bool,
}

impl CampaignResult {
    pub(crate) fn new(total_recipients: usize, batch_id: Option<String>) -> Self {
        Self {
            total_recipients,
            total_attempted: 0,
            total_delivered: 0,
            failures: Vec::new(),
            batch_id,
            halted: false,
        }
    }

    pub(crate) fn record_attempt(&mut self, outcome: DispatchOutcome) {
        self.total_attempted += 1;
        self.record(outcome);
    }

    pub(crate) fn record_skipped(&mut self, outcome: DispatchOutcome) {
        self.record(outcome);
    }

    fn record(&mut self, outcome: DispatchOutcome) {
        if outcome.delivered {
            self.total_delivered += 1;
        } else {
            self.failures.push(outcome);
        }
    }

    /// Human readable one-liner returned to the operator.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Delivered {} of {} emails ({} failed).",
            self.total_delivered,
            self.total_recipients,
            self.failures.len()
        );
        if self.halted {
            summary.push_str(" Stopped early: the email provider rejected our credentials.");
        }
        summary
    }
}

#[derive(thiserror::Error)]
pub enum CampaignError {
    #[error("Not authorized to start a campaign.")]
    Unauthorized,
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Failed to fetch the campaign link.")]
    Fetch(#[source] anyhow::Error),
    #[error("Failed to parse the campaign page: {0}")]
    Parse(String),
    #[error("The campaign page has no usable preview: {0}")]
    ContentShape(String),
    #[error("Failed to load the subscribers.")]
    Repository(#[source] RepositoryError),
    #[error("{0}")]
    Provider(String),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for CampaignError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl CampaignError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CampaignError::Unauthorized => StatusCode::UNAUTHORIZED,
            CampaignError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CampaignError::Fetch(_) | CampaignError::Provider(_) => StatusCode::BAD_GATEWAY,
            CampaignError::Parse(_)
            | CampaignError::ContentShape(_)
            | CampaignError::Repository(_)
            | CampaignError::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ExtractionError> for CampaignError {
    fn from(e: ExtractionError) -> Self {
        match e {
            ExtractionError::Fetch(source) => CampaignError::Fetch(source),
            ExtractionError::Parse(detail) => CampaignError::Parse(detail),
            ExtractionError::ContentShape(detail) => CampaignError::ContentShape(detail),
        }
    }
}

impl From<RepositoryError> for CampaignError {
    fn from(e: RepositoryError) -> Self {
        CampaignError::Repository(e)
    }
}
