//! src/campaign/dispatcher.rs

use crate::campaign::{
    ArticleContent, CampaignError, CampaignRequest, CampaignResult, ContentExtractor,
    DispatchOutcome, PasscodeVerifier, Personalizer,
};
use crate::domain::{Subscriber, SubscriberEmail};
use crate::email_client::DeliveryProvider;
use crate::repository::SubscriberRepository;
use anyhow::Context;
use futures::stream::{self, StreamExt};
use reqwest::Url;
use secrecy::Secret;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Instrument;

pub const DEFAULT_MAX_CONCURRENT_SENDS: usize = 10;

const NOT_ATTEMPTED: &str =
    "Not attempted: the email provider rejected our credentials earlier in this run.";

/// Runs one campaign end to end: authorize, extract, load, send, aggregate.
pub struct Dispatcher {
    verifier: PasscodeVerifier,
    personalizer: Personalizer,
    extractor: Arc<dyn ContentExtractor>,
    repository: Arc<dyn SubscriberRepository>,
    provider: Arc<dyn DeliveryProvider>,
    use_batch_id: bool,
    max_concurrent_sends: usize,
}

impl Dispatcher {
    pub fn new(
        passcode: &Secret<String>,
        personalizer: Personalizer,
        extractor: Arc<dyn ContentExtractor>,
        repository: Arc<dyn SubscriberRepository>,
        provider: Arc<dyn DeliveryProvider>,
    ) -> Result<Self, anyhow::Error> {
        Ok(Self {
            verifier: PasscodeVerifier::new(passcode)?,
            personalizer,
            extractor,
            repository,
            provider,
            use_batch_id: true,
            max_concurrent_sends: DEFAULT_MAX_CONCURRENT_SENDS,
        })
    }

    pub fn with_batch_id(mut self, use_batch_id: bool) -> Self {
        self.use_batch_id = use_batch_id;
        self
    }

    /// A cap of zero is treated as one.
    pub fn with_max_concurrent_sends(mut self, max_concurrent_sends: usize) -> Self {
        self.max_concurrent_sends = max_concurrent_sends.max(1);
        self
    }

    #[tracing::instrument(
        name = "Dispatch campaign",
        skip(self, request),
        fields(source_url = %request.source_url, batch_id = tracing::field::Empty)
    )]
    pub async fn dispatch(&self, request: CampaignRequest) -> Result<CampaignResult, CampaignError> {
        if !self.verifier.verify(&request.auth_token) {
            tracing::warn!("Campaign rejected: wrong passcode");
            return Err(CampaignError::Unauthorized);
        }
        let link = parse_campaign_link(&request.source_url)?;
        // mailed as typed, `Url` would normalize it
        let campaign_link = request.source_url.trim().to_string();

        let content = self.extractor.extract(&link).await?;
        let subscribers = self.repository.list_active_subscribers().await?;
        let batch_id = self.allocate_batch_id(subscribers.is_empty()).await;
        if let Some(batch_id) = &batch_id {
            tracing::Span::current().record("batch_id", tracing::field::display(batch_id));
        }

        let plan = Arc::new(SendPlan {
            personalizer: self.personalizer.clone(),
            provider: Arc::clone(&self.provider),
            content,
            campaign_link,
            batch_id,
            halted: AtomicBool::new(false),
        });
        // detached so a dropped request does not abandon sends half way
        let send_phase = tokio::spawn(
            send_all(plan, subscribers, self.max_concurrent_sends)
                .instrument(tracing::Span::current()),
        );
        let result = send_phase
            .await
            .context("The send phase of the campaign panicked.")?;
        Ok(result)
    }

    async fn allocate_batch_id(&self, no_recipients: bool) -> Option<String> {
        if !self.use_batch_id || no_recipients {
            return None;
        }
        match self.provider.allocate_batch_id().await {
            Ok(batch_id) => Some(batch_id),
            Err(e) => {
                tracing::warn!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Failed to allocate a batch id, sending without one"
                );
                None
            }
        }
    }
}

fn parse_campaign_link(source_url: &str) -> Result<Url, CampaignError> {
    let source_url = source_url.trim();
    if source_url.is_empty() {
        return Err(CampaignError::InvalidRequest(
            "The campaign link is missing.".to_string(),
        ));
    }
    let link = Url::parse(source_url).map_err(|e| {
        CampaignError::InvalidRequest(format!("`{}` is not a valid link: {}", source_url, e))
    })?;
    match link.scheme() {
        "http" | "https" if link.host_str().is_some() => Ok(link),
        _ => Err(CampaignError::InvalidRequest(format!(
            "`{}` is not an http(s) link.",
            source_url
        ))),
    }
}

/// Read-only state shared by every send of one run, plus the halt flag.
struct SendPlan {
    personalizer: Personalizer,
    provider: Arc<dyn DeliveryProvider>,
    content: ArticleContent,
    campaign_link: String,
    batch_id: Option<String>,
    halted: AtomicBool,
}

enum Sent {
    Attempted(DispatchOutcome),
    Skipped(DispatchOutcome),
}

async fn send_all(
    plan: Arc<SendPlan>,
    subscribers: Vec<Subscriber>,
    max_concurrent_sends: usize,
) -> CampaignResult {
    let initial = CampaignResult::new(subscribers.len(), plan.batch_id.clone());
    let mut result = stream::iter(subscribers)
        .map(|subscriber| send_one(&plan, subscriber))
        .buffer_unordered(max_concurrent_sends.max(1))
        .fold(initial, |mut result, sent| async move {
            match sent {
                Sent::Attempted(outcome) => result.record_attempt(outcome),
                Sent::Skipped(outcome) => result.record_skipped(outcome),
            }
            result
        })
        .await;
    result.halted = plan.halted.load(Ordering::SeqCst);

    if result.halted {
        tracing::error!(
            total_recipients = result.total_recipients,
            total_attempted = result.total_attempted,
            total_delivered = result.total_delivered,
            "Campaign halted: {}",
            result.summary()
        );
    } else {
        tracing::info!(
            total_recipients = result.total_recipients,
            total_delivered = result.total_delivered,
            "Campaign finished: {}",
            result.summary()
        );
    }
    result
}

#[tracing::instrument(name = "Send campaign email", skip_all, fields(subscriber_id = %subscriber.id))]
async fn send_one(plan: &SendPlan, subscriber: Subscriber) -> Sent {
    if plan.halted.load(Ordering::SeqCst) {
        return Sent::Skipped(DispatchOutcome::failed(subscriber.id, NOT_ATTEMPTED));
    }
    if let Err(e) = SubscriberEmail::parse(subscriber.email.clone()) {
        tracing::warn!(
            error.message = %e,
            "Skipping a subscriber, their stored email is invalid"
        );
        return Sent::Attempted(DispatchOutcome::failed(subscriber.id, e.to_string()));
    }

    let payload = plan
        .personalizer
        .personalize(&plan.content, &subscriber, &plan.campaign_link);
    match plan.provider.send(&payload, plan.batch_id.as_deref()).await {
        Ok(()) => Sent::Attempted(DispatchOutcome::delivered(subscriber.id)),
        Err(e) => {
            if e.is_credentials_rejected() {
                plan.halted.store(true, Ordering::SeqCst);
            }
            tracing::warn!(
                error.cause_chain = ?e,
                error.message = %e,
                "Failed to deliver a campaign email"
            );
            Sent::Attempted(DispatchOutcome::failed(subscriber.id, e.to_string()))
        }
    }
}
