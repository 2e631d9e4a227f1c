//! src/routes/subscriptions/unsubscribe.rs

use crate::error::{AppResult, Error};
use crate::repository::PgSubscriberRepository;
use actix_web::{web, Responder};
use anyhow::Context;
use askama_actix::Template;
use uuid::Uuid;

#[derive(Template)]
#[template(path = "unsubscribe.html")]
struct UnsubscribeTemplate {
    name: String,
    email: String,
}

/// A missing or malformed `id` is rejected by the extractor with 400.
#[derive(serde::Deserialize)]
pub struct UnsubscribeParameters {
    id: Uuid,
}

#[tracing::instrument(name = "Unsubscribe subscriber", skip(parameters, repository), fields(subscriber_id = %parameters.id))]
pub async fn unsubscribe(
    parameters: web::Query<UnsubscribeParameters>,
    repository: web::Data<PgSubscriberRepository>,
) -> AppResult<impl Responder> {
    let subscriber = repository
        .unsubscribe(parameters.id)
        .await
        .context("Failed to unsubscribe the subscriber.")?
        .ok_or(Error::UnknownSubscriber(parameters.id))?;
    Ok(UnsubscribeTemplate {
        name: subscriber.name,
        email: subscriber.email,
    })
}
