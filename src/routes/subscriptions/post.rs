//! src/routes/subscriptions/post.rs

use actix_web::{web, HttpResponse};
use anyhow::Context;

use crate::domain::{NewSubscriber, SubscriberEmail, SubscriberName, ValidationError};
use crate::error::AppResult;
use crate::repository::PgSubscriberRepository;

#[derive(serde::Deserialize)]
pub struct FormData {
    email: String,
    name: String,
}

impl TryFrom<FormData> for NewSubscriber {
    type Error = ValidationError;

    fn try_from(value: FormData) -> Result<Self, Self::Error> {
        let name = SubscriberName::parse(value.name)?;
        let email = SubscriberEmail::parse(value.email)?;
        Ok(Self { email, name })
    }
}

#[tracing::instrument(
    name = "Adding a new subscriber.",
    skip(form, repository),
    fields(
        subscriber_email = %form.email,
        subscriber_name = %form.name
    )
)]
pub async fn subscribe(
    form: web::Form<FormData>,
    repository: web::Data<PgSubscriberRepository>,
) -> AppResult<HttpResponse> {
    let new_subscriber: NewSubscriber = form.0.try_into()?;
    // subscribing an existing address opts it back in
    let subscriber_id = repository
        .upsert_subscriber(&new_subscriber)
        .await
        .context("Failed to store the new subscriber.")?;
    tracing::info!(%subscriber_id, "Subscriber stored");
    Ok(HttpResponse::Ok().finish())
}
