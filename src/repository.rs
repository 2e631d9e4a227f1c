//! src/repository.rs

use crate::domain::{NewSubscriber, Subscriber};
use crate::error::error_chain_fmt;
use async_trait::async_trait;
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

#[derive(thiserror::Error)]
pub enum RepositoryError {
    #[error("The subscriber query did not finish within {0:?}.")]
    Timeout(Duration),
    #[error("The subscriber query failed.")]
    Database(#[from] sqlx::Error),
}

impl std::fmt::Debug for RepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Read side used by campaigns.
#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    /// Every subscriber currently opted in. Order is not significant.
    async fn list_active_subscribers(&self) -> Result<Vec<Subscriber>, RepositoryError>;
}

pub struct PgSubscriberRepository {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgSubscriberRepository {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    async fn bounded<T, F>(&self, query: F) -> Result<T, RepositoryError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        tokio::time::timeout(self.query_timeout, query)
            .await
            .map_err(|_| RepositoryError::Timeout(self.query_timeout))?
            .map_err(RepositoryError::from)
    }

    /// Stores a new subscriber, or opts an existing address back in.
    #[tracing::instrument(
        name = "Saving subscriber details in the database",
        skip(self, new_subscriber)
    )]
    pub async fn upsert_subscriber(
        &self,
        new_subscriber: &NewSubscriber,
    ) -> Result<Uuid, RepositoryError> {
        self.bounded(
            sqlx::query_scalar::<_, Uuid>(
                r#"
                INSERT INTO subscribers (id, email, name, subscribed, subscribed_at)
                VALUES ($1, $2, $3, true, $4)
                ON CONFLICT (email) DO UPDATE
                SET subscribed = true, name = EXCLUDED.name
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(new_subscriber.email.as_ref())
            .bind(new_subscriber.name.as_ref())
            .bind(chrono::Utc::now())
            .fetch_one(&self.pool),
        )
        .await
    }

    /// Opts the subscriber out. `None` when the id is unknown.
    #[tracing::instrument(name = "Unsubscribing subscriber", skip(self))]
    pub async fn unsubscribe(&self, subscriber_id: Uuid) -> Result<Option<Subscriber>, RepositoryError> {
        self.bounded(
            sqlx::query_as::<_, Subscriber>(
                r#"
                UPDATE subscribers SET subscribed = false
                WHERE id = $1
                RETURNING id, name, email
                "#,
            )
            .bind(subscriber_id)
            .fetch_optional(&self.pool),
        )
        .await
    }
}

#[async_trait]
impl SubscriberRepository for PgSubscriberRepository {
    #[tracing::instrument(name = "Listing active subscribers", skip(self))]
    async fn list_active_subscribers(&self) -> Result<Vec<Subscriber>, RepositoryError> {
        let subscribers = self
            .bounded(
                sqlx::query_as::<_, Subscriber>(
                    r#"
                    SELECT id, name, email
                    FROM subscribers
                    WHERE subscribed = true
                    "#,
                )
                .fetch_all(&self.pool),
            )
            .await?;
        tracing::info!(count = subscribers.len(), "Loaded active subscribers");
        Ok(subscribers)
    }
}
