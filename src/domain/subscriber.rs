//! src/domain/subscriber.rs

use uuid::Uuid;

/// Snapshot of a stored subscriber row.
///
/// The email is kept as stored. Callers that deliver mail parse it into a
/// [`SubscriberEmail`](crate::domain::SubscriberEmail) first, since rows may
/// predate the current validation rules.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Subscriber {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}
