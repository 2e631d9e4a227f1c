//! src/routes/subscriptions/mod.rs

mod post;
mod unsubscribe;

pub use post::*;
pub use unsubscribe::*;
