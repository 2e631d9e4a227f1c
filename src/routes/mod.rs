//! src/routes/mod.rs

mod campaigns;
mod health_check;
mod subscriptions;

pub use campaigns::*;
pub use health_check::*;
pub use subscriptions::*;
