//! Signs and delivers webhook notifications for triggered signals (C9, §4.9).

pub mod dispatcher;
pub mod error;
pub mod payload;

pub use dispatcher::{DispatchConfig, DispatchOutcome, WebhookDispatcher};
pub use error::WebhookError;
pub use payload::{PayloadContext, PayloadScope, WebhookPayload};
