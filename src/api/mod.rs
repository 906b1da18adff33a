pub mod chatbot;
pub mod payment;
pub mod schedule;
pub mod seat;
pub mod ticket;
pub mod user;

use serde::{Deserialize, Serialize};

pub use self::{ticket::Ticket, user::User};

/// Body of every non-2xx response.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Failure {
    pub success: bool,
    pub message: String,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
