use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::OffsetDateTime;

use crate::db::ticket;

pub use crate::db::payment::{Id, Method, Status};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Payment {
    pub id: Id,
    pub ticket_id: ticket::Id,
    pub status: Status,
    pub order_amount: i64,
    pub payment_method: Method,
    pub payment_reference: Option<String>,
    pub notes: Option<Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<crate::db::Payment> for Payment {
    fn from(payment: crate::db::Payment) -> Self {
        Self {
            id: payment.id,
            ticket_id: payment.ticket_id,
            status: payment.status,
            order_amount: payment.amount,
            payment_method: payment.method,
            payment_reference: payment.reference,
            notes: payment.notes,
            created_at: payment.created_at,
        }
    }
}

/// Bank-transfer notification pushed by the SePay gateway.
///
/// Every field is optional on the wire; validation happens in
/// [`Webhook::ticket_id()`] and [`Webhook::amount()`].
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    pub id: Option<Value>,
    pub gateway: Option<String>,
    pub transaction_date: Option<String>,
    pub account_number: Option<String>,
    pub code: Option<String>,
    pub content: Option<String>,
    pub transfer_type: Option<String>,
    pub transfer_amount: Option<Value>,
    pub accumulated: Option<Value>,
    pub sub_account: Option<String>,
    pub reference_code: Option<String>,
    pub description: Option<String>,
}

impl Webhook {
    /// Ticket the transfer pays for, read from the transfer description (or
    /// its content when the description is missing).
    pub fn ticket_id(&self) -> Option<ticket::Id> {
        self.description
            .as_deref()
            .or(self.content.as_deref())
            .and_then(extract_ticket_id)
    }

    /// Transferred amount, if it is a positive whole number.
    pub fn amount(&self) -> Option<i64> {
        let amount = match self.transfer_amount.as_ref()? {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f <= i64::MAX as f64)
                    .map(|f| f as i64)
            })?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        (amount > 0).then_some(amount)
    }

    /// Gateway's own identifier of the transfer.
    pub fn reference(&self) -> Option<String> {
        self.reference_code
            .clone()
            .filter(|r| !r.is_empty())
            .or_else(|| match self.id.as_ref()? {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }

    /// Gateway metadata kept with the payment for reconciliation.
    pub fn notes(&self) -> Value {
        json!({
            "gateway": self.gateway,
            "transactionDate": self.transaction_date,
            "accountNumber": self.account_number,
            "code": self.code,
            "content": self.content,
            "transferType": self.transfer_type,
            "accumulated": self.accumulated,
            "subAccount": self.sub_account,
        })
    }
}

/// Finds the ticket id in free transfer text: `DH <id>` (any casing, spaces
/// optional) if present, otherwise the first standalone number. Zero is never
/// a ticket.
pub fn extract_ticket_id(text: &str) -> Option<ticket::Id> {
    static ORDER_CODE: LazyLock<Option<Regex>> =
        LazyLock::new(|| Regex::new(r"(?i)\bDH\s*(\d+)\b").ok());
    static NUMBER: LazyLock<Option<Regex>> =
        LazyLock::new(|| Regex::new(r"\b(\d+)\b").ok());

    let digits = ORDER_CODE
        .as_ref()?
        .captures(text)
        .or_else(|| NUMBER.as_ref()?.captures(text))?
        .get(1)?
        .as_str();
    digits
        .parse::<i32>()
        .ok()
        .filter(|id| *id > 0)
        .map(ticket::Id::from)
}
