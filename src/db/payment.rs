use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::{types::Json, Error, Row};

use super::{int_id, text_enum, ticket, Client};

#[derive(Clone, Debug)]
pub struct Payment {
    pub id: Id,
    pub ticket_id: ticket::Id,
    pub status: Status,
    pub amount: i64,
    pub method: Method,
    pub reference: Option<String>,
    pub notes: Option<serde_json::Value>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

int_id!(Id);

#[derive(
    Clone, Copy, Debug, Deserialize, enum_utils::FromStr, Eq, PartialEq,
    Serialize,
)]
#[enumeration(case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Method {
    /// Bank transfer reconciled through the gateway webhook.
    Online,

    /// Paid at the counter and confirmed by an administrator.
    Cash,
}

impl Method {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "ONLINE",
            Self::Cash => "CASH",
        }
    }
}

text_enum!(Method);

#[derive(
    Clone, Copy, Debug, Deserialize, enum_utils::FromStr, Eq, PartialEq,
    Serialize,
)]
#[enumeration(case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Booked,
    Canceled,
    Completed,
    Refunded,
}

impl Status {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Booked => "BOOKED",
            Self::Canceled => "CANCELED",
            Self::Completed => "COMPLETED",
            Self::Refunded => "REFUNDED",
        }
    }
}

text_enum!(Status);

/// Evidence that a ticket's price was collected.
#[derive(Clone, Debug)]
pub struct Receipt {
    pub method: Method,
    pub amount: i64,
    pub reference: Option<String>,
    pub notes: Option<serde_json::Value>,
}

const COLUMNS: &str = "id, ticket_id, status, order_amount, payment_method, \
                       payment_reference, notes, created_at, updated_at";

fn from_row(row: &Row) -> Payment {
    Payment {
        id: row.get("id"),
        ticket_id: row.get("ticket_id"),
        status: row.get("status"),
        amount: row.get("order_amount"),
        method: row.get("payment_method"),
        reference: row.get("payment_reference"),
        notes: row
            .get::<_, Option<Json<serde_json::Value>>>("notes")
            .map(|Json(v)| v),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl Client {
    pub async fn get_payment_by_ticket_id(
        &self,
        ticket_id: ticket::Id,
    ) -> Result<Option<Payment>, Error> {
        let sql = format!("SELECT {COLUMNS} FROM payments WHERE ticket_id = $1");
        Ok(self
            .0
            .query_opt(&sql, &[&ticket_id])
            .await?
            .as_ref()
            .map(from_row))
    }

    /// Books a paid ticket in one statement: the ticket becomes BOOKED, then
    /// its seat BOOKED, then the ticket's single payment row is inserted or
    /// overwritten with `receipt`. Replaying the same receipt rewrites the
    /// same row.
    ///
    /// Returns [`None`] (and changes nothing) if the ticket is absent or
    /// CANCELED. Fails with a unique violation if another ticket already
    /// holds the seat on that schedule.
    pub async fn confirm_ticket_payment(
        &self,
        ticket_id: ticket::Id,
        receipt: &Receipt,
    ) -> Result<Option<Payment>, Error> {
        let sql = format!(
            "WITH ticket AS ( \
                 UPDATE tickets \
                 SET status = 'BOOKED', updated_at = now() \
                 WHERE id = $1 AND status <> 'CANCELED' \
                 RETURNING id, seat_id), \
             seat AS ( \
                 UPDATE seats \
                 SET status = 'BOOKED', updated_at = now() \
                 WHERE id = (SELECT seat_id FROM ticket)) \
             INSERT INTO payments (ticket_id, status, order_amount, \
                                   payment_method, payment_reference, notes) \
             SELECT id, 'BOOKED', $2::INT8, $3::TEXT, $4::TEXT, $5::JSONB \
             FROM ticket \
             ON CONFLICT (ticket_id) DO UPDATE \
             SET status = EXCLUDED.status, \
                 order_amount = EXCLUDED.order_amount, \
                 payment_method = EXCLUDED.payment_method, \
                 payment_reference = EXCLUDED.payment_reference, \
                 notes = EXCLUDED.notes, \
                 updated_at = now() \
             RETURNING {COLUMNS}",
        );
        let notes = receipt.notes.as_ref().map(Json);
        Ok(self
            .0
            .query_opt(
                &sql,
                &[
                    &ticket_id,
                    &receipt.amount,
                    &receipt.method,
                    &receipt.reference,
                    &notes,
                ],
            )
            .await?
            .as_ref()
            .map(from_row))
    }
}
