use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::db::{schedule, seat, user};

pub use crate::db::{
    payment::Method as PaymentMethod,
    ticket::{Id, Status},
};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Ticket {
    pub id: Id,
    pub user_id: user::Id,
    pub seat_id: seat::Id,
    pub schedule_id: schedule::Id,
    pub status: Status,
    pub payment_method: PaymentMethod,
    pub total_price: i64,
    pub reason: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<crate::db::Ticket> for Ticket {
    fn from(ticket: crate::db::Ticket) -> Self {
        Self {
            id: ticket.id,
            user_id: ticket.user_id,
            seat_id: ticket.seat_id,
            schedule_id: ticket.schedule_id,
            status: ticket.status,
            payment_method: ticket.payment_method,
            total_price: ticket.total_price,
            reason: ticket.reason,
            created_at: ticket.created_at,
            updated_at: ticket.updated_at,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Details {
    #[serde(flatten)]
    pub ticket: Ticket,
    #[serde(with = "time::serde::rfc3339")]
    pub departure_time: OffsetDateTime,
    pub bus_name: String,
    pub license_plate: String,
    pub company_name: String,
    pub seat_number: String,
    pub seat_type: seat::Type,
    pub departure_station: Station,
    pub arrival_station: Station,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Station {
    pub name: String,
    pub location: String,
}

impl From<crate::db::ticket::Details> for Details {
    fn from(details: crate::db::ticket::Details) -> Self {
        Self {
            ticket: details.ticket.into(),
            departure_time: details.departure_time,
            bus_name: details.bus_name,
            license_plate: details.license_plate,
            company_name: details.company_name,
            seat_number: details.seat_number,
            seat_type: details.seat_type,
            departure_station: Station {
                name: details.departure_station_name,
                location: details.departure_station_location,
            },
            arrival_station: Station {
                name: details.arrival_station_name,
                location: details.arrival_station_location,
            },
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct List {
    pub tickets: Vec<Ticket>,
    pub total_count: usize,
}

/// What a traveller polls for while waiting on the bank transfer.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PaymentStatus {
    pub status: Status,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct BookInput {
    pub schedule_id: schedule::Id,
    pub seat_id: seat::Id,
    #[serde(default = "default_payment_method")]
    pub payment_method: PaymentMethod,
}

fn default_payment_method() -> PaymentMethod {
    PaymentMethod::Online
}

/// Body of both cancellation and restoration.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ReasonInput {
    pub reason: String,
}

/// Query of the guest lookup: both fields are checked by the handler so a
/// missing one is reported like a malformed one.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchInput {
    pub ticket_id: Option<String>,
    pub phone_number: Option<String>,
}

/// Vietnamese mobile number: a leading 0 and nine more digits.
pub fn is_phone_number(text: &str) -> bool {
    static PHONE: LazyLock<Option<Regex>> =
        LazyLock::new(|| Regex::new(r"^0\d{9}$").ok());

    PHONE.as_ref().is_some_and(|re| re.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ten_digit_numbers_starting_with_zero() {
        assert!(is_phone_number("0900000001"));
        assert!(!is_phone_number("900000001"));
        assert!(!is_phone_number("09000000011"));
        assert!(!is_phone_number("1900000001"));
        assert!(!is_phone_number("09000o0001"));
        assert!(!is_phone_number(""));
    }

    #[test]
    fn reads_camel_case_query() {
        let input: SearchInput = serde_json::from_value(serde_json::json!({
            "ticketId": "12",
            "phoneNumber": "0900000001",
        }))
        .unwrap();
        assert_eq!(input.ticket_id.as_deref(), Some("12"));
        assert_eq!(input.phone_number.as_deref(), Some("0900000001"));
    }
}
