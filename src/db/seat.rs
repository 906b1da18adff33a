use serde::{Deserialize, Serialize};
use tokio_postgres::{Error, Row};

use super::{bus, int_id, text_enum, Client};

#[derive(Clone, Debug)]
pub struct Seat {
    pub id: Id,
    pub bus_id: bus::Id,
    pub seat_number: String,
    pub seat_type: Type,
    pub status: Status,
    pub price: i64,
}

int_id!(Id);

#[derive(
    Clone, Copy, Debug, Deserialize, enum_utils::FromStr, Eq, PartialEq,
    Serialize,
)]
#[enumeration(case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Type {
    Luxury,
    Vip,
    Standard,
}

impl Type {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Luxury => "LUXURY",
            Self::Vip => "VIP",
            Self::Standard => "STANDARD",
        }
    }
}

text_enum!(Type);

/// Fast-path occupancy flag. Tickets are the source of truth; a seat is only
/// offered when both agree it is free.
#[derive(
    Clone, Copy, Debug, Deserialize, enum_utils::FromStr, Eq, PartialEq,
    Serialize,
)]
#[enumeration(case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Available,
    Booked,
}

impl Status {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Booked => "BOOKED",
        }
    }
}

text_enum!(Status);

fn from_row(row: &Row) -> Seat {
    Seat {
        id: row.get("id"),
        bus_id: row.get("bus_id"),
        seat_number: row.get("seat_number"),
        seat_type: row.get("seat_type"),
        status: row.get("status"),
        price: row.get("price_for_type_seat"),
    }
}

impl Client {
    pub async fn get_seat_by_id(&self, id: Id) -> Result<Option<Seat>, Error> {
        const SQL: &str = "\
            SELECT id, bus_id, seat_number, seat_type, status, \
                   price_for_type_seat \
            FROM seats \
            WHERE id = $1";
        Ok(self.0.query_opt(SQL, &[&id]).await?.as_ref().map(from_row))
    }

    /// Seats of `bus_id` flagged AVAILABLE that also hold no BOOKED ticket on
    /// any of the bus's upcoming active departures.
    pub async fn get_available_seats(
        &self,
        bus_id: bus::Id,
    ) -> Result<Vec<Seat>, Error> {
        const SQL: &str = "\
            SELECT s.id, s.bus_id, s.seat_number, s.seat_type, s.status, \
                   s.price_for_type_seat \
            FROM seats s \
            WHERE s.bus_id = $1 \
              AND s.status = 'AVAILABLE' \
              AND s.id NOT IN ( \
                  SELECT t.seat_id \
                  FROM tickets t \
                  JOIN schedules sc ON sc.id = t.schedule_id \
                  WHERE sc.bus_id = $1 \
                    AND sc.is_active \
                    AND sc.departure_time > now() \
                    AND t.status = 'BOOKED') \
            ORDER BY s.seat_number, s.id";
        Ok(self
            .0
            .query(SQL, &[&bus_id])
            .await?
            .iter()
            .map(from_row)
            .collect())
    }
}
