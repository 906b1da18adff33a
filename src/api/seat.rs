use serde::{Deserialize, Serialize};

use crate::db::bus;

pub use crate::db::seat::{Id, Status, Type};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Seat {
    pub id: Id,
    pub bus_id: bus::Id,
    pub seat_number: String,
    pub seat_type: Type,
    pub status: Status,
    pub price_for_type_seat: i64,
}

impl From<crate::db::Seat> for Seat {
    fn from(seat: crate::db::Seat) -> Self {
        Self {
            id: seat.id,
            bus_id: seat.bus_id,
            seat_number: seat.seat_number,
            seat_type: seat.seat_type,
            status: seat.status,
            price_for_type_seat: seat.price,
        }
    }
}
