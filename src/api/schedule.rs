use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::db::{bus, route};

pub use crate::db::{
    route::Route,
    schedule::{Id, Offer},
};

/// Upcoming departure of a route, with the bus serving it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Departure {
    pub id: Id,
    pub route_id: route::Id,
    pub bus_id: bus::Id,
    #[serde(with = "time::serde::rfc3339")]
    pub departure_time: OffsetDateTime,
    pub is_active: bool,
    pub bus_name: String,
    pub license_plate: String,
    pub capacity: i32,
}

impl From<crate::db::schedule::Departure> for Departure {
    fn from(departure: crate::db::schedule::Departure) -> Self {
        let crate::db::schedule::Departure { schedule, bus } = departure;
        Self {
            id: schedule.id,
            route_id: schedule.route_id,
            bus_id: schedule.bus_id,
            departure_time: schedule.departure_time,
            is_active: schedule.is_active,
            bus_name: bus.name,
            license_plate: bus.license_plate,
            capacity: bus.capacity,
        }
    }
}
