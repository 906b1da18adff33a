use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};
use tokio_postgres::{Error, Row};

use super::{bus, int_id, route, station, Bus, Client};

/// A single dated departure of one bus on one route.
#[derive(Clone, Debug)]
pub struct Schedule {
    pub id: Id,
    pub route_id: route::Id,
    pub bus_id: bus::Id,
    pub departure_time: OffsetDateTime,
    pub is_active: bool,
}

int_id!(Id);

/// Upcoming departure together with the bus serving it.
#[derive(Clone, Debug)]
pub struct Departure {
    pub schedule: Schedule,
    pub bus: Bus,
}

/// Filter used when searching departures between two stations on a day.
#[derive(Clone, Copy, Debug)]
pub struct Search {
    pub departure_station_id: station::Id,
    pub arrival_station_id: station::Id,
    pub date: Date,
    pub limit: usize,
}

/// Search result row, shaped for listing.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Offer {
    pub id: Id,
    pub bus_id: bus::Id,
    pub bus_name: String,
    pub bus_image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub departure_time: OffsetDateTime,
    /// Cheapest seat on the bus, if it has any seats at all.
    pub price: Option<i64>,
    pub available_seats: i64,
    pub route_departure_station_id: station::Id,
    pub route_arrival_station_id: station::Id,
}

fn from_row(row: &Row) -> Schedule {
    Schedule {
        id: row.get("id"),
        route_id: row.get("route_id"),
        bus_id: row.get("bus_id"),
        departure_time: row.get("departure_time"),
        is_active: row.get("is_active"),
    }
}

impl Client {
    pub async fn get_schedule_by_id(
        &self,
        id: Id,
    ) -> Result<Option<Schedule>, Error> {
        const SQL: &str = "\
            SELECT id, route_id, bus_id, departure_time, is_active \
            FROM schedules \
            WHERE id = $1";
        Ok(self.0.query_opt(SQL, &[&id]).await?.as_ref().map(from_row))
    }

    /// Active departures of `route_id` that have not left yet.
    pub async fn get_upcoming_departures(
        &self,
        route_id: route::Id,
    ) -> Result<Vec<Departure>, Error> {
        const SQL: &str = "\
            SELECT s.id, s.route_id, s.bus_id, s.departure_time, s.is_active, \
                   b.name, b.license_plate, b.capacity, b.featured_image \
            FROM schedules s \
            JOIN cars b ON b.id = s.bus_id \
            WHERE s.route_id = $1 \
              AND s.is_active \
              AND s.departure_time > now() \
            ORDER BY s.departure_time, s.id";
        Ok(self
            .0
            .query(SQL, &[&route_id])
            .await?
            .iter()
            .map(|row| Departure {
                schedule: from_row(row),
                bus: Bus {
                    id: row.get("bus_id"),
                    name: row.get("name"),
                    license_plate: row.get("license_plate"),
                    capacity: row.get("capacity"),
                    featured_image: row.get("featured_image"),
                },
            })
            .collect())
    }

    /// Upcoming active departures from one station to another on a given
    /// (UTC) calendar day, earliest first.
    pub async fn search_departures(
        &self,
        search: Search,
    ) -> Result<Vec<Offer>, Error> {
        const SQL: &str = "\
            SELECT s.id, s.bus_id, b.name AS bus_name, \
                   b.featured_image AS bus_image, s.departure_time, \
                   r.departure_station_id, r.arrival_station_id, \
                   (SELECT MIN(se.price_for_type_seat) \
                    FROM seats se \
                    WHERE se.bus_id = s.bus_id) AS price, \
                   (SELECT COUNT(*) \
                    FROM seats se \
                    WHERE se.bus_id = s.bus_id \
                      AND se.status = 'AVAILABLE' \
                      AND NOT EXISTS ( \
                          SELECT 1 FROM tickets t \
                          WHERE t.seat_id = se.id \
                            AND t.schedule_id = s.id \
                            AND t.status = 'BOOKED')) AS available_seats \
            FROM schedules s \
            JOIN routes r ON r.id = s.route_id \
            JOIN cars b ON b.id = s.bus_id \
            WHERE r.departure_station_id = $1 \
              AND r.arrival_station_id = $2 \
              AND s.departure_time >= $3 \
              AND s.departure_time < $4 \
              AND s.departure_time > now() \
              AND s.is_active \
            ORDER BY s.departure_time, s.id \
            LIMIT $5";

        let day_start = search.date.midnight().assume_utc();
        let day_end = day_start + Duration::DAY;
        let limit = i64::try_from(search.limit).unwrap_or(i64::MAX);

        Ok(self
            .0
            .query(
                SQL,
                &[
                    &search.departure_station_id,
                    &search.arrival_station_id,
                    &day_start,
                    &day_end,
                    &limit,
                ],
            )
            .await?
            .into_iter()
            .map(|row| Offer {
                id: row.get("id"),
                bus_id: row.get("bus_id"),
                bus_name: row.get("bus_name"),
                bus_image: row.get("bus_image"),
                departure_time: row.get("departure_time"),
                price: row.get("price"),
                available_seats: row.get("available_seats"),
                route_departure_station_id: row.get("departure_station_id"),
                route_arrival_station_id: row.get("arrival_station_id"),
            })
            .collect())
    }
}
