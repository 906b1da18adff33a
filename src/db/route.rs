use serde::{Deserialize, Serialize};
use tokio_postgres::Error;

use super::{int_id, station, Client};

int_id!(Id);

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Route {
    pub id: Id,
    pub departure_station_id: station::Id,
    pub departure_station_name: String,
    pub arrival_station_id: station::Id,
    pub arrival_station_name: String,
}

impl Client {
    pub async fn get_routes(&self) -> Result<Vec<Route>, Error> {
        const SQL: &str = "\
            SELECT r.id, \
                   r.departure_station_id, ds.name AS departure_station_name, \
                   r.arrival_station_id, ars.name AS arrival_station_name \
            FROM routes r \
            JOIN stations ds ON ds.id = r.departure_station_id \
            JOIN stations ars ON ars.id = r.arrival_station_id \
            WHERE r.is_active \
            ORDER BY r.id";
        Ok(self
            .0
            .query(SQL, &[])
            .await?
            .into_iter()
            .map(|row| Route {
                id: row.get("id"),
                departure_station_id: row.get("departure_station_id"),
                departure_station_name: row.get("departure_station_name"),
                arrival_station_id: row.get("arrival_station_id"),
                arrival_station_name: row.get("arrival_station_name"),
            })
            .collect())
    }
}
