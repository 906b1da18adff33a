use tokio_postgres::{types::Json, Error};

use super::{int_id, Client};

int_id!(Id);

#[derive(Clone, Debug)]
pub struct Station {
    pub id: Id,
    pub name: String,
    pub location: String,
    /// L2-normalized embedding of the station name, when one was computed.
    pub embedding: Option<Vec<f32>>,
}

impl Client {
    /// Active stations that carry an embedding.
    pub async fn get_embedded_stations(&self) -> Result<Vec<Station>, Error> {
        const SQL: &str = "\
            SELECT id, name, location, embedding \
            FROM stations \
            WHERE is_active AND embedding IS NOT NULL \
            ORDER BY id";
        Ok(self
            .0
            .query(SQL, &[])
            .await?
            .into_iter()
            .map(|row| Station {
                id: row.get("id"),
                name: row.get("name"),
                location: row.get("location"),
                // Malformed vectors count as missing rather than failing the
                // whole catalog.
                embedding: row
                    .try_get::<_, Option<Json<Vec<f32>>>>("embedding")
                    .ok()
                    .flatten()
                    .map(|Json(v)| v),
            })
            .collect())
    }
}
