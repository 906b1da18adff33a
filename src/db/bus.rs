use serde::{Deserialize, Serialize};

use super::int_id;

int_id!(Id);

/// A coach (the `cars` table); seats and schedules hang off it.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Bus {
    pub id: Id,
    pub name: String,
    pub license_plate: String,
    pub capacity: i32,
    pub featured_image: Option<String>,
}
