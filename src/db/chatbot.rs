use serde::{Deserialize, Serialize};
use tokio_postgres::{types::Json, Error};

use super::{user, Client};

/// Booking requirements gathered across assistant turns. Every field is
/// free text as the traveller wrote it, except the date (`YYYY-MM-DD`) and
/// time (`HH:MM`) which are normalized on extraction.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Slots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_station: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_station: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<String>,
}

/// Slot that must be known before schedules can be searched.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    DepartureStation,
    ArrivalStation,
    DepartureDate,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Pending {
    #[serde(default)]
    pub missing_fields: Vec<Field>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConversationState {
    pub collected: Slots,
    pub pending: Pending,
}

/// One assistant turn, kept for later analysis.
#[derive(Clone, Debug)]
pub struct HistoryEntry<'a> {
    pub user_id: Option<user::Id>,
    pub intent: &'a str,
    pub message: &'a str,
    pub response: &'a str,
    pub embedding: &'a [f32],
}

impl Client {
    pub async fn get_conversation_state(
        &self,
        user_id: user::Id,
    ) -> Result<Option<ConversationState>, Error> {
        const SQL: &str = "\
            SELECT collected, pending \
            FROM user_conversation_state \
            WHERE user_id = $1";
        Ok(self.0.query_opt(SQL, &[&user_id]).await?.map(|row| {
            // A state written by an older shape starts over.
            ConversationState {
                collected: row
                    .try_get::<_, Json<Slots>>("collected")
                    .map(|Json(v)| v)
                    .unwrap_or_default(),
                pending: row
                    .try_get::<_, Json<Pending>>("pending")
                    .map(|Json(v)| v)
                    .unwrap_or_default(),
            }
        }))
    }

    pub async fn save_conversation_state(
        &self,
        user_id: user::Id,
        state: &ConversationState,
    ) -> Result<(), Error> {
        const SQL: &str = "\
            INSERT INTO user_conversation_state (user_id, collected, pending) \
            VALUES ($1, $2, $3) \
            ON CONFLICT (user_id) DO UPDATE \
            SET collected = EXCLUDED.collected, \
                pending = EXCLUDED.pending, \
                updated_at = now()";
        self.0
            .execute(
                SQL,
                &[&user_id, &Json(&state.collected), &Json(&state.pending)],
            )
            .await?;
        Ok(())
    }

    pub async fn clear_conversation_state(
        &self,
        user_id: user::Id,
    ) -> Result<(), Error> {
        const SQL: &str =
            "DELETE FROM user_conversation_state WHERE user_id = $1";
        self.0.execute(SQL, &[&user_id]).await?;
        Ok(())
    }

    pub async fn save_history(
        &self,
        entry: &HistoryEntry<'_>,
    ) -> Result<(), Error> {
        const SQL: &str = "\
            INSERT INTO chatbot_history \
                (user_id, intent, message, response, embedding) \
            VALUES ($1, $2, $3, $4, $5)";
        self.0
            .execute(
                SQL,
                &[
                    &entry.user_id,
                    &entry.intent,
                    &entry.message,
                    &entry.response,
                    &Json(entry.embedding),
                ],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn omits_unknown_slots() {
        let slots = Slots {
            departure_station: Some("Hà Nội".into()),
            ..Slots::default()
        };
        assert_eq!(
            serde_json::to_value(&slots).unwrap(),
            json!({ "departure_station": "Hà Nội" }),
        );
    }

    #[test]
    fn reads_pending_fields() {
        let pending = serde_json::from_value::<Pending>(json!({
            "missing_fields": ["arrival_station", "departure_date"],
        }))
        .unwrap();
        assert_eq!(
            pending.missing_fields,
            [Field::ArrivalStation, Field::DepartureDate],
        );
        assert_eq!(
            serde_json::from_value::<Pending>(json!({})).unwrap(),
            Pending::default(),
        );
    }
}
