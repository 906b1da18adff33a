use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::{Error, Row};

use super::{int_id, payment, schedule, seat, text_enum, user, Client};

#[derive(Clone, Debug)]
pub struct Ticket {
    pub id: Id,
    pub user_id: user::Id,
    pub seat_id: seat::Id,
    pub schedule_id: schedule::Id,
    pub status: Status,
    pub payment_method: payment::Method,
    pub total_price: i64,
    pub reason: Option<String>,
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
pub enum Status {
    /// Seat is requested but not paid for; the seat itself stays
    /// AVAILABLE.
    Pending,

    /// Payment is confirmed (by the gateway webhook or cash collection) or
    /// the ticket was restored by an administrator.
    Booked,

    /// Cancelled by its owner or an administrator, with a reason.
    Canceled,
}

impl Status {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Booked => "BOOKED",
            Self::Canceled => "CANCELED",
        }
    }
}

text_enum!(Status);

/// Ticket to be inserted in PENDING state.
#[derive(Clone, Copy, Debug)]
pub struct NewTicket {
    pub user_id: user::Id,
    pub seat_id: seat::Id,
    pub schedule_id: schedule::Id,
    pub payment_method: payment::Method,
}

/// Ticket joined with everything a traveller needs to read it.
#[derive(Clone, Debug)]
pub struct Details {
    pub ticket: Ticket,
    pub departure_time: OffsetDateTime,
    pub bus_name: String,
    pub license_plate: String,
    pub company_name: String,
    pub seat_number: String,
    pub seat_type: seat::Type,
    pub departure_station_name: String,
    pub departure_station_location: String,
    pub arrival_station_name: String,
    pub arrival_station_location: String,
}

const COLUMNS: &str = "id, user_id, seat_id, schedule_id, status, \
                       payment_method, total_price, reason, \
                       created_at, updated_at";

pub(super) fn from_row(row: &Row) -> Ticket {
    Ticket {
        id: row.get("id"),
        user_id: row.get("user_id"),
        seat_id: row.get("seat_id"),
        schedule_id: row.get("schedule_id"),
        status: row.get("status"),
        payment_method: row.get("payment_method"),
        total_price: row.get("total_price"),
        reason: row.get("reason"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn details_from_row(row: &Row) -> Details {
    Details {
        ticket: from_row(row),
        departure_time: row.get("departure_time"),
        bus_name: row.get("bus_name"),
        license_plate: row.get("license_plate"),
        company_name: row.get("company_name"),
        seat_number: row.get("seat_number"),
        seat_type: row.get("seat_type"),
        departure_station_name: row.get("departure_station_name"),
        departure_station_location: row.get("departure_station_location"),
        arrival_station_name: row.get("arrival_station_name"),
        arrival_station_location: row.get("arrival_station_location"),
    }
}

const DETAILS_SQL: &str = "\
    SELECT t.id, t.user_id, t.seat_id, t.schedule_id, t.status, \
           t.payment_method, t.total_price, t.reason, \
           t.created_at, t.updated_at, \
           sc.departure_time, \
           b.name AS bus_name, b.license_plate, \
           c.company_name, \
           se.seat_number, se.seat_type, \
           ds.name AS departure_station_name, \
           ds.location AS departure_station_location, \
           ars.name AS arrival_station_name, \
           ars.location AS arrival_station_location \
    FROM tickets t \
    JOIN schedules sc ON sc.id = t.schedule_id \
    JOIN routes r ON r.id = sc.route_id \
    JOIN cars b ON b.id = sc.bus_id \
    JOIN bus_companies c ON c.id = b.company_id \
    JOIN seats se ON se.id = t.seat_id \
    JOIN stations ds ON ds.id = r.departure_station_id \
    JOIN stations ars ON ars.id = r.arrival_station_id";

impl Client {
    pub async fn get_ticket_by_id(
        &self,
        id: Id,
    ) -> Result<Option<Ticket>, Error> {
        let sql = format!("SELECT {COLUMNS} FROM tickets WHERE id = $1");
        Ok(self.0.query_opt(&sql, &[&id]).await?.as_ref().map(from_row))
    }

    pub async fn get_ticket_details(
        &self,
        id: Id,
    ) -> Result<Option<Details>, Error> {
        let sql = format!("{DETAILS_SQL} WHERE t.id = $1");
        Ok(self
            .0
            .query_opt(&sql, &[&id])
            .await?
            .as_ref()
            .map(details_from_row))
    }

    /// Ticket `id`, provided it belongs to the user registered with `phone`.
    pub async fn get_ticket_details_by_id_and_phone(
        &self,
        id: Id,
        phone: &str,
    ) -> Result<Option<Details>, Error> {
        let sql = format!(
            "{DETAILS_SQL} \
             JOIN users u ON u.id = t.user_id \
             WHERE t.id = $1 AND u.phone = $2",
        );
        Ok(self
            .0
            .query_opt(&sql, &[&id, &phone])
            .await?
            .as_ref()
            .map(details_from_row))
    }

    /// BOOKED tickets of `user_id`, newest first.
    pub async fn get_booked_ticket_details(
        &self,
        user_id: user::Id,
    ) -> Result<Vec<Details>, Error> {
        let sql = format!(
            "{DETAILS_SQL} \
             WHERE t.user_id = $1 AND t.status = 'BOOKED' \
             ORDER BY t.created_at DESC, t.id DESC",
        );
        Ok(self
            .0
            .query(&sql, &[&user_id])
            .await?
            .iter()
            .map(details_from_row)
            .collect())
    }

    pub async fn has_booked_ticket(
        &self,
        seat_id: seat::Id,
        schedule_id: schedule::Id,
    ) -> Result<bool, Error> {
        const SQL: &str = "\
            SELECT EXISTS ( \
                SELECT 1 FROM tickets \
                WHERE seat_id = $1 AND schedule_id = $2 \
                  AND status = 'BOOKED')";
        Ok(self
            .0
            .query_one(SQL, &[&seat_id, &schedule_id])
            .await?
            .get(0))
    }

    /// Inserts a PENDING ticket priced from the seat, provided in the same
    /// statement that the seat is AVAILABLE, rides the schedule's bus and
    /// holds no BOOKED ticket for that schedule.
    ///
    /// Returns [`None`] if any of those conditions does not hold.
    pub async fn insert_pending_ticket(
        &self,
        new: NewTicket,
    ) -> Result<Option<Ticket>, Error> {
        let sql = format!(
            "INSERT INTO tickets (user_id, schedule_id, seat_id, status, \
                                  payment_method, total_price) \
             SELECT $1::INT4, sc.id, se.id, 'PENDING', $4::TEXT, \
                    se.price_for_type_seat \
             FROM seats se \
             JOIN schedules sc ON sc.id = $2 AND sc.bus_id = se.bus_id \
             WHERE se.id = $3 \
               AND se.status = 'AVAILABLE' \
               AND NOT EXISTS ( \
                   SELECT 1 FROM tickets t \
                   WHERE t.seat_id = se.id \
                     AND t.schedule_id = sc.id \
                     AND t.status = 'BOOKED') \
             RETURNING {COLUMNS}",
        );
        Ok(self
            .0
            .query_opt(
                &sql,
                &[
                    &new.user_id,
                    &new.schedule_id,
                    &new.seat_id,
                    &new.payment_method,
                ],
            )
            .await?
            .as_ref()
            .map(from_row))
    }

    /// Moves a non-cancelled ticket to CANCELED and marks its payment (if
    /// any) CANCELED, atomically. A ticket that was BOOKED also frees its
    /// seat and re-opens its schedule; a PENDING one never held them.
    ///
    /// Returns [`None`] if the ticket is absent or already cancelled.
    pub async fn cancel_ticket(
        &self,
        id: Id,
        reason: &str,
    ) -> Result<Option<Ticket>, Error> {
        let sql = format!(
            "WITH prev AS ( \
                 SELECT id, seat_id, schedule_id, status \
                 FROM tickets \
                 WHERE id = $1 AND status <> 'CANCELED' \
                 FOR UPDATE), \
             ticket AS ( \
                 UPDATE tickets \
                 SET status = 'CANCELED', reason = $2, updated_at = now() \
                 WHERE id = (SELECT id FROM prev) \
                 RETURNING {COLUMNS}), \
             seat AS ( \
                 UPDATE seats \
                 SET status = 'AVAILABLE', updated_at = now() \
                 WHERE id = (SELECT seat_id FROM prev \
                             WHERE status = 'BOOKED')), \
             schedule AS ( \
                 UPDATE schedules \
                 SET is_active = TRUE, updated_at = now() \
                 WHERE id = (SELECT schedule_id FROM prev \
                             WHERE status = 'BOOKED')), \
             payment AS ( \
                 UPDATE payments \
                 SET status = 'CANCELED', updated_at = now() \
                 WHERE ticket_id = (SELECT id FROM ticket)) \
             SELECT {COLUMNS} FROM ticket",
        );
        Ok(self
            .0
            .query_opt(&sql, &[&id, &reason])
            .await?
            .as_ref()
            .map(from_row))
    }

    /// Undoes [`Client::cancel_ticket()`]: a CANCELED ticket
    /// becomes BOOKED, its seat BOOKED, its schedule inactive and its payment
    /// (if any) BOOKED again.
    ///
    /// Returns [`None`] if the ticket is absent or not cancelled. Fails with a
    /// unique violation if another ticket already holds the seat on that
    /// schedule.
    pub async fn restore_ticket(
        &self,
        id: Id,
        reason: &str,
    ) -> Result<Option<Ticket>, Error> {
        let sql = format!(
            "WITH ticket AS ( \
                 UPDATE tickets \
                 SET status = 'BOOKED', reason = $2, updated_at = now() \
                 WHERE id = $1 AND status = 'CANCELED' \
                 RETURNING {COLUMNS}), \
             seat AS ( \
                 UPDATE seats \
                 SET status = 'BOOKED', updated_at = now() \
                 WHERE id = (SELECT seat_id FROM ticket)), \
             schedule AS ( \
                 UPDATE schedules \
                 SET is_active = FALSE, updated_at = now() \
                 WHERE id = (SELECT schedule_id FROM ticket)), \
             payment AS ( \
                 UPDATE payments \
                 SET status = 'BOOKED', updated_at = now() \
                 WHERE ticket_id = (SELECT id FROM ticket)) \
             SELECT {COLUMNS} FROM ticket",
        );
        Ok(self
            .0
            .query_opt(&sql, &[&id, &reason])
            .await?
            .as_ref()
            .map(from_row))
    }

    /// Page of tickets, newest first, optionally limited to one owner.
    pub async fn get_tickets_page(
        &self,
        owner: Option<user::Id>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Ticket>, Error> {
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM tickets \
             WHERE $1::INT4 IS NULL OR user_id = $1 \
             ORDER BY created_at DESC, \
                      id DESC \
             OFFSET $2 LIMIT $3",
        );
        Ok(self
            .0
            .query(&sql, &[&owner, &offset, &limit])
            .await?
            .iter()
            .map(from_row)
            .collect())
    }

    pub async fn get_tickets_count(
        &self,
        owner: Option<user::Id>,
    ) -> Result<usize, Error> {
        const SQL: &str = "\
            SELECT COUNT(*) FROM tickets \
            WHERE $1::INT4 IS NULL OR user_id = $1";
        let count = self.0.query_one(SQL, &[&owner]).await?.get::<_, i64>(0);
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub async fn get_tickets_by_status(
        &self,
        status: Status,
    ) -> Result<Vec<Ticket>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} \
             FROM tickets \
             WHERE status = $1 \
             ORDER BY updated_at DESC, id DESC",
        );
        Ok(self
            .0
            .query(&sql, &[&status])
            .await?
            .iter()
            .map(from_row)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_status() {
        assert_eq!("PENDING".parse::<Status>(), Ok(Status::Pending));
        assert_eq!("booked".parse::<Status>(), Ok(Status::Booked));
        assert_eq!("Canceled".parse::<Status>(), Ok(Status::Canceled));
        assert!("CANCELLED".parse::<Status>().is_err());
    }

    #[test]
    fn writes_status_in_upper_case() {
        assert_eq!(Status::Pending.to_string(), "PENDING");
        assert_eq!(Status::Booked.to_string(), "BOOKED");
        assert_eq!(Status::Canceled.to_string(), "CANCELED");
    }
}
