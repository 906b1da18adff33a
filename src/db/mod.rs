pub mod bus;
pub mod chatbot;
pub mod payment;
pub mod route;
pub mod schedule;
pub mod seat;
pub mod station;
pub mod ticket;
pub mod user;

use crate::config;

use tokio_postgres::{tls::NoTlsStream, NoTls, Socket};

pub use tokio_postgres::Error;

pub use self::{
    bus::Bus, payment::Payment, route::Route, schedule::Schedule, seat::Seat,
    station::Station, ticket::Ticket, user::User,
};

pub type Connection = tokio_postgres::Connection<Socket, NoTlsStream>;

pub async fn connect(
    config: config::Db,
) -> Result<(Client, Connection), Error> {
    tokio_postgres::connect(&config.url, NoTls)
        .await
        .map(|(client, connection)| (Client(client), connection))
}

pub struct Client(tokio_postgres::Client);

/// Declares an `INT4` surrogate key newtype.
macro_rules! int_id {
    ($name:ident) => {
        #[derive(
            Clone,
            Copy,
            Debug,
            Default,
            derive_more::Display,
            serde::Deserialize,
            Eq,
            Hash,
            Ord,
            PartialEq,
            PartialOrd,
            serde::Serialize,
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl From<i32> for $name {
            fn from(value: i32) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl tokio_postgres::types::FromSql<'_> for $name {
            tokio_postgres::types::accepts!(INT4);

            fn from_sql(
                ty: &tokio_postgres::types::Type,
                raw: &[u8],
            ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
                <i32 as tokio_postgres::types::FromSql>::from_sql(ty, raw)
                    .map(Self)
            }
        }

        impl tokio_postgres::types::ToSql for $name {
            tokio_postgres::types::accepts!(INT4);

            tokio_postgres::types::to_sql_checked!();

            fn to_sql(
                &self,
                ty: &tokio_postgres::types::Type,
                out: &mut tokio_postgres::types::private::BytesMut,
            ) -> Result<
                tokio_postgres::types::IsNull,
                Box<dyn std::error::Error + Sync + Send>,
            > {
                tokio_postgres::types::ToSql::to_sql(&self.0, ty, out)
            }
        }
    };
}

/// Maps an enum stored as `TEXT` through its `as_str()` and `FromStr`.
macro_rules! text_enum {
    ($name:ident) => {
        impl tokio_postgres::types::FromSql<'_> for $name {
            tokio_postgres::types::accepts!(TEXT, VARCHAR, BPCHAR);

            fn from_sql(
                ty: &tokio_postgres::types::Type,
                raw: &[u8],
            ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
                let repr =
                    <&str as tokio_postgres::types::FromSql>::from_sql(ty, raw)?;
                repr.parse::<Self>().map_err(|_| {
                    format!(
                        "invalid {}: {repr}",
                        stringify!($name).to_lowercase(),
                    )
                    .into()
                })
            }
        }

        impl tokio_postgres::types::ToSql for $name {
            tokio_postgres::types::accepts!(TEXT, VARCHAR, BPCHAR);

            tokio_postgres::types::to_sql_checked!();

            fn to_sql(
                &self,
                ty: &tokio_postgres::types::Type,
                out: &mut tokio_postgres::types::private::BytesMut,
            ) -> Result<
                tokio_postgres::types::IsNull,
                Box<dyn std::error::Error + Sync + Send>,
            > {
                tokio_postgres::types::ToSql::to_sql(&self.as_str(), ty, out)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use {int_id, text_enum};

/// Whether `err` is a violation of the partial unique index that keeps a
/// single BOOKED ticket per seat and schedule.
pub fn is_unique_violation(err: &Error) -> bool {
    err.code() == Some(&tokio_postgres::error::SqlState::UNIQUE_VIOLATION)
}
