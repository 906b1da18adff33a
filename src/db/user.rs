use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Error, Row,
};

use super::{int_id, text_enum, Client};

#[derive(Clone, Debug)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub password_hash: PasswordHash,
}

int_id!(Id);

/// Stored in any casing: `admin`, `ADMIN` and `Admin` are the same role.
#[derive(
    Clone, Copy, Debug, Deserialize, enum_utils::FromStr, Eq, PartialEq,
    Serialize,
)]
#[enumeration(case_insensitive)]
#[enumeration(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
    BusCompany,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::BusCompany => "bus_company",
        }
    }

    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

text_enum!(Role);

/// Hex-encoded SHA-256 digest of a password.
#[derive(Clone, Debug, PartialEq)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(secret: &str) -> Self {
        Self(hex::encode(Sha256::digest(secret.as_bytes())))
    }
}

impl FromSql<'_> for PasswordHash {
    accepts!(TEXT);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        String::from_sql(ty, raw).map(|s| Self(s.to_ascii_lowercase()))
    }
}

impl ToSql for PasswordHash {
    accepts!(TEXT);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

fn from_row(row: &Row) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        phone: row.get("phone"),
        role: row.get("role"),
        password_hash: row.get("password_hash"),
    }
}

impl Client {
    pub async fn get_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<User>, Error> {
        const SQL: &str = "SELECT id, username, email, phone, role, \
                                  password_hash \
                           FROM users \
                           WHERE lower(email) = lower($1) AND is_active \
                           LIMIT 1";
        Ok(self.0.query_opt(SQL, &[&email]).await?.as_ref().map(from_row))
    }

    pub async fn get_user_by_id(&self, id: Id) -> Result<Option<User>, Error> {
        const SQL: &str = "SELECT id, username, email, phone, role, \
                                  password_hash \
                           FROM users \
                           WHERE id = $1 AND is_active \
                           LIMIT 1";
        Ok(self.0.query_opt(SQL, &[&id]).await?.as_ref().map(from_row))
    }
}
