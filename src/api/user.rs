use serde::{Deserialize, Serialize};

pub use crate::db::user::{Id, PasswordHash, Role};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<crate::db::User> for User {
    fn from(user: crate::db::User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
        }
    }
}
