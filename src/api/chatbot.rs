use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::user;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageInput {
    pub message: String,
    #[serde(default)]
    pub user_id: Option<user::Id>,
}

/// Assistant answer to one message.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Reply {
    pub intent: String,
    pub reply: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}
