use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account owned by the authentication system; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}
