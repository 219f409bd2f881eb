use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::User;

pub fn register_user(
    conn: &Connection,
    name: Option<String>,
    email: Option<String>,
) -> Result<User, AppError> {
    let name = name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::InvalidInput("name is required".to_string()))?;
    let email = email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| e.contains('@'))
        .ok_or_else(|| AppError::InvalidInput("a valid email is required".to_string()))?;

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        name,
        email,
    };

    match queries::insert_user(conn, &user) {
        Ok(()) => {
            tracing::info!(user_id = %user.id, "user registered");
            Ok(user)
        }
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Err(AppError::Conflict("email is already registered".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}
