use sqlx::SqliteConnection;

use crate::{
    db_types::{NewUser, User},
    traits::MarketplaceError,
};

pub async fn insert_user(user: NewUser, conn: &mut SqliteConnection) -> Result<User, MarketplaceError> {
    let email = user.email.clone();
    let user = sqlx::query_as(
        r#"
            INSERT INTO users (email, display_name) VALUES ($1, $2)
            RETURNING *;
        "#,
    )
    .bind(user.email)
    .bind(user.display_name)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => MarketplaceError::UserAlreadyExists(email),
        _ => MarketplaceError::from(e),
    })?;
    Ok(user)
}

pub async fn fetch_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<User>, MarketplaceError> {
    let user = sqlx::query_as(r#"SELECT * FROM users WHERE id = ?"#).bind(user_id).fetch_optional(conn).await?;
    Ok(user)
}

pub async fn update_average_rating(
    user_id: i64,
    average: f64,
    conn: &mut SqliteConnection,
) -> Result<(), MarketplaceError> {
    let result =
        sqlx::query("UPDATE users SET average_rating = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
            .bind(average)
            .bind(user_id)
            .execute(conn)
            .await?;
    if result.rows_affected() == 0 {
        return Err(MarketplaceError::UserNotFound(user_id));
    }
    Ok(())
}
