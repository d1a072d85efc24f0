use sqlx::SqliteConnection;

use crate::{
    db_types::{NewReview, Review},
    traits::MarketplaceError,
};

pub async fn insert_review(review: NewReview, conn: &mut SqliteConnection) -> Result<Review, MarketplaceError> {
    let NewReview { reviewer_id, reviewee_id, shopping_list_id, .. } = review;
    let review = sqlx::query_as(
        r#"
            INSERT INTO reviews (
                reviewer_id, reviewee_id, shopping_list_id, rating, comment,
                communication_rating, timeliness_rating, accuracy_rating
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(reviewer_id)
    .bind(reviewee_id)
    .bind(shopping_list_id)
    .bind(review.rating)
    .bind(review.comment)
    .bind(review.communication_rating)
    .bind(review.timeliness_rating)
    .bind(review.accuracy_rating)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            MarketplaceError::ReviewAlreadyExists { reviewer_id, list_id: shopping_list_id }
        },
        _ => MarketplaceError::from(e),
    })?;
    Ok(review)
}

/// The arithmetic mean of every rating the user has received, or 0 for a user with no reviews yet. Recomputed from
/// scratch on each call; the review flow writes the result back to the user record.
pub async fn average_rating_for(reviewee_id: i64, conn: &mut SqliteConnection) -> Result<f64, MarketplaceError> {
    let avg: Option<f64> = sqlx::query_scalar("SELECT AVG(rating) FROM reviews WHERE reviewee_id = ?")
        .bind(reviewee_id)
        .fetch_one(conn)
        .await?;
    Ok(avg.unwrap_or(0.0))
}

pub async fn reviews_for(reviewee_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Review>, MarketplaceError> {
    let reviews = sqlx::query_as("SELECT * FROM reviews WHERE reviewee_id = ? ORDER BY created_at DESC, id DESC")
        .bind(reviewee_id)
        .fetch_all(conn)
        .await?;
    Ok(reviews)
}
