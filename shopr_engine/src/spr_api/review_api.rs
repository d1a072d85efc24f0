use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewReview, Review},
    events::{EventProducers, ReviewRecordedEvent},
    traits::{MarketplaceDatabase, MarketplaceError},
};

/// `ReviewApi` is the review-subsystem boundary: it records reviews and keeps the reviewee's average rating current.
/// The rating shown to clients when they pick among bids comes from the aggregate this API maintains.
pub struct ReviewApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for ReviewApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReviewApi")
    }
}

impl<B> ReviewApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> ReviewApi<B>
where B: MarketplaceDatabase
{
    /// Records a review and recomputes the reviewee's average rating in the same atomic unit.
    ///
    /// One review per reviewer per list; a duplicate fails with [`MarketplaceError::ReviewAlreadyExists`]. The
    /// review-recorded hook fires after the commit, carrying the new average.
    pub async fn record_review(&self, review: NewReview) -> Result<Review, MarketplaceError> {
        validate_review(&review)?;
        let (review, new_average) = self.db.record_review(review).await?;
        debug!("⭐️ User {} rated user {} {} stars on list {}", review.reviewer_id, review.reviewee_id, review.rating, review.shopping_list_id);
        self.call_review_recorded_hook(&review, new_average).await;
        Ok(review)
    }

    async fn call_review_recorded_hook(&self, review: &Review, new_average: f64) {
        for emitter in &self.producers.review_recorded_producer {
            debug!("⭐️ Notifying review recorded hook subscribers");
            let event = ReviewRecordedEvent::new(review.clone(), new_average);
            emitter.publish_event(event).await;
        }
    }

    /// The rating aggregate consumed when rendering bid listings.
    pub async fn average_rating(&self, user_id: i64) -> Result<f64, MarketplaceError> {
        self.db.average_rating(user_id).await
    }

    /// All reviews a user has received, newest first.
    pub async fn reviews_for(&self, reviewee_id: i64) -> Result<Vec<Review>, MarketplaceError> {
        self.db.reviews_for(reviewee_id).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

fn validate_review(review: &NewReview) -> Result<(), MarketplaceError> {
    let in_range = |r: i64| (1..=5).contains(&r);
    if !in_range(review.rating) {
        return Err(MarketplaceError::Validation(format!("Rating must be between 1 and 5, got {}", review.rating)));
    }
    for (name, rating) in [
        ("communication", review.communication_rating),
        ("timeliness", review.timeliness_rating),
        ("accuracy", review.accuracy_rating),
    ] {
        if let Some(r) = rating {
            if !in_range(r) {
                return Err(MarketplaceError::Validation(format!(
                    "The {name} rating must be between 1 and 5, got {r}"
                )));
            }
        }
    }
    Ok(())
}
