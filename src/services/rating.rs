use rusqlite::Connection;

use crate::db::queries;

pub fn mean_rating(ratings: &[u8]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let sum: u64 = ratings.iter().map(|&r| u64::from(r)).sum();
    Some(sum as f64 / ratings.len() as f64)
}

/// Recomputes a provider's rating from every reviewed booking they have.
/// Leaves the stored rating untouched when nothing has been reviewed.
pub fn recompute_provider_rating(conn: &Connection, provider_id: &str) -> anyhow::Result<Option<f64>> {
    let ratings = queries::ratings_for_provider(conn, provider_id)?;
    let average = mean_rating(&ratings);

    if let Some(avg) = average {
        queries::set_provider_rating(conn, provider_id, avg)?;
        tracing::debug!(provider_id, rating = avg, reviews = ratings.len(), "provider rating updated");
    }

    Ok(average)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_of_nothing_is_none() {
        assert_eq!(mean_rating(&[]), None);
    }

    #[test]
    fn test_exact_arithmetic_mean() {
        assert_eq!(mean_rating(&[5]), Some(5.0));
        assert_eq!(mean_rating(&[5, 2]), Some(3.5));
        assert_eq!(mean_rating(&[1, 2, 2]), Some(5.0 / 3.0));
    }
}
