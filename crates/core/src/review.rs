//! Review filter - selects the export-eligible subset of a card list.

use crate::card::{Flashcard, ReviewStatus};

/// Stable sub-sequence of `cards` whose status is in `wanted`.
///
/// The input is left untouched; relative order is preserved.
pub fn filter(cards: &[Flashcard], wanted: &[ReviewStatus]) -> Vec<Flashcard> {
    cards
        .iter()
        .filter(|card| wanted.contains(&card.status))
        .cloned()
        .collect()
}

/// Cards grouped by review status, each group in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewBuckets {
    /// Approved cards
    pub approved: Vec<Flashcard>,
    /// Rejected cards
    pub rejected: Vec<Flashcard>,
    /// Cards flagged as erroneous
    pub flagged: Vec<Flashcard>,
    /// Cards not yet reviewed
    pub pending: Vec<Flashcard>,
}

/// Partition cards into approved / rejected / flagged / pending.
pub fn partition(cards: &[Flashcard]) -> ReviewBuckets {
    let mut buckets = ReviewBuckets::default();
    for card in cards {
        let bucket = match card.status {
            ReviewStatus::Approved => &mut buckets.approved,
            ReviewStatus::Rejected => &mut buckets.rejected,
            ReviewStatus::FlaggedError => &mut buckets.flagged,
            ReviewStatus::Pending => &mut buckets.pending,
        };
        bucket.push(card.clone());
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deck() -> Vec<Flashcard> {
        vec![
            Flashcard::basic("A", "a").with_status(ReviewStatus::Approved),
            Flashcard::basic("B", "b").with_status(ReviewStatus::Rejected),
            Flashcard::basic("C", "c").with_status(ReviewStatus::Approved),
            Flashcard::basic("D", "d").with_status(ReviewStatus::FlaggedError),
            Flashcard::basic("E", "e"),
        ]
    }

    fn questions(cards: &[Flashcard]) -> Vec<String> {
        cards
            .iter()
            .map(|c| match &c.content {
                crate::CardContent::Basic { question, .. } => question.clone(),
                _ => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn test_filter_preserves_order() {
        let cards = deck();
        let approved = filter(&cards, &[ReviewStatus::Approved]);
        assert_eq!(questions(&approved), vec!["A", "C"]);
        assert_eq!(approved[0].id, cards[0].id);
        // input untouched
        assert_eq!(cards.len(), 5);
    }

    #[test]
    fn test_filter_multiple_statuses() {
        let cards = deck();
        let picked = filter(&cards, &[ReviewStatus::Pending, ReviewStatus::FlaggedError]);
        assert_eq!(questions(&picked), vec!["D", "E"]);
    }

    #[test]
    fn test_filter_nothing_wanted() {
        assert!(filter(&deck(), &[]).is_empty());
    }

    #[test]
    fn test_partition() {
        let buckets = partition(&deck());
        assert_eq!(questions(&buckets.approved), vec!["A", "C"]);
        assert_eq!(questions(&buckets.rejected), vec!["B"]);
        assert_eq!(questions(&buckets.flagged), vec!["D"]);
        assert_eq!(questions(&buckets.pending), vec!["E"]);
    }
}
