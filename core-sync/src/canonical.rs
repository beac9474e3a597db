//! Majority-vote field values within a match group

use core_catalog::{MetadataField, StreamId, StreamRecord};
use std::collections::HashMap;

/// Most frequent non-empty value of `field` among `members`.
///
/// Ties go to the value held by the member with the lowest id. Returns `None`
/// when no member has a value. Member order does not matter.
pub fn canonical_value(field: MetadataField, members: &[StreamRecord]) -> Option<String> {
    // value -> (occurrences, lowest id holding it)
    let mut tally: HashMap<&str, (usize, StreamId)> = HashMap::new();

    for member in members {
        if let Some(value) = member.metadata(field) {
            tally
                .entry(value)
                .and_modify(|(count, lowest)| {
                    *count += 1;
                    *lowest = (*lowest).min(member.id);
                })
                .or_insert((1, member.id));
        }
    }

    tally
        .into_iter()
        .max_by(|(_, (count_a, lowest_a)), (_, (count_b, lowest_b))| {
            count_a.cmp(count_b).then_with(|| lowest_b.cmp(lowest_a))
        })
        .map(|(value, _)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_catalog::{ProviderId, UserId};

    fn with_logo(id: i64, logo: Option<&str>) -> StreamRecord {
        let record =
            StreamRecord::new(StreamId(id), ProviderId(1), UserId(1), format!("u{}", id), "CNN");
        match logo {
            Some(logo) => record.with_metadata(MetadataField::Logo, logo),
            None => record,
        }
    }

    #[test]
    fn test_majority_wins() {
        let members = vec![
            with_logo(1, Some("B")),
            with_logo(2, Some("A")),
            with_logo(3, Some("A")),
            with_logo(4, Some("A")),
        ];
        assert_eq!(canonical_value(MetadataField::Logo, &members), Some("A".to_string()));
    }

    #[test]
    fn test_tie_goes_to_lowest_id() {
        let members = vec![
            with_logo(7, Some("A")),
            with_logo(3, Some("B")),
            with_logo(9, Some("A")),
            with_logo(5, Some("B")),
        ];
        assert_eq!(canonical_value(MetadataField::Logo, &members), Some("B".to_string()));

        let mut reversed = members.clone();
        reversed.reverse();
        assert_eq!(canonical_value(MetadataField::Logo, &reversed), Some("B".to_string()));
    }

    #[test]
    fn test_empty_values_never_vote() {
        let members = vec![
            with_logo(1, None),
            with_logo(2, Some("   ")),
            with_logo(3, None),
            with_logo(4, Some("A")),
        ];
        assert_eq!(canonical_value(MetadataField::Logo, &members), Some("A".to_string()));
    }

    #[test]
    fn test_no_values_means_no_canonical() {
        let members = vec![with_logo(1, None), with_logo(2, Some(""))];
        assert_eq!(canonical_value(MetadataField::Logo, &members), None);
        assert_eq!(canonical_value(MetadataField::Logo, &[]), None);
    }
}
