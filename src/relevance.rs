//! Picks the case studies shown under "More case studies"

use std::cmp::Reverse;

use crate::models::CaseStudy;
use crate::models::Tags;

/// How many recent case studies are considered
pub const RELATED_WINDOW: usize = 10;
/// How many related case studies are shown
pub const MAX_RELATED: usize = 3;

/// Orders `candidates` by the number of tags they share with `current_tags`, then by
/// most recent date, and keeps the first [MAX_RELATED]
///
/// The case study at `current_slug` is never returned. Candidates that tie on both keys
/// keep their input order.
pub fn rank_related(
    current_slug: &str,
    current_tags: &Tags,
    candidates: Vec<CaseStudy>,
) -> Vec<CaseStudy> {
    let mut scored: Vec<(usize, CaseStudy)> = candidates
        .into_iter()
        .filter(|candidate| candidate.slug != current_slug)
        .map(|candidate| (current_tags.shared_with(&candidate.tags), candidate))
        .collect();
    scored.sort_by_key(|(score, candidate)| Reverse((*score, candidate.date)));
    scored
        .into_iter()
        .take(MAX_RELATED)
        .map(|(_, candidate)| candidate)
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;
    use crate::models::case_study::fixtures::case_study;

    fn slugs(ranked: &[CaseStudy]) -> Vec<&str> {
        ranked.iter().map(|cs| cs.slug.as_str()).collect()
    }

    fn tags(tags: &[&str]) -> Tags {
        tags.iter().copied().collect()
    }

    #[test]
    fn empty_candidates_give_nothing() {
        assert!(rank_related("current", &tags(&["ai"]), vec![]).is_empty());
    }

    #[test]
    fn shared_tags_beat_recency() {
        let candidates = vec![
            case_study("recent-unrelated", "2024-06-01", &["crm"]),
            case_study("old-related", "2020-01-01", &["ai", "voice"]),
            case_study("mid-partial", "2022-01-01", &["ai"]),
            case_study("recent-partial", "2023-01-01", &["voice"]),
        ];
        let ranked = rank_related("current", &tags(&["ai", "voice"]), candidates);
        assert_eq!(
            slugs(&ranked),
            ["old-related", "recent-partial", "mid-partial"]
        );
    }

    #[test]
    fn current_case_study_is_excluded_even_if_passed() {
        let candidates = vec![
            case_study("current", "2024-06-01", &["ai"]),
            case_study("other", "2024-01-01", &["ai"]),
        ];
        let ranked = rank_related("current", &tags(&["ai"]), candidates);
        assert_eq!(slugs(&ranked), ["other"]);
    }

    #[rstest]
    #[case::exact_match(&["AI"], &["AI"], 1)]
    #[case::case_sensitive(&["AI"], &["ai"], 0)]
    #[case::no_trimming(&["AI"], &["AI "], 0)]
    fn tag_matching_is_exact(
        #[case] current: &[&str],
        #[case] candidate: &[&str],
        #[case] expected_score: usize,
    ) {
        assert_eq!(tags(current).shared_with(&tags(candidate)), expected_score);
    }

    #[test]
    fn full_ties_keep_input_order() {
        let candidates = vec![
            case_study("first", "2024-01-01", &["ai"]),
            case_study("second", "2024-01-01", &["ai"]),
        ];
        let ranked = rank_related("current", &tags(&["ai"]), candidates);
        assert_eq!(slugs(&ranked), ["first", "second"]);
    }

    const TAG_POOL: &[&str] = &["ai", "AI", "voice", "saas", "crm", "real estate"];

    fn arb_case_study(index: usize) -> impl Strategy<Value = CaseStudy> {
        (
            prop::sample::subsequence(TAG_POOL.to_vec(), 0..=TAG_POOL.len()),
            0u32..2000,
            prop::bool::weighted(0.1),
        )
            .prop_map(move |(tags, day, is_current)| {
                let slug = if is_current {
                    "current".to_owned()
                } else {
                    format!("candidate-{index}")
                };
                let date = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
                    + chrono::Days::new(day.into());
                case_study(&slug, &date.format("%Y-%m-%d").to_string(), &tags)
            })
    }

    fn arb_candidates() -> impl Strategy<Value = Vec<CaseStudy>> {
        (0usize..12).prop_flat_map(|len| {
            (0..len).map(arb_case_study).collect::<Vec<_>>()
        })
    }

    proptest! {
        #[test]
        fn ranking_properties(
            current in prop::sample::subsequence(TAG_POOL.to_vec(), 0..=TAG_POOL.len()),
            candidates in arb_candidates(),
        ) {
            let current = tags(&current);
            let ranked = rank_related("current", &current, candidates.clone());

            prop_assert!(ranked.len() <= MAX_RELATED);
            prop_assert!(ranked.iter().all(|cs| cs.slug != "current"));
            let eligible = candidates.iter().filter(|cs| cs.slug != "current").count();
            prop_assert_eq!(ranked.len(), eligible.min(MAX_RELATED));

            for pair in ranked.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                let (score_a, score_b) = (current.shared_with(&a.tags), current.shared_with(&b.tags));
                prop_assert!(score_a >= score_b);
                if score_a == score_b {
                    prop_assert!(a.date >= b.date);
                }
            }

            // Nothing left out outranks what was kept
            if let Some(last) = ranked.last() {
                let last_key = (current.shared_with(&last.tags), last.date);
                for left_out in candidates
                    .iter()
                    .filter(|cs| cs.slug != "current" && !ranked.iter().any(|r| r.id == cs.id))
                {
                    prop_assert!((current.shared_with(&left_out.tags), left_out.date) <= last_key);
                }
            }
        }
    }
}
