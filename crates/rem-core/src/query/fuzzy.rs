//! Trigram similarity in the style of PostgreSQL `pg_trgm`.
//!
//! Text is split into alphanumeric words, each lowercased and padded with two
//! leading spaces and one trailing space before extracting trigrams.

use std::collections::HashSet;

/// Trigram set of a text.
pub fn trigrams(text: &str) -> HashSet<String> {
    let mut set = HashSet::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let padded: Vec<char> = format!("  {} ", word.to_lowercase()).chars().collect();
        for window in padded.windows(3) {
            set.insert(window.iter().collect());
        }
    }
    set
}

/// Shared trigrams over all distinct trigrams of both texts, in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f32 {
    let ta = trigrams(a);
    let tb = trigrams(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count();
    let union = ta.len() + tb.len() - shared;
    shared as f32 / union as f32
}

/// Fraction of the query's trigrams found anywhere in `text`, in `[0, 1]`.
///
/// Long summaries are not penalized for their length, so a short query
/// fully contained in a summary scores 1.0.
pub fn word_similarity(query: &str, text: &str) -> f32 {
    let tq = trigrams(query);
    if tq.is_empty() {
        return 0.0;
    }
    let tt = trigrams(text);
    let shared = tq.intersection(&tt).count();
    shared as f32 / tq.len() as f32
}

/// FUZZY score of one entity: the better of key similarity and summary
/// word similarity.
pub fn match_score(query: &str, entity_key: &str, summary: Option<&str>) -> f32 {
    let key_score = similarity(query, entity_key);
    let summary_score = summary.map_or(0.0, |s| word_similarity(query, s));
    key_score.max(summary_score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigrams_pad_words() {
        let set = trigrams("Cat");
        let expected: HashSet<String> = ["  c", " ca", "cat", "at "]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(set, expected);
    }

    #[test]
    fn test_identical_strings_score_one() {
        assert_eq!(similarity("sarah-chen", "Sarah Chen"), 1.0);
    }

    #[test]
    fn test_unrelated_strings_score_low() {
        assert!(similarity("sarah", "quarterly-report") < 0.1);
        assert_eq!(similarity("", "anything"), 0.0);
    }

    #[test]
    fn test_typo_still_scores() {
        let score = similarity("sara chen", "sarah-chen");
        assert!(score > 0.3 && score < 1.0, "score was {}", score);
    }

    #[test]
    fn test_word_similarity_ignores_summary_length() {
        let summary = "Weekly standup where the platform team reviewed the migration plan";
        assert_eq!(word_similarity("migration", summary), 1.0);
        assert!(similarity("migration", summary) < 0.3);
    }

    #[test]
    fn test_match_score_takes_best() {
        let score = match_score("migration", "standup-0412", Some("migration plan review"));
        assert_eq!(score, 1.0);
        assert_eq!(match_score("zzz", "abc", None), 0.0);
    }
}
