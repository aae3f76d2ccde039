use std::collections::BTreeSet;

/// Capability for scoring how alike two pieces of text are.
///
/// Implementations return a value on a normalized `0.0..=1.0` scale and must be pure:
/// the same pair of inputs always yields the same score.
pub trait ApproximateMatcher: Send + Sync {
    fn similarity(&self, left: &str, right: &str) -> f64;
}

/// Token based matcher: the better of a token-sort ratio and a token-set ratio, both
/// computed on Levenshtein distance over normalized text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSortMatcher;

impl ApproximateMatcher for TokenSortMatcher {
    fn similarity(&self, left: &str, right: &str) -> f64 {
        let left_tokens = tokens(left);
        let right_tokens = tokens(right);
        if left_tokens.is_empty() || right_tokens.is_empty() {
            return 0.0;
        }

        let sorted = ratio(&sorted_join(&left_tokens), &sorted_join(&right_tokens));
        let set = token_set_ratio(&left_tokens, &right_tokens);
        sorted.max(set).clamp(0.0, 1.0)
    }
}

/// Lowercases and replaces everything that is not alphanumeric with single spaces.
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|ch| {
            if ch.is_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokens(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn sorted_join(tokens: &[String]) -> String {
    let mut sorted: Vec<&str> = tokens.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join(" ")
}

fn token_set_ratio(left: &[String], right: &[String]) -> f64 {
    let left: BTreeSet<&str> = left.iter().map(String::as_str).collect();
    let right: BTreeSet<&str> = right.iter().map(String::as_str).collect();

    let shared: Vec<&str> = left.intersection(&right).copied().collect();
    if shared.is_empty() {
        return 0.0;
    }

    let base = shared.join(" ");
    let with_left = join_parts(&base, left.difference(&right).copied());
    let with_right = join_parts(&base, right.difference(&left).copied());

    ratio(&base, &with_left)
        .max(ratio(&base, &with_right))
        .max(ratio(&with_left, &with_right))
}

fn join_parts<'a>(base: &str, rest: impl Iterator<Item = &'a str>) -> String {
    let mut joined = base.to_string();
    for part in rest {
        joined.push(' ');
        joined.push_str(part);
    }
    joined
}

/// `1 - distance / longest`, over characters.
pub(crate) fn ratio(left: &str, right: &str) -> f64 {
    let left: Vec<char> = left.chars().collect();
    let right: Vec<char> = right.chars().collect();
    let longest = left.len().max(right.len());
    if longest == 0 {
        return 1.0;
    }

    1.0 - levenshtein(&left, &right) as f64 / longest as f64
}

fn levenshtein(left: &[char], right: &[char]) -> usize {
    if left.is_empty() {
        return right.len();
    }
    if right.is_empty() {
        return left.len();
    }

    let mut previous: Vec<usize> = (0..=right.len()).collect();
    let mut current = vec![0; right.len() + 1];

    for (i, left_char) in left.iter().enumerate() {
        current[0] = i + 1;
        for (j, right_char) in right.iter().enumerate() {
            let cost = usize::from(left_char != right_char);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[right.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_scores_one() {
        let matcher = TokenSortMatcher;
        assert_eq!(matcher.similarity("Stamped Concrete", "stamped_concrete"), 1.0);
    }

    #[test]
    fn token_order_is_ignored() {
        let matcher = TokenSortMatcher;
        assert_eq!(matcher.similarity("wall retaining", "RETAINING WALL"), 1.0);
    }

    #[test]
    fn plural_forms_clear_the_term_threshold() {
        let matcher = TokenSortMatcher;
        let score = matcher.similarity("balusters", "baluster");
        assert!(score > 0.8, "score was {score}");
    }

    #[test]
    fn unrelated_words_score_low() {
        let matcher = TokenSortMatcher;
        let score = matcher.similarity("falsework", "formwork");
        assert!(score < 0.8, "score was {score}");
        assert_eq!(matcher.similarity("", "formwork"), 0.0);
    }

    #[test]
    fn product_names_containing_the_term_score_high() {
        let matcher = TokenSortMatcher;
        let score = matcher.similarity("baluster", "Precast Baluster Form Insert");
        assert_eq!(score, 1.0);
    }

    #[test]
    fn levenshtein_counts_edits() {
        let kitten: Vec<char> = "kitten".chars().collect();
        let sitting: Vec<char> = "sitting".chars().collect();
        assert_eq!(levenshtein(&kitten, &sitting), 3);
    }
}
