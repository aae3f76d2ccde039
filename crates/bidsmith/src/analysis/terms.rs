use super::dictionary::{TermDefinition, TermDictionary};
use crate::matching::{normalize, ApproximateMatcher};

/// Best occurrence of a dictionary term on one page.
#[derive(Debug, Clone)]
pub(crate) struct TermHit<'d> {
    pub definition: &'d TermDefinition,
    pub similarity: f64,
    /// 1-based line of the strongest occurrence.
    pub line_number: u32,
    /// Every line on the page where the term cleared the threshold.
    pub occurrences: Vec<u32>,
}

impl TermHit<'_> {
    /// Distance in lines from `line_number` to the closest occurrence.
    pub fn distance_to(&self, line_number: u32) -> u32 {
        self.occurrences
            .iter()
            .map(|occurrence| occurrence.abs_diff(line_number))
            .min()
            .unwrap_or(u32::MAX)
    }
}

/// Scans one page for every dictionary term, keeping hits whose similarity is strictly
/// above `threshold`. Hits come back in dictionary order.
pub(crate) fn find_terms<'d>(
    lines: &[&str],
    dictionary: &'d TermDictionary,
    matcher: &dyn ApproximateMatcher,
    threshold: f64,
) -> Vec<TermHit<'d>> {
    let tokenized: Vec<Vec<String>> = lines
        .iter()
        .map(|line| normalize(line).split_whitespace().map(str::to_string).collect())
        .collect();

    dictionary
        .entries()
        .iter()
        .filter_map(|definition| {
            let needle = definition.search_text();
            let width = needle.split_whitespace().count();
            if width == 0 {
                return None;
            }

            let mut best: Option<(f64, u32)> = None;
            let mut occurrences = Vec::new();
            for (index, tokens) in tokenized.iter().enumerate() {
                let score = line_similarity(tokens, &needle, width, matcher);
                if score <= threshold {
                    continue;
                }
                let line_number = index as u32 + 1;
                occurrences.push(line_number);
                if best.map_or(true, |(current, _)| score > current) {
                    best = Some((score, line_number));
                }
            }

            best.map(|(similarity, line_number)| TermHit {
                definition,
                similarity,
                line_number,
                occurrences,
            })
        })
        .collect()
}

fn line_similarity(
    tokens: &[String],
    needle: &str,
    width: usize,
    matcher: &dyn ApproximateMatcher,
) -> f64 {
    if tokens.len() < width {
        return 0.0;
    }

    let mut best = 0.0_f64;
    for window in tokens.windows(width) {
        let candidate = window.join(" ");
        if candidate == needle {
            return 1.0;
        }
        best = best.max(matcher.similarity(&candidate, needle));
    }
    best.clamp(0.0, 1.0)
}

/// The line plus its immediate neighbours, trimmed and capped at `max_chars`.
pub(crate) fn surrounding_context(lines: &[&str], line_number: u32, max_chars: usize) -> String {
    let index = (line_number as usize).saturating_sub(1);
    let start = index.saturating_sub(1);
    let end = (index + 2).min(lines.len());

    let joined = lines[start..end]
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    truncate(&joined, max_chars)
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::TokenSortMatcher;

    fn hits(page: &str) -> Vec<(String, u32)> {
        let lines: Vec<&str> = page.lines().collect();
        let dictionary = TermDictionary::standard();
        find_terms(&lines, &dictionary, &TokenSortMatcher, 0.8)
            .into_iter()
            .map(|hit| (hit.definition.term.clone(), hit.line_number))
            .collect()
    }

    #[test]
    fn finds_multi_word_terms_across_separators() {
        let found = hits("SECTION 51\nStamped-concrete finish at abutments\nRetaining walls per plan");
        assert!(found.contains(&("STAMPED_CONCRETE".to_string(), 2)));
        assert!(found.contains(&("RETAINING_WALL".to_string(), 3)));
    }

    #[test]
    fn tolerates_plurals_and_minor_misspellings() {
        let found = hits("Furnish balluster units\nInstall blockouts at joints");
        assert!(found.contains(&("BALUSTER".to_string(), 1)));
        assert!(found.contains(&("BLOCKOUT".to_string(), 2)));
    }

    #[test]
    fn ignores_unrelated_text() {
        assert!(hits("General conditions apply to all work.").is_empty());
    }

    #[test]
    fn records_every_occurrence_on_the_page() {
        let lines = ["BALUSTER", "unrelated", "baluster detail"];
        let dictionary = TermDictionary::standard();
        let found = find_terms(&lines, &dictionary, &TokenSortMatcher, 0.8);
        let baluster = found
            .iter()
            .find(|hit| hit.definition.term == "BALUSTER")
            .expect("baluster found");
        assert_eq!(baluster.occurrences, vec![1, 3]);
        assert_eq!(baluster.distance_to(2), 1);
    }

    #[test]
    fn context_is_bounded() {
        let lines = ["first", "second line", "third", "fourth"];
        assert_eq!(surrounding_context(&lines, 2, 200), "first second line third");
        assert_eq!(truncate("abcdefghij", 6), "abc...");
    }
}
