use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use super::catalog::Catalog;
use super::similarity::{normalize, ApproximateMatcher};

pub const DEFAULT_MIN_SCORE: f64 = 0.5;
pub const DEFAULT_MAX_CANDIDATES: usize = 5;
const CATEGORY_HINT_BONUS: f64 = 0.05;

/// Catalog product proposed for a term, produced per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCandidate {
    pub product_id: String,
    pub name: String,
    pub match_score: f64,
    pub price: BigDecimal,
    pub unit: String,
    pub category: String,
}

/// Ranks catalog products against a term. Holds no mutable state.
pub struct ProductMatcher<'a> {
    matcher: &'a dyn ApproximateMatcher,
    min_score: f64,
    max_candidates: usize,
}

impl<'a> ProductMatcher<'a> {
    pub fn new(matcher: &'a dyn ApproximateMatcher) -> Self {
        Self {
            matcher,
            min_score: DEFAULT_MIN_SCORE,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    /// Candidates sorted by descending score; ties go to the cheaper product.
    pub fn candidates(
        &self,
        term: &str,
        category_hint: Option<&str>,
        catalog: &Catalog,
    ) -> Vec<ProductCandidate> {
        let query = normalize(term);
        if query.is_empty() {
            return Vec::new();
        }
        let hint = category_hint.map(normalize).filter(|hint| !hint.is_empty());

        let mut candidates: Vec<ProductCandidate> = catalog
            .products()
            .iter()
            .filter_map(|product| {
                let name_score = self.matcher.similarity(&query, &product.name);
                let description_score = product
                    .description
                    .as_deref()
                    .map(|description| self.matcher.similarity(&query, description))
                    .unwrap_or(0.0);

                let mut score = name_score.max(description_score);
                if let Some(hint) = &hint {
                    let category = normalize(&product.category);
                    if !category.is_empty() && (category.contains(hint) || hint.contains(&category))
                    {
                        score += CATEGORY_HINT_BONUS;
                    }
                }
                let score = score.clamp(0.0, 1.0);

                (score >= self.min_score).then(|| ProductCandidate {
                    product_id: product.id.clone(),
                    name: product.name.clone(),
                    match_score: score,
                    price: product.price.clone(),
                    unit: product.unit.clone(),
                    category: product.category.clone(),
                })
            })
            .collect();

        candidates.sort_by(|left, right| {
            right
                .match_score
                .total_cmp(&left.match_score)
                .then_with(|| left.price.cmp(&right.price))
                .then_with(|| left.product_id.cmp(&right.product_id))
        });
        candidates.truncate(self.max_candidates);
        candidates
    }
}
