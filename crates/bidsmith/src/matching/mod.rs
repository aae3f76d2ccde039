//! Approximate text matching and catalog product ranking.

pub mod catalog;
mod product;
mod similarity;

pub use catalog::{Catalog, CatalogError, CatalogIssue, CatalogProduct};
pub use product::{ProductCandidate, ProductMatcher, DEFAULT_MAX_CANDIDATES, DEFAULT_MIN_SCORE};
pub use similarity::{normalize, ApproximateMatcher, TokenSortMatcher};
