use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use crate::money::{deserialize_decimal, parse_decimal};

/// Priced product record supplied by the catalog collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: String,
    pub name: String,
    pub category: String,
    pub unit: String,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub price: BigDecimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Record that was rejected while building a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogIssue {
    pub record: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    pub reason: String,
}

/// Validated, ordered product list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Catalog {
    products: Vec<CatalogProduct>,
    issues: Vec<CatalogIssue>,
}

impl Catalog {
    /// Keeps well-formed records in their original order and reports the rest.
    pub fn from_products(records: Vec<CatalogProduct>) -> Self {
        Self::from_numbered(
            records
                .into_iter()
                .enumerate()
                .map(|(index, product)| (index + 1, product)),
        )
    }

    /// Validates products tagged with their 1-based source record number.
    fn from_numbered(records: impl Iterator<Item = (usize, CatalogProduct)>) -> Self {
        let mut seen = BTreeSet::new();
        let mut products = Vec::new();
        let mut issues = Vec::new();

        for (record, product) in records {
            let product_id = (!product.id.trim().is_empty()).then(|| product.id.clone());

            let problem = if product.id.trim().is_empty() {
                Some("missing product id".to_string())
            } else if product.name.trim().is_empty() {
                Some("missing product name".to_string())
            } else if product.price < BigDecimal::zero() {
                Some(format!("negative price {}", product.price))
            } else if !seen.insert(product.id.clone()) {
                Some(format!("duplicate product id {}", product.id))
            } else {
                None
            };

            match problem {
                Some(reason) => issues.push(CatalogIssue {
                    record,
                    product_id,
                    reason,
                }),
                None => products.push(product),
            }
        }

        Self { products, issues }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Reads `id,name,category,unit,price[,description]` rows.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut records = Vec::new();
        let mut price_issues = Vec::new();

        for (index, row) in csv_reader.deserialize::<CatalogRow>().enumerate() {
            let row = row?;
            match parse_decimal(&row.price) {
                Some(price) => records.push((
                    index + 1,
                    CatalogProduct {
                        id: row.id,
                        name: row.name,
                        category: row.category,
                        unit: row.unit,
                        price,
                        description: row.description,
                    },
                )),
                None => price_issues.push(CatalogIssue {
                    record: index + 1,
                    product_id: Some(row.id),
                    reason: format!("unparsable price '{}'", row.price),
                }),
            }
        }

        let mut catalog = Self::from_numbered(records.into_iter());
        if !price_issues.is_empty() {
            catalog.issues.extend(price_issues);
            catalog.issues.sort_by_key(|issue| issue.record);
        }
        Ok(catalog)
    }

    pub fn products(&self) -> &[CatalogProduct] {
        &self.products
    }

    pub fn issues(&self) -> &[CatalogIssue] {
        &self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    id: String,
    name: String,
    category: String,
    unit: String,
    price: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    description: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid catalog CSV data: {0}")]
    Csv(#[from] csv::Error),
}
