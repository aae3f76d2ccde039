use serde::{Deserialize, Serialize};
use std::fmt;

/// Categories of project documents, declared in extraction priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Specifications,
    BidForms,
    ConstructionPlans,
    Supplemental,
}

impl DocumentType {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::Specifications,
            Self::BidForms,
            Self::ConstructionPlans,
            Self::Supplemental,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Specifications => "specifications",
            Self::BidForms => "bid_forms",
            Self::ConstructionPlans => "construction_plans",
            Self::Supplemental => "supplemental",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "specifications" | "specs" => Some(Self::Specifications),
            "bid_forms" | "bid_form" => Some(Self::BidForms),
            "construction_plans" | "plans" => Some(Self::ConstructionPlans),
            "supplemental" | "supplemental_notices" => Some(Self::Supplemental),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// The fixed set of units a quantity may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Unit {
    Sqft,
    Lf,
    Cy,
    Ea,
    Ton,
    Gal,
    Lb,
}

impl Unit {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::Sqft,
            Self::Lf,
            Self::Cy,
            Self::Ea,
            Self::Ton,
            Self::Gal,
            Self::Lb,
        ]
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::Sqft => "SQFT",
            Self::Lf => "LF",
            Self::Cy => "CY",
            Self::Ea => "EA",
            Self::Ton => "TON",
            Self::Gal => "GAL",
            Self::Lb => "LB",
        }
    }

    /// Maps a unit code or common abbreviation onto the enum.
    pub fn parse(value: &str) -> Option<Self> {
        let compact: String = value
            .chars()
            .filter(|ch| ch.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();

        match compact.as_str() {
            "SQFT" | "SF" => Some(Self::Sqft),
            "LF" | "LINFT" => Some(Self::Lf),
            "CY" | "CUYD" => Some(Self::Cy),
            "EA" | "EACH" => Some(Self::Ea),
            "TON" | "TONS" | "TN" => Some(Self::Ton),
            "GAL" | "GALS" | "GALLON" | "GALLONS" => Some(Self::Gal),
            "LB" | "LBS" => Some(Self::Lb),
            _ => None,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.code())
    }
}

/// Material grouping of a domain term; keys the waste and fallback price tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialCategory {
    BridgeBarrier,
    Formwork,
    Concrete,
    TemporaryStructures,
    Lumber,
    Hardware,
    Specialty,
}

impl MaterialCategory {
    pub const fn label(self) -> &'static str {
        match self {
            Self::BridgeBarrier => "bridge_barrier",
            Self::Formwork => "formwork",
            Self::Concrete => "concrete",
            Self::TemporaryStructures => "temporary_structures",
            Self::Lumber => "lumber",
            Self::Hardware => "hardware",
            Self::Specialty => "specialty",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Identifier of an extracted quantity, unique within a project analysis.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuantityId(pub String);

impl QuantityId {
    pub(crate) fn new(document_type: DocumentType, page_number: u32, ordinal: usize) -> Self {
        Self(format!(
            "{}-p{page_number}-q{ordinal:03}",
            document_type.label()
        ))
    }
}

impl fmt::Display for QuantityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A numeric value with a recognised unit, found in one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedQuantity {
    pub id: QuantityId,
    pub value: f64,
    pub unit: Unit,
    pub context: String,
    pub page_number: u32,
    pub line_number: u32,
    pub confidence: f64,
    pub source_document: DocumentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_associated: Option<String>,
}

/// A canonical domain term located in one page of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermMatch {
    pub term: String,
    pub category: MaterialCategory,
    pub priority: Priority,
    pub context: String,
    pub page_number: u32,
    pub line_number: u32,
    pub confidence: f64,
    pub source_document: DocumentType,
    pub associated_quantities: Vec<QuantityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_reference: Option<CrossReferenceTag>,
}

impl TermMatch {
    /// Copy of this match carrying the project-level cross-reference tag.
    pub fn tagged(&self, tag: CrossReferenceTag) -> Self {
        Self {
            cross_reference: Some(tag),
            ..self.clone()
        }
    }
}

/// Project-level annotation attached to a term once every document has been compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReferenceTag {
    pub documents: Vec<DocumentType>,
    pub status: TermStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermStatus {
    Consistent,
    Discrepancy,
    ScopeAddition,
    SingleSource,
}

/// A row of an official bid schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficialBidItem {
    pub item_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_code: Option<String>,
    pub description: String,
    pub unit: Unit,
    pub quantity: f64,
    pub quantity_id: QuantityId,
    pub page_number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Info,
    Warning,
    High,
    Critical,
}

impl AlertLevel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Condition that raised an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    MissingDocument,
    ExtractionFailure,
    UnquantifiedTerm,
    HighQuantity,
    LowTextQuality,
    QuantityDiscrepancy,
    ScopeAddition,
    MissingBidQuantity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub kind: AlertKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<ExtractedQuantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
}

impl Alert {
    pub fn new(level: AlertLevel, kind: AlertKind, message: impl Into<String>) -> Self {
        Self {
            level,
            kind,
            message: message.into(),
            document: None,
            term: None,
            quantity: None,
            page_number: None,
        }
    }

    pub fn in_document(mut self, document: DocumentType) -> Self {
        self.document = Some(document);
        self
    }

    pub fn for_term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    pub fn for_quantity(mut self, quantity: &ExtractedQuantity) -> Self {
        self.page_number = Some(quantity.page_number);
        self.quantity = Some(quantity.clone());
        self
    }

    pub fn on_page(mut self, page_number: u32) -> Self {
        self.page_number = Some(page_number);
        self
    }
}

/// Human readable label for a canonical term, e.g. `STAMPED_CONCRETE` -> `Stamped Concrete`.
pub fn term_label(term: &str) -> String {
    term.split(['_', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let lower = part.to_ascii_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_parse_accepts_common_abbreviations() {
        assert_eq!(Unit::parse("sq ft"), Some(Unit::Sqft));
        assert_eq!(Unit::parse("SF"), Some(Unit::Sqft));
        assert_eq!(Unit::parse("each"), Some(Unit::Ea));
        assert_eq!(Unit::parse("LBS"), Some(Unit::Lb));
        assert_eq!(Unit::parse("bushel"), None);
    }

    #[test]
    fn document_type_parse_is_lenient_about_separators() {
        assert_eq!(DocumentType::parse("bid-forms"), Some(DocumentType::BidForms));
        assert_eq!(
            DocumentType::parse("Construction Plans"),
            Some(DocumentType::ConstructionPlans)
        );
        assert_eq!(DocumentType::parse("addenda"), None);
    }

    #[test]
    fn term_label_title_cases_canonical_terms() {
        assert_eq!(term_label("STAMPED_CONCRETE"), "Stamped Concrete");
        assert_eq!(term_label("TYPE_86H_RAIL"), "Type 86h Rail");
    }

    #[test]
    fn units_serialize_as_codes() {
        let json = serde_json::to_string(&Unit::Sqft).expect("serialize unit");
        assert_eq!(json, "\"SQFT\"");
    }
}
