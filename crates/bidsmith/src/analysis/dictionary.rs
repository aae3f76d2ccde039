use serde::{Deserialize, Serialize};

use crate::domain::{MaterialCategory, Priority};
use crate::matching::normalize;

/// One canonical term recognised by the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermDefinition {
    pub term: String,
    pub category: MaterialCategory,
    pub priority: Priority,
}

impl TermDefinition {
    pub fn new(term: &str, category: MaterialCategory, priority: Priority) -> Self {
        Self {
            term: term.to_string(),
            category,
            priority,
        }
    }

    /// Lowercase, space separated form used for matching against page text.
    pub fn search_text(&self) -> String {
        normalize(&self.term)
    }
}

/// Immutable domain term dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermDictionary {
    entries: Vec<TermDefinition>,
}

impl TermDictionary {
    pub fn new(entries: Vec<TermDefinition>) -> Self {
        Self { entries }
    }

    /// Highway structure terms covering railings, formwork, concrete finishes and
    /// temporary works.
    pub fn standard() -> Self {
        use MaterialCategory::*;
        use Priority::*;

        Self::new(vec![
            TermDefinition::new("BALUSTER", BridgeBarrier, High),
            TermDefinition::new("BLOCKOUT", BridgeBarrier, High),
            TermDefinition::new("TYPE_86H_RAIL", BridgeBarrier, High),
            TermDefinition::new("BRIDGE_RAILING", BridgeBarrier, High),
            TermDefinition::new("FORMWORK", Formwork, High),
            TermDefinition::new("FALSEWORK", Formwork, High),
            TermDefinition::new("FORM_FACING", Formwork, High),
            TermDefinition::new("FORM_LINER", Specialty, Medium),
            TermDefinition::new("STAMPED_CONCRETE", Concrete, High),
            TermDefinition::new("FRACTURED_RIB_TEXTURE", Concrete, High),
            TermDefinition::new("ARCHITECTURAL_TREATMENT", Specialty, High),
            TermDefinition::new("RETAINING_WALL", Concrete, High),
            TermDefinition::new("CONCRETE_FINISHING", Concrete, Medium),
            TermDefinition::new("EROSION_CONTROL", TemporaryStructures, High),
            TermDefinition::new("CRIBBING", TemporaryStructures, Medium),
            TermDefinition::new("TEMPORARY_STRUCTURES", TemporaryStructures, Medium),
            TermDefinition::new("PLYWOOD", Lumber, Medium),
            TermDefinition::new("DIMENSIONAL_LUMBER", Lumber, Medium),
            TermDefinition::new("FORM_TIES", Hardware, Medium),
            TermDefinition::new("ANCHOR_BOLTS", Hardware, Medium),
            TermDefinition::new("SURVEY_MONUMENT", Specialty, Low),
        ])
    }

    pub fn entries(&self) -> &[TermDefinition] {
        &self.entries
    }

    pub fn get(&self, term: &str) -> Option<&TermDefinition> {
        self.entries.iter().find(|entry| entry.term == term)
    }
}

impl Default for TermDictionary {
    fn default() -> Self {
        Self::standard()
    }
}
