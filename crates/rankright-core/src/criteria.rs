//! The fixed catalog of evaluation criteria.
//!
//! Declaration order is the iteration order everywhere: evaluation,
//! recommendation slicing and reports all walk the catalog front to back.

use thiserror::Error;

/// Errors from catalog lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Unknown criterion: {0}")]
    UnknownCriterion(String),
}

/// A named qualitative dimension and the guidance handed to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criterion {
    /// Display label, unique within the catalog
    pub name: &'static str,

    /// Prompt guidance text
    pub description: &'static str,
}

const STANDARD_CRITERIA: [Criterion; 6] = [
    Criterion {
        name: "Clarity & Readability",
        description: "Evaluate how clear, understandable, and accessible the content is to its intended audience. \
Consider language complexity, sentence structure, jargon usage, and overall readability. \
Assess whether the content effectively communicates its message without ambiguity.",
    },
    Criterion {
        name: "Completeness & Coverage",
        description: "Assess whether the document thoroughly covers all necessary topics and provides comprehensive information. \
Evaluate if all required sections are present, if key information is missing, and whether the depth \
of coverage is appropriate for the document's purpose.",
    },
    Criterion {
        name: "Accuracy & Reliability",
        description: "Evaluate the factual accuracy, consistency, and reliability of the information presented. \
Look for contradictions, outdated information, unsupported claims, and verify that \
statements are backed by appropriate evidence or sources.",
    },
    Criterion {
        name: "Structure & Organization",
        description: "Assess the logical flow, organization, and structure of the document. \
Evaluate heading hierarchy, paragraph organization, use of lists and tables, \
and whether the content follows a logical sequence that aids comprehension.",
    },
    Criterion {
        name: "Compliance & Standards",
        description: "Evaluate adherence to relevant standards, regulations, policies, or industry best practices. \
Assess whether the document meets organizational requirements, follows established guidelines, \
and complies with applicable regulatory or quality standards.",
    },
    Criterion {
        name: "Actionability & Usefulness",
        description: "Assess how practical and useful the document is for its intended purpose. \
Evaluate whether it provides clear guidance, actionable steps, practical examples, \
and whether readers can effectively use the information to achieve desired outcomes.",
    },
];

/// Ordered, immutable registry of criteria.
#[derive(Debug, Clone)]
pub struct CriteriaCatalog {
    criteria: Vec<Criterion>,
}

impl CriteriaCatalog {
    /// The six standard criteria.
    pub fn standard() -> Self {
        Self {
            criteria: STANDARD_CRITERIA.to_vec(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Criterion> {
        self.criteria.iter()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.criteria.iter().map(|c| c.name).collect()
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.name == name)
    }

    pub fn description(&self, name: &str) -> Option<&'static str> {
        self.get(name).map(|c| c.description)
    }

    /// Look up a criterion, failing for names outside the catalog.
    pub fn require(&self, name: &str) -> Result<&Criterion, CatalogError> {
        self.get(name)
            .ok_or_else(|| CatalogError::UnknownCriterion(name.to_string()))
    }
}

impl Default for CriteriaCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl<'a> IntoIterator for &'a CriteriaCatalog {
    type Item = &'a Criterion;
    type IntoIter = std::slice::Iter<'a, Criterion>;

    fn into_iter(self) -> Self::IntoIter {
        self.criteria.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_order() {
        let catalog = CriteriaCatalog::standard();
        assert_eq!(
            catalog.names(),
            vec![
                "Clarity & Readability",
                "Completeness & Coverage",
                "Accuracy & Reliability",
                "Structure & Organization",
                "Compliance & Standards",
                "Actionability & Usefulness",
            ]
        );
    }

    #[test]
    fn test_names_are_unique() {
        let catalog = CriteriaCatalog::standard();
        let mut names = catalog.names();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), catalog.len());
    }

    #[test]
    fn test_require_unknown() {
        let catalog = CriteriaCatalog::standard();
        assert!(catalog.require("Accuracy & Reliability").is_ok());
        assert_eq!(
            catalog.require("Tone"),
            Err(CatalogError::UnknownCriterion("Tone".to_string()))
        );
    }

    #[test]
    fn test_descriptions_present() {
        let catalog = CriteriaCatalog::standard();
        for criterion in &catalog {
            assert!(!criterion.description.is_empty());
        }
        assert!(catalog
            .description("Structure & Organization")
            .unwrap()
            .contains("heading hierarchy"));
    }
}
