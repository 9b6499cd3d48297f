//! Stage → category mapping and category weights.
//!
//! Stages are free-form names chosen by the driving pipeline. Each one maps
//! into a small fixed set of weighted categories; unknown stages fall into
//! the designated fallback category. The defaults must stay in sync with
//! the stage names the pipeline actually emits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::validate::{ValidationError, ValidationResult};

/// Weight tolerance when checking that category weights sum to 100.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// A weighted progress category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    /// Share of overall progress, in percent.
    pub weight: f64,
}

impl CategorySpec {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

/// Category weights plus the stage lookup table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTable {
    pub categories: Vec<CategorySpec>,
    /// Stage name → category name.
    pub stages: BTreeMap<String, String>,
    /// Category used for stages missing from `stages`.
    pub fallback: String,
}

impl CategoryTable {
    /// Build a table from parts and validate it.
    pub fn new<I, S, C>(
        categories: Vec<CategorySpec>,
        stages: I,
        fallback: impl Into<String>,
    ) -> ValidationResult<Self>
    where
        I: IntoIterator<Item = (S, C)>,
        S: Into<String>,
        C: Into<String>,
    {
        let table = Self {
            categories,
            stages: stages
                .into_iter()
                .map(|(s, c)| (s.into(), c.into()))
                .collect(),
            fallback: fallback.into(),
        };
        table.validate()?;
        Ok(table)
    }

    /// Resolve the category a stage reports into.
    pub fn category_for(&self, stage: &str) -> &str {
        self.stages
            .get(stage)
            .map(String::as_str)
            .unwrap_or(self.fallback.as_str())
    }

    /// Weight of a category, 0 if unknown.
    pub fn weight_of(&self, category: &str) -> f64 {
        self.categories
            .iter()
            .find(|c| c.name == category)
            .map(|c| c.weight)
            .unwrap_or(0.0)
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    pub fn total_weight(&self) -> f64 {
        self.categories.iter().map(|c| c.weight).sum()
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if self.categories.is_empty() {
            return Err(ValidationError::Categories(
                "at least one category is required".to_string(),
            ));
        }

        let mut seen = std::collections::BTreeSet::new();
        for cat in &self.categories {
            if cat.name.is_empty() {
                return Err(ValidationError::Categories(
                    "category name must not be empty".to_string(),
                ));
            }
            if !seen.insert(cat.name.as_str()) {
                return Err(ValidationError::Categories(format!(
                    "duplicate category '{}'",
                    cat.name
                )));
            }
            if !cat.weight.is_finite() || cat.weight < 0.0 {
                return Err(ValidationError::Categories(format!(
                    "category '{}' has invalid weight {}",
                    cat.name, cat.weight
                )));
            }
        }

        let total = self.total_weight();
        if (total - 100.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ValidationError::Categories(format!(
                "category weights sum to {total}, expected 100"
            )));
        }

        if !seen.contains(self.fallback.as_str()) {
            return Err(ValidationError::Categories(format!(
                "fallback category '{}' is not defined",
                self.fallback
            )));
        }

        for (stage, category) in &self.stages {
            if !seen.contains(category.as_str()) {
                return Err(ValidationError::Categories(format!(
                    "stage '{stage}' maps to unknown category '{category}'"
                )));
            }
        }

        Ok(())
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        let categories = vec![
            CategorySpec::new("discovery", 15.0),
            CategorySpec::new("acquisition", 20.0),
            CategorySpec::new("processing", 40.0),
            CategorySpec::new("analysis", 15.0),
            CategorySpec::new("reporting", 10.0),
        ];
        let stages = [
            ("search", "discovery"),
            ("query", "discovery"),
            ("dedupe", "discovery"),
            ("download", "acquisition"),
            ("fetch", "acquisition"),
            ("ocr", "processing"),
            ("parse", "processing"),
            ("extract", "processing"),
            ("score", "analysis"),
            ("claims", "analysis"),
            ("evidence", "analysis"),
            ("report", "reporting"),
            ("summary", "reporting"),
        ];
        Self {
            categories,
            stages: stages
                .into_iter()
                .map(|(s, c)| (s.to_string(), c.to_string()))
                .collect(),
            fallback: "processing".to_string(),
        }
    }
}
