use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::persona::SeniorityLevel;

/// A scraped job listing. Read-only to the matching core once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Stable identifier: the listing's source URL.
    pub id: String,
    pub title: String,
    pub company: String,
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub required_seniority: Option<SeniorityLevel>,
    #[serde(default)]
    pub required_skills: BTreeSet<String>,
    #[serde(default)]
    pub required_certifications: BTreeSet<String>,
    #[serde(default)]
    pub min_years_experience: Option<u32>,
    #[serde(default = "Utc::now")]
    pub ingested_at: DateTime<Utc>,
}

impl Job {
    /// Searchable text used by the lexical filters.
    pub fn text(&self) -> String {
        format!("{}\n{}\n{}", self.title, self.company, self.description)
    }

    /// Plain-text summary handed to the external scorer.
    pub fn summary(&self) -> String {
        let mut out = format!("Title: {}\nCompany: {}\n", self.title, self.company);
        if let Some(level) = self.required_seniority {
            out.push_str(&format!("Seniority: {}\n", level.as_str()));
        }
        if !self.required_skills.is_empty() {
            let skills: Vec<&str> = self.required_skills.iter().map(String::as_str).collect();
            out.push_str(&format!("Required skills: {}\n", skills.join(", ")));
        }
        out.push_str(&self.description);
        out
    }
}
