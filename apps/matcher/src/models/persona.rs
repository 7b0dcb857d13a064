use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Upper bound accepted for `years_of_experience` on save.
pub const MAX_YEARS_OF_EXPERIENCE: u32 = 70;

/// Ordinal seniority scale shared by personas and job requirements (1–5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeniorityLevel {
    Junior = 1,
    Mid = 2,
    Senior = 3,
    Lead = 4,
    Principal = 5,
}

impl SeniorityLevel {
    pub fn level(self) -> i32 {
        self as i32
    }

    pub fn from_level(level: i32) -> Option<Self> {
        match level {
            1 => Some(Self::Junior),
            2 => Some(Self::Mid),
            3 => Some(Self::Senior),
            4 => Some(Self::Lead),
            5 => Some(Self::Principal),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Junior => "junior",
            Self::Mid => "mid",
            Self::Senior => "senior",
            Self::Lead => "lead",
            Self::Principal => "principal",
        }
    }
}

/// Non-negotiable preferences declared by the candidate. Each field is one
/// predicate evaluated by the constraint filter; an unset field never fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardConstraints {
    pub remote_only: bool,
    pub min_home_days: Option<u8>,
    pub no_overseas_travel: bool,
    pub no_relocation: bool,
    pub allowed_locations: BTreeSet<String>,
    pub excluded_companies: BTreeSet<String>,
    /// Certifications the candidate holds, checked against the job's required ones.
    pub certifications: BTreeSet<String>,
}

/// The single live persona of a tenant. Tenant scoping is carried by the
/// store key, never by the struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub tech_stack: BTreeSet<String>,
    /// Skills from the tech stack worth surfacing as a bonus when a job does
    /// not ask for them.
    #[serde(default)]
    pub valuable_skills: BTreeSet<String>,
    #[serde(default)]
    pub mandatory_keywords: BTreeSet<String>,
    pub years_of_experience: u32,
    pub seniority: SeniorityLevel,
    #[serde(default)]
    pub hard_constraints: HardConstraints,
    #[serde(default)]
    pub soft_traits: String,
    #[serde(default)]
    pub ambitions: String,
}

impl Persona {
    /// Rejects malformed persona data before it is persisted.
    pub fn validate(&self) -> Result<(), String> {
        let blank_in = |set: &BTreeSet<String>| set.iter().any(|s| s.trim().is_empty());

        if blank_in(&self.tech_stack) {
            return Err("tech_stack contains a blank skill".to_string());
        }
        if blank_in(&self.valuable_skills) {
            return Err("valuable_skills contains a blank skill".to_string());
        }
        if blank_in(&self.mandatory_keywords) {
            return Err("mandatory_keywords contains a blank keyword".to_string());
        }
        if self.years_of_experience > MAX_YEARS_OF_EXPERIENCE {
            return Err(format!(
                "years_of_experience must be at most {MAX_YEARS_OF_EXPERIENCE}"
            ));
        }
        if self.hard_constraints.min_home_days.is_some_and(|d| d > 7) {
            return Err("min_home_days must be between 0 and 7".to_string());
        }
        Ok(())
    }

    /// Plain-text summary handed to the external scorer.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Seniority: {} ({} years of experience)\nTech stack: {}\n",
            self.seniority.as_str(),
            self.years_of_experience,
            join(&self.tech_stack),
        );
        if !self.soft_traits.trim().is_empty() {
            out.push_str(&format!("Traits: {}\n", self.soft_traits.trim()));
        }
        if !self.ambitions.trim().is_empty() {
            out.push_str(&format!("Ambitions: {}\n", self.ambitions.trim()));
        }
        out
    }
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}
