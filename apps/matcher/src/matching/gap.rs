//! Gap Analyzer — skill coverage and seniority alignment. Pure and deterministic.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::job::Job;
use crate::models::persona::{Persona, SeniorityLevel};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapAnalysis {
    /// Required by the job, absent from the persona's stack (job spelling).
    pub missing_skills: BTreeSet<String>,
    /// Valuable persona skills the job does not ask for (persona spelling).
    pub bonus_skills: BTreeSet<String>,
    pub seniority_penalty: i32,
    pub seniority_explanation: String,
}

pub fn analyze(persona: &Persona, job: &Job) -> GapAnalysis {
    let persona_skills = normalized(&persona.tech_stack);
    let job_skills = normalized(&job.required_skills);
    let valuable = normalized(&persona.valuable_skills);

    let missing_skills = job
        .required_skills
        .iter()
        .filter(|s| !persona_skills.contains(&normalize(s)))
        .cloned()
        .collect();

    let bonus_skills = persona
        .tech_stack
        .iter()
        .filter(|s| {
            let key = normalize(s);
            !job_skills.contains(&key) && valuable.contains(&key)
        })
        .cloned()
        .collect();

    let (seniority_penalty, seniority_explanation) = match job.required_seniority {
        Some(required) => (
            seniority_penalty(persona.seniority, required),
            explain_seniority(persona.seniority, required),
        ),
        None => (0, "Job states no seniority requirement.".to_string()),
    };

    GapAnalysis {
        missing_skills,
        bonus_skills,
        seniority_penalty,
        seniority_explanation,
    }
}

/// Penalty for `delta = required - persona` on the 1–5 scale:
///
/// | delta | penalty |
/// |-------|---------|
/// | 0     | +5      |
/// | ±1    | −5      |
/// | ≥ +2  | −15     |
/// | ≤ −2  | −10     |
pub fn seniority_penalty(persona: SeniorityLevel, required: SeniorityLevel) -> i32 {
    match required.level() - persona.level() {
        0 => 5,
        -1 | 1 => -5,
        d if d >= 2 => -15,
        _ => -10,
    }
}

fn explain_seniority(persona: SeniorityLevel, required: SeniorityLevel) -> String {
    let (p, r) = (persona.as_str(), required.as_str());
    match required.level() - persona.level() {
        0 => format!("Seniority matches ({r})."),
        1 => format!("Role is one level above your seniority ({p} → {r})."),
        -1 => format!("Role is one level below your seniority ({p} → {r})."),
        d if d >= 2 => format!("Role is {d} levels above your seniority ({p} → {r})."),
        d => format!("Role is {} levels below your seniority ({p} → {r}).", -d),
    }
}

fn normalize(skill: &str) -> String {
    skill.trim().to_lowercase()
}

fn normalized(set: &BTreeSet<String>) -> BTreeSet<String> {
    set.iter().map(|s| normalize(s)).collect()
}
