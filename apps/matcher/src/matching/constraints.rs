//! Constraint Filter — hard requirements checked before any paid computation.
//!
//! Text predicates only fail on an explicit contradiction in the listing;
//! silence about e.g. travel never rejects a job.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::job::Job;
use crate::models::persona::Persona;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintResult {
    Pass,
    Fail(String),
}

fn pattern(cell: &'static OnceLock<Regex>, source: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(source).expect("constraint pattern is valid"))
}

fn onsite_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(
        &RE,
        concat!(
            r"(?i)\b(?:fully on[- ]site|100% on[- ]site|in[- ]office|on[- ]site",
            r"|(?:5|five) days (?:a|per) week|work from the office",
            r"|must be (?:in office|on site))\b",
        ),
    )
}

fn full_onsite_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(
        &RE,
        r"(?i)\b(?:fully on[- ]site|100% on[- ]site|(?:5|five) days (?:a|per) week)\b",
    )
}

fn remote_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"(?i)\b(?:remote|work from home|wfh)\b")
}

fn travel_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(
        &RE,
        concat!(
            r"(?i)\b(?:international travel|overseas travel|travel abroad|global travel",
            r"|frequent travel|extensive travel|travel\s+(?:up to\s+)?\d{1,3}\s*%)",
        ),
    )
}

fn relocation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"(?i)\brelocat(?:e|ion|ing)\b")
}

/// Evaluates every hard constraint; the first failing predicate wins.
pub fn evaluate(persona: &Persona, job: &Job) -> ConstraintResult {
    let hc = &persona.hard_constraints;
    let text = job.text();
    let explicit_remote = remote_re().is_match(&text);
    let explicit_onsite = onsite_re().is_match(&text);

    if let Some(required) = job.min_years_experience {
        if required > persona.years_of_experience {
            return ConstraintResult::Fail(format!(
                "Job requires {required}+ years of experience; persona has {}.",
                persona.years_of_experience
            ));
        }
    }

    if hc.remote_only && explicit_onsite && !explicit_remote {
        return ConstraintResult::Fail(
            "Persona is remote-only but the job is explicitly on-site.".to_string(),
        );
    }

    if let Some(days) = hc.min_home_days {
        if days >= 2 && full_onsite_re().is_match(&text) {
            return ConstraintResult::Fail(format!(
                "Persona needs at least {days} work-from-home days but the job is fully on-site."
            ));
        }
    }

    if hc.no_overseas_travel && travel_re().is_match(&text) {
        return ConstraintResult::Fail(
            "Persona rules out overseas travel but the job requires it.".to_string(),
        );
    }

    if hc.no_relocation && relocation_re().is_match(&text) {
        return ConstraintResult::Fail(
            "Persona rules out relocation but the job requires it.".to_string(),
        );
    }

    if !hc.allowed_locations.is_empty() && !explicit_remote {
        if let Some(location) = job.location.as_deref() {
            let location = location.to_lowercase();
            let allowed = hc
                .allowed_locations
                .iter()
                .any(|l| location.contains(&l.trim().to_lowercase()));
            if !allowed {
                return ConstraintResult::Fail(format!(
                    "Job location '{}' is not in the persona's allowed locations.",
                    job.location.as_deref().unwrap_or_default()
                ));
            }
        }
    }

    let company = job.company.trim().to_lowercase();
    if hc
        .excluded_companies
        .iter()
        .any(|c| c.trim().to_lowercase() == company)
    {
        return ConstraintResult::Fail(format!("Company '{}' is excluded.", job.company));
    }

    let held: Vec<String> = hc
        .certifications
        .iter()
        .map(|c| c.trim().to_lowercase())
        .collect();
    if let Some(missing) = job
        .required_certifications
        .iter()
        .find(|c| !held.contains(&c.trim().to_lowercase()))
    {
        return ConstraintResult::Fail(format!("Job requires certification '{missing}'."));
    }

    ConstraintResult::Pass
}
