/// System prompt for semantic fit scoring. Enforces JSON-only output.
pub const FIT_SCORE_SYSTEM: &str = "You are a precise technical recruiter. \
    You estimate how well a candidate fits a job. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Replace `{persona}` and `{job}` before sending.
pub const FIT_SCORE_PROMPT_TEMPLATE: &str = r#"Estimate the semantic compatibility between this
candidate and this job.

Return a JSON object with this EXACT schema (no extra fields):
{"score": 0.0, "rationale": "two or three sentences"}

Rules:
- score is a number between 0.0 (no fit) and 1.0 (ideal fit).
- Judge transferable skills and the candidate's ambitions, not only exact keyword overlap.
- Do not penalise seniority differences; they are scored separately.
- rationale must cite concrete evidence from both texts.

CANDIDATE:
{persona}

JOB:
{job}
"#;
