//! Persona signatures: a deterministic fingerprint of every persona field that
//! can move a score, and the tracker that decides whether a save changed it.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::persona::Persona;
use crate::store::{SignatureStore, StoreError};

/// Bumped whenever the canonical form changes, so old tags read as stale.
const SIGNATURE_VERSION: &str = "persona-signature-v1";

/// Canonical, order-independent view of the scoring-relevant fields.
#[derive(Serialize)]
struct Canonical<'a> {
    tech_stack: BTreeSet<String>,
    valuable_skills: BTreeSet<String>,
    mandatory_keywords: BTreeSet<String>,
    years_of_experience: u32,
    seniority: i32,
    remote_only: bool,
    min_home_days: Option<u8>,
    no_overseas_travel: bool,
    no_relocation: bool,
    allowed_locations: BTreeSet<String>,
    excluded_companies: BTreeSet<String>,
    certifications: BTreeSet<String>,
    soft_traits: &'a str,
    ambitions: &'a str,
}

fn folded(set: &BTreeSet<String>) -> BTreeSet<String> {
    set.iter().map(|s| s.trim().to_lowercase()).collect()
}

/// Hex SHA-256 over the canonical form. Case and whitespace differences in
/// set members do not change the signature; anything the filters read does.
pub fn fingerprint(persona: &Persona) -> String {
    let hc = &persona.hard_constraints;
    let canonical = Canonical {
        tech_stack: folded(&persona.tech_stack),
        valuable_skills: folded(&persona.valuable_skills),
        mandatory_keywords: folded(&persona.mandatory_keywords),
        years_of_experience: persona.years_of_experience,
        seniority: persona.seniority.level(),
        remote_only: hc.remote_only,
        min_home_days: hc.min_home_days,
        no_overseas_travel: hc.no_overseas_travel,
        no_relocation: hc.no_relocation,
        allowed_locations: folded(&hc.allowed_locations),
        excluded_companies: folded(&hc.excluded_companies),
        certifications: folded(&hc.certifications),
        soft_traits: persona.soft_traits.trim(),
        ambitions: persona.ambitions.trim(),
    };

    let mut hasher = Sha256::new();
    hasher.update(SIGNATURE_VERSION.as_bytes());
    hasher.update(b"\n");
    // Struct fields serialize in declaration order; sets are already sorted.
    if let Ok(bytes) = serde_json::to_vec(&canonical) {
        hasher.update(&bytes);
    }
    hex::encode(hasher.finalize())
}

/// Remembers the last signature seen per tenant.
#[derive(Clone)]
pub struct SignatureTracker {
    store: Arc<dyn SignatureStore>,
}

impl SignatureTracker {
    pub fn new(store: Arc<dyn SignatureStore>) -> Self {
        Self { store }
    }

    /// Compares against the stored signature and stores the new one when it
    /// differs. The first signature ever seen for a tenant counts as changed.
    /// Concurrent calls with the same new signature report `true` exactly once.
    pub async fn has_changed(&self, tenant: Uuid, signature: &str) -> Result<bool, StoreError> {
        self.store.swap_signature(tenant, signature).await
    }

    pub async fn current(&self, tenant: Uuid) -> Result<Option<String>, StoreError> {
        self.store.current_signature(tenant).await
    }
}
