//! Candidate profile records and their flattening into indexable documents.

use core_types::{CandidateDocument, CandidateId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Education {
    pub degree: String,
    pub institution: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Experience {
    pub job_title: String,
    pub company: String,
}

/// One candidate profile as dumped from the primary data store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateProfile {
    #[serde(alias = "candidate_id")]
    pub candidate_id: CandidateId,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub preferred_locations: Vec<String>,
}

impl CandidateProfile {
    /// Flatten into one text block:
    /// `Skills: a, b. Education: X from Y. Experience: T at C. Preferred Locations: p, q`.
    /// Empty sections are omitted.
    pub fn to_document_text(&self) -> String {
        let mut parts = Vec::new();
        if !self.skills.is_empty() {
            parts.push(format!("Skills: {}", self.skills.join(", ")));
        }
        for edu in &self.education {
            parts.push(format!("Education: {} from {}", edu.degree, edu.institution));
        }
        for exp in &self.experience {
            parts.push(format!("Experience: {} at {}", exp.job_title, exp.company));
        }
        if !self.preferred_locations.is_empty() {
            parts.push(format!(
                "Preferred Locations: {}",
                self.preferred_locations.join(", ")
            ));
        }
        parts.join(". ")
    }

    pub fn to_document(&self) -> CandidateDocument {
        CandidateDocument {
            candidate_id: self.candidate_id.clone(),
            document: self.to_document_text(),
        }
    }
}
