use serde::{Deserialize, Serialize};

/// Job requirement as posted by a school; flattened into the text that gets
/// embedded for matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequirementDocument {
    pub title: String,
    pub description: String,
    pub subject: String,
    pub qualifications: Vec<String>,
    pub benefits: Vec<String>,
}

impl RequirementDocument {
    /// Title, description, subject, qualifications, then benefits, space separated.
    /// Blank fields are skipped.
    pub fn to_requirement_text(&self) -> String {
        [&self.title, &self.description, &self.subject]
            .into_iter()
            .chain(&self.qualifications)
            .chain(&self.benefits)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
