//! Helpers shared by the `talentmatch` operator commands.

use std::path::Path;

use anyhow::{Context, Result, bail};
use ipc::RequirementDocument;
use semantic_index::ArtifactReport;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Requirement text from either inline text or a requirement JSON file.
pub fn requirement_text(text: Option<&str>, requirement_file: Option<&Path>) -> Result<String> {
    let text = match (text, requirement_file) {
        (Some(t), None) => t.to_string(),
        (None, Some(path)) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read requirement {}", path.display()))?;
            let doc: RequirementDocument = serde_json::from_str(&raw)
                .with_context(|| format!("parse requirement {}", path.display()))?;
            doc.to_requirement_text()
        }
        (Some(_), Some(_)) => bail!("pass either requirement text or --requirement, not both"),
        (None, None) => bail!("requirement text is required"),
    };
    if text.trim().is_empty() {
        bail!("requirement text is empty");
    }
    Ok(text)
}

/// Problems an operator should fix before starting the service.
pub fn report_problems(report: &ArtifactReport) -> Vec<String> {
    let mut problems = Vec::new();
    if report.indexed != report.mapping_len {
        problems.push(format!(
            "mapping has {} entries but the index holds {} vectors",
            report.mapping_len, report.indexed
        ));
    }
    if !report.fingerprint_matches {
        problems.push("mapping was not published with this index".to_string());
    }
    problems
}
