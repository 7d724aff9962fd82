use serde::Deserialize;

use outreach_core::ProfileUpdate;

use crate::engine::GenerationEngine;
use crate::prompt::build_extraction_prompt;

#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("no model configured for profile extraction")]
    NoModel,
    #[error(transparent)]
    Provider(#[from] crate::llm::ProviderError),
    #[error("extraction reply was not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Default, Deserialize)]
struct ExtractedProfile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    municipality: Option<String>,
}

/// Drops placeholder values the model echoes back from the prompt.
fn meaningful(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| {
        let folded = value.to_lowercase();
        !value.is_empty() && folded != "null" && !folded.ends_with(" o null")
    })
}

/// Parses the extraction reply, tolerating ```json fences around the payload.
pub fn parse_extraction(reply: &str) -> Result<ProfileUpdate, serde_json::Error> {
    let payload = reply.replace("```json", "").replace("```", "");
    let extracted: ExtractedProfile = serde_json::from_str(payload.trim())?;
    Ok(ProfileUpdate {
        name: meaningful(extracted.name),
        municipality: meaningful(extracted.municipality),
    })
}

/// Asks the first configured model for the sender's name and municipality. A single
/// attempt is made and retries are not applied.
pub async fn extract_profile(
    engine: &GenerationEngine,
    message: &str,
) -> Result<ProfileUpdate, EnrichmentError> {
    let model = engine.policy().models.first().ok_or(EnrichmentError::NoModel)?;
    let reply = engine.attempt(model, "", &[], &build_extraction_prompt(message)).await?;
    Ok(parse_extraction(&reply)?)
}
