use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use crate::error::AnalysisError;
use crate::intake::ImageFile;

/// Image payload in the shape Gemini expects for `inline_data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Read the whole file and base64-encode it.
pub async fn encode(file: &ImageFile) -> Result<InlineData, AnalysisError> {
    let bytes = file.blob().read().await?;
    Ok(InlineData {
        mime_type: file.mime_type().to_string(),
        data: STANDARD.encode(&bytes),
    })
}
