use serde::{Deserialize, Deserializer};

/// A CRM lead as returned by the lead search.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Lead {
    #[serde(rename = "ID", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "PHONE", default)]
    pub phones: Option<Vec<PhoneValue>>,
}

impl Lead {
    pub fn new(id: impl Into<String>, phones: &[&str]) -> Self {
        Self {
            id: id.into(),
            phones: Some(
                phones
                    .iter()
                    .map(|p| PhoneValue {
                        value: p.to_string(),
                    })
                    .collect(),
            ),
        }
    }

    pub fn phone_values(&self) -> impl Iterator<Item = &str> {
        self.phones
            .iter()
            .flatten()
            .map(|p| p.value.as_str())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PhoneValue {
    #[serde(rename = "VALUE", default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LeadListResponse {
    #[serde(default)]
    pub result: Vec<Lead>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    pub result: Option<UploadResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResult {
    pub file: Option<UploadedFile>,
    #[serde(rename = "DOWNLOAD_URL")]
    pub download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadedFile {
    pub url: Option<String>,
}

impl UploadResponse {
    pub fn into_file_url(self) -> Option<String> {
        let result = self.result?;
        result
            .file
            .and_then(|f| f.url)
            .or(result.download_url)
            .filter(|url| !url.is_empty())
    }
}

/// Generic `{result}` envelope. `result == false` means the call was refused.
#[derive(Debug, Deserialize)]
pub(crate) struct ResultResponse {
    #[serde(default)]
    pub result: serde_json::Value,
}

impl ResultResponse {
    pub fn is_refused(&self) -> bool {
        matches!(self.result, serde_json::Value::Bool(false) | serde_json::Value::Null)
    }
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct CrmErrorBody {
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CrmErrorBody {
    pub fn summary(&self) -> Option<String> {
        match (&self.error, &self.error_description) {
            (Some(code), Some(description)) => Some(format!("{}: {}", code, description)),
            (Some(code), None) => Some(code.clone()),
            (None, Some(description)) => Some(description.clone()),
            (None, None) => None,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
