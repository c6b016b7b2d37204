use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentRequest {
    pub id: String,
    pub user_id: String,
    pub model: String,
    pub kind: ContentKind,
    pub prompt: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContentKind {
    Text,
    Image,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Completed,
    Failed,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedContent {
    pub id: String,
    pub request_id: String,
    pub output: String,
    pub version: i32,
    pub cache_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ContentRequest {
    pub fn new(user_id: String, model: String, kind: ContentKind, prompt: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            model,
            kind,
            prompt,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

impl GeneratedContent {
    /// First version of the output for `request`.
    pub fn first_version(request: &ContentRequest, output: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request_id: request.id.clone(),
            output,
            version: 1,
            cache_key: Some(cache_key(&request.model, &request.prompt)),
            created_at: Utc::now(),
        }
    }
}

pub fn cache_key(model: &str, prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update(b"\n");
    hasher.update(prompt.as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_request_is_pending() {
        let req = ContentRequest::new(
            "u1".to_string(),
            "mistral-7b".to_string(),
            ContentKind::Text,
            "write a tagline".to_string(),
        );
        assert_eq!(req.status, RequestStatus::Pending);
        assert!(!req.status.is_terminal());
        assert!(RequestStatus::Failed.is_terminal());
    }

    #[test]
    fn first_version_links_request_and_keys_on_prompt() {
        let req = ContentRequest::new(
            "u1".to_string(),
            "mistral-7b".to_string(),
            ContentKind::Text,
            "write a tagline".to_string(),
        );
        let content = GeneratedContent::first_version(&req, "Shine Bright".to_string());

        assert_eq!(content.request_id, req.id);
        assert_eq!(content.version, 1);
        assert_ne!(content.id, req.id);
        assert_eq!(
            content.cache_key.as_deref(),
            Some(cache_key("mistral-7b", "write a tagline").as_str())
        );
    }

    #[test]
    fn cache_key_is_stable_and_separates_fields() {
        let a = cache_key("m", "prompt");
        assert_eq!(a, cache_key("m", "prompt"));
        assert!(a.starts_with("sha256:"));
        assert_ne!(cache_key("ab", "c"), cache_key("a", "bc"));
    }
}
