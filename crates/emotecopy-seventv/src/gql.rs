//! 7tv v4 GraphQL documents, wire models, and response classification.

use std::time::Duration;

use serde::Deserialize;

use emotecopy_core::{
    domain::{EmoteRef, EmoteSet, EmoteSetEntry, EmoteSetId, UserId},
    errors::{EmoteFailure, FetchError, RateLimited},
    ports::WriteResponse,
};

pub const EMOTE_SET_BY_ID: &str = r#"
query EmoteSetByID($id: Id!) {
    emoteSets {
        emoteSet(id: $id) {
            capacity
            id
            name
            emotes {
                items {
                    emote {
                        defaultName
                        flags {
                            private
                        }
                        id
                    }
                    alias
                    id
                }
                totalCount
            }
            owner {
                editors {
                    editorId
                }
                id
            }
        }
    }
}
"#;

pub const ADD_EMOTE_TO_SET: &str = r#"
mutation AddEmoteToSet($setId: Id! $emote: EmoteSetEmoteId!) {
    emoteSets {
        emoteSet(id: $setId) {
            addEmote(id: $emote) {
                id
            }
        }
    }
}
"#;

pub const REMOVE_EMOTE_FROM_SET: &str = r#"
mutation RemoveEmoteFromSet($setId: Id! $emote: EmoteSetEmoteId!) {
    emoteSets {
        emoteSet(id: $setId) {
            removeEmote(id: $emote) {
                id
            }
        }
    }
}
"#;

#[derive(Debug, Deserialize)]
pub(crate) struct GqlResponse<T> {
    pub data: Option<T>,
    /// Servers send `"errors": null` as well as omitting the key.
    #[serde(default)]
    pub errors: Option<Vec<GqlError>>,
}

impl<T> GqlResponse<T> {
    pub fn first_error(&self) -> Option<&GqlError> {
        self.errors.as_deref().and_then(|e| e.first())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GqlError {
    #[serde(default)]
    pub message: String,
    pub extensions: Option<GqlErrorExtensions>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GqlErrorExtensions {
    pub code: Option<String>,
    pub message: Option<String>,
    #[serde(alias = "retryAfter")]
    pub retry_after: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EmoteSetsData {
    pub emote_sets: EmoteSetsField,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EmoteSetsField {
    pub emote_set: Option<EmoteSetDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmoteSetDto {
    pub id: String,
    pub name: String,
    pub capacity: usize,
    pub emotes: EmotesDto,
    pub owner: Option<OwnerDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmotesDto {
    #[serde(default)]
    pub items: Vec<EmoteItemDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmoteItemDto {
    pub id: String,
    pub alias: String,
    pub emote: Option<EmoteDataDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmoteDataDto {
    pub flags: EmoteFlagsDto,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmoteFlagsDto {
    #[serde(default)]
    pub private: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OwnerDto {
    pub id: String,
    #[serde(default)]
    pub editors: Vec<EditorDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EditorDto {
    pub editor_id: String,
}

impl From<EmoteSetDto> for EmoteSet {
    fn from(dto: EmoteSetDto) -> Self {
        let (owner_id, editor_ids) = match dto.owner {
            Some(owner) => (
                UserId(owner.id),
                owner
                    .editors
                    .into_iter()
                    .map(|e| UserId(e.editor_id))
                    .collect(),
            ),
            None => (UserId(String::new()), Vec::new()),
        };

        EmoteSet {
            id: EmoteSetId(dto.id),
            name: dto.name,
            capacity: dto.capacity,
            owner_id,
            editor_ids,
            emotes: dto
                .emotes
                .items
                .into_iter()
                .map(|item| EmoteSetEntry {
                    private: item.emote.map(|e| e.flags.private).unwrap_or(false),
                    emote: EmoteRef::new(item.id, item.alias),
                })
                .collect(),
        }
    }
}

const RATE_LIMIT_CODES: &[&str] = &["RATE_LIMITED", "RATE_LIMIT_EXCEEDED", "TOO_MANY_REQUESTS"];

/// Parse a `Retry-After` header given in seconds. HTTP-date values are ignored.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs = value.trim().parse::<f64>().ok()?;
    seconds(secs)
}

fn seconds(secs: f64) -> Option<Duration> {
    // Out-of-range hints fall back to the copier's default wait.
    Duration::try_from_secs_f64(secs).ok()
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Classify the response of an add/remove mutation.
pub fn classify_write(status: u16, retry_after: Option<&str>, body: &str) -> WriteResponse {
    if status == 429 {
        return WriteResponse::RateLimited(RateLimited {
            retry_after: retry_after.and_then(parse_retry_after),
        });
    }
    if status == 401 {
        return WriteResponse::Rejected(EmoteFailure::Unauthorized);
    }
    if !(200..300).contains(&status) {
        return WriteResponse::Rejected(EmoteFailure::Http(status));
    }

    let parsed: GqlResponse<serde_json::Value> = match serde_json::from_str(body) {
        Ok(p) => p,
        Err(e) => {
            return WriteResponse::Rejected(EmoteFailure::Other(format!(
                "unexpected response: {e}: {}",
                truncate(body, 200)
            )))
        }
    };

    match parsed.first_error() {
        None => WriteResponse::Done,
        Some(err) => classify_gql_error(err),
    }
}

fn classify_gql_error(err: &GqlError) -> WriteResponse {
    let message = err.message.as_str();
    let lower = message.to_lowercase();

    if lower.contains("emote not found") {
        return WriteResponse::Rejected(EmoteFailure::EmoteNotFound);
    }

    let Some(ext) = &err.extensions else {
        return WriteResponse::Rejected(EmoteFailure::Other(message.to_string()));
    };
    let code = ext.code.as_deref().unwrap_or("");
    let detail = ext
        .message
        .as_deref()
        .map(|m| m.strip_prefix(code).unwrap_or(m).trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| message.to_string());

    if RATE_LIMIT_CODES.contains(&code) {
        return WriteResponse::RateLimited(RateLimited {
            retry_after: ext.retry_after.and_then(seconds),
        });
    }

    match code {
        "LACKING_PRIVILEGES" => WriteResponse::Rejected(EmoteFailure::Unprivileged),
        "UNAUTHORIZED" => WriteResponse::Rejected(EmoteFailure::Unauthorized),
        "LOAD_ERROR" => WriteResponse::Rejected(EmoteFailure::CapacityReached),
        "BAD_REQUEST" | "CONFLICT" => {
            if lower.contains("already") || detail.to_lowercase().contains("already") {
                WriteResponse::AlreadyPresent
            } else {
                WriteResponse::Rejected(EmoteFailure::Conflict(detail))
            }
        }
        _ => WriteResponse::Rejected(EmoteFailure::Other(detail)),
    }
}

/// Classify the response of the emote set listing query.
pub fn classify_fetch(id: &EmoteSetId, status: u16, body: &str) -> Result<EmoteSet, FetchError> {
    if status == 401 || status == 403 {
        return Err(FetchError::Unauthorized);
    }
    if !(200..300).contains(&status) {
        return Err(FetchError::Network(format!("http status {status}")));
    }

    let parsed: GqlResponse<EmoteSetsData> = serde_json::from_str(body)
        .map_err(|e| FetchError::InvalidResponse(format!("{e}: {}", truncate(body, 200))))?;

    if let Some(err) = parsed.first_error() {
        let code = err
            .extensions
            .as_ref()
            .and_then(|x| x.code.as_deref())
            .unwrap_or("");
        if matches!(code, "UNAUTHORIZED" | "LACKING_PRIVILEGES") {
            return Err(FetchError::Unauthorized);
        }
        if parsed.data.is_none() {
            return Err(FetchError::InvalidResponse(err.message.clone()));
        }
    }

    parsed
        .data
        .and_then(|d| d.emote_sets.emote_set)
        .map(EmoteSet::from)
        .ok_or_else(|| FetchError::NotFound(id.clone()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn gql_error(message: &str, code: Option<&str>, ext_message: Option<&str>) -> String {
        let mut err = json!({ "message": message });
        if let Some(code) = code {
            err["extensions"] = json!({ "code": code, "message": ext_message.unwrap_or(message) });
        }
        json!({ "data": null, "errors": [err] }).to_string()
    }

    #[test]
    fn http_429_is_rate_limited_with_header() {
        assert_eq!(
            classify_write(429, Some("12"), ""),
            WriteResponse::RateLimited(RateLimited {
                retry_after: Some(Duration::from_secs(12))
            })
        );
        assert_eq!(
            classify_write(429, Some("Wed, 21 Oct 2015 07:28:00 GMT"), ""),
            WriteResponse::RateLimited(RateLimited { retry_after: None })
        );
        for huge in ["99999999999999999999999", "1e30", "-5", "inf"] {
            assert_eq!(
                classify_write(429, Some(huge), ""),
                WriteResponse::RateLimited(RateLimited { retry_after: None }),
                "retry-after {huge:?}"
            );
        }
    }

    #[test]
    fn http_errors_are_permanent() {
        assert_eq!(
            classify_write(401, None, ""),
            WriteResponse::Rejected(EmoteFailure::Unauthorized)
        );
        assert_eq!(
            classify_write(502, None, "bad gateway"),
            WriteResponse::Rejected(EmoteFailure::Http(502))
        );
    }

    #[test]
    fn success_without_errors_is_done() {
        let body = json!({"data": {"emoteSets": {"emoteSet": {"addEmote": {"id": "x"}}}}});
        assert_eq!(classify_write(200, None, &body.to_string()), WriteResponse::Done);

        let body = json!({
            "data": {"emoteSets": {"emoteSet": {"addEmote": {"id": "x"}}}},
            "errors": null
        });
        assert_eq!(classify_write(200, None, &body.to_string()), WriteResponse::Done);
    }

    #[test]
    fn gql_error_codes_are_classified() {
        assert_eq!(
            classify_write(200, None, &gql_error("Emote not found", None, None)),
            WriteResponse::Rejected(EmoteFailure::EmoteNotFound)
        );
        assert_eq!(
            classify_write(200, None, &gql_error("x", Some("LACKING_PRIVILEGES"), None)),
            WriteResponse::Rejected(EmoteFailure::Unprivileged)
        );
        assert_eq!(
            classify_write(200, None, &gql_error("x", Some("LOAD_ERROR"), None)),
            WriteResponse::Rejected(EmoteFailure::CapacityReached)
        );
        assert_eq!(
            classify_write(
                200,
                None,
                &gql_error("bad", Some("BAD_REQUEST"), Some("BAD_REQUEST emote already in set"))
            ),
            WriteResponse::AlreadyPresent
        );
        assert_eq!(
            classify_write(
                200,
                None,
                &gql_error("bad", Some("BAD_REQUEST"), Some("BAD_REQUEST name conflict"))
            ),
            WriteResponse::Rejected(EmoteFailure::Conflict("name conflict".to_string()))
        );
        assert_eq!(
            classify_write(200, None, &gql_error("weird", None, None)),
            WriteResponse::Rejected(EmoteFailure::Other("weird".to_string()))
        );
    }

    #[test]
    fn gql_rate_limit_reads_retry_after_extension() {
        let body = json!({
            "data": null,
            "errors": [{
                "message": "slow down",
                "extensions": { "code": "RATE_LIMITED", "retryAfter": 3 }
            }]
        });
        assert_eq!(
            classify_write(200, None, &body.to_string()),
            WriteResponse::RateLimited(RateLimited {
                retry_after: Some(Duration::from_secs(3))
            })
        );

        let body = json!({
            "data": null,
            "errors": [{
                "message": "slow down",
                "extensions": { "code": "RATE_LIMITED", "retryAfter": 1e30 }
            }]
        });
        assert_eq!(
            classify_write(200, None, &body.to_string()),
            WriteResponse::RateLimited(RateLimited { retry_after: None })
        );
    }

    #[test]
    fn fetch_maps_set_and_private_flags() {
        let body = json!({
            "data": { "emoteSets": { "emoteSet": {
                "id": "set1",
                "name": "Main",
                "capacity": 600,
                "emotes": {
                    "items": [
                        { "id": "e1", "alias": "KEKW", "emote": { "id": "e1", "defaultName": "KEKW", "flags": { "private": false } } },
                        { "id": "e2", "alias": "Secret", "emote": { "id": "e2", "defaultName": "Secret", "flags": { "private": true } } }
                    ],
                    "totalCount": 2
                },
                "owner": { "id": "u1", "editors": [ { "editorId": "u2" } ] }
            }}}
        });
        let set = classify_fetch(&EmoteSetId("set1".into()), 200, &body.to_string()).unwrap();

        assert_eq!(set.name, "Main");
        assert_eq!(set.capacity, 600);
        assert_eq!(
            set.emote_refs(),
            vec![EmoteRef::new("e1", "KEKW"), EmoteRef::new("e2", "Secret")]
        );
        assert!(set.emotes[1].private);
        assert!(set.is_editable_by(&UserId("u2".into())));
        assert!(!set.is_editable_by(&UserId("u3".into())));
    }

    #[test]
    fn fetch_errors() {
        let id = EmoteSetId("missing".into());
        let null_set = json!({"data": {"emoteSets": {"emoteSet": null}}}).to_string();
        assert_eq!(
            classify_fetch(&id, 200, &null_set).unwrap_err(),
            FetchError::NotFound(id.clone())
        );
        assert_eq!(
            classify_fetch(&id, 401, "").unwrap_err(),
            FetchError::Unauthorized
        );
        assert!(matches!(
            classify_fetch(&id, 500, "").unwrap_err(),
            FetchError::Network(_)
        ));
        assert!(matches!(
            classify_fetch(&id, 200, "<html>").unwrap_err(),
            FetchError::InvalidResponse(_)
        ));
        assert!(matches!(
            classify_fetch(&id, 200, &gql_error("boom", Some("INTERNAL"), None)).unwrap_err(),
            FetchError::InvalidResponse(_)
        ));
    }
}
