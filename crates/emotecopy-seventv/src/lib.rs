//! 7tv adapter (GraphQL over HTTPS).
//!
//! This crate implements the `emotecopy-core` reader/writer ports against the
//! 7tv v4 GraphQL endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use serde_json::{json, Value};

pub mod gql;

use emotecopy_core::{
    domain::{EmoteId, EmoteRef, EmoteSet, EmoteSetId},
    errors::{EmoteFailure, Error, FetchError},
    ports::{EmoteSetReader, EmoteSetWriter, WriteResponse},
    token::AuthToken,
    Result,
};

#[derive(Clone, Debug)]
pub struct SevenTvClient {
    endpoint: String,
    token: AuthToken,
    http: reqwest::Client,
}

struct RawResponse {
    status: u16,
    retry_after: Option<String>,
    body: String,
}

impl SevenTvClient {
    pub fn new(endpoint: impl Into<String>, token: AuthToken, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("emotecopy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into(),
            token,
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(
        &self,
        query: &str,
        variables: Value,
    ) -> std::result::Result<RawResponse, reqwest::Error> {
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.token.expose())
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.text().await?;

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }

    async fn write(&self, query: &str, variables: Value, what: &str) -> WriteResponse {
        match self.post(query, variables).await {
            Ok(raw) => {
                let classified = gql::classify_write(raw.status, raw.retry_after.as_deref(), &raw.body);
                tracing::debug!(status = raw.status, ?classified, "{what}");
                classified
            }
            Err(e) => WriteResponse::Rejected(EmoteFailure::Network(format!("{what}: {e}"))),
        }
    }
}

#[async_trait]
impl EmoteSetReader for SevenTvClient {
    async fn fetch_emote_set(&self, id: &EmoteSetId) -> std::result::Result<EmoteSet, FetchError> {
        let raw = self
            .post(gql::EMOTE_SET_BY_ID, json!({ "id": id.as_str() }))
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let set = gql::classify_fetch(id, raw.status, &raw.body)?;
        tracing::debug!(set = %set.id, name = %set.name, emotes = set.len(), "fetched emote set");
        Ok(set)
    }
}

#[async_trait]
impl EmoteSetWriter for SevenTvClient {
    async fn add_emote(&self, set: &EmoteSetId, emote: &EmoteRef) -> WriteResponse {
        let variables = json!({
            "setId": set.as_str(),
            "emote": { "emoteId": emote.id.as_str(), "alias": emote.name },
        });
        self.write(gql::ADD_EMOTE_TO_SET, variables, "add emote")
            .await
    }

    async fn remove_emote(&self, set: &EmoteSetId, emote: &EmoteId) -> WriteResponse {
        let variables = json!({
            "setId": set.as_str(),
            "emote": { "emoteId": emote.as_str() },
        });
        self.write(gql::REMOVE_EMOTE_FROM_SET, variables, "remove emote")
            .await
    }
}
