//! Supabase (PostgREST) remote store adapter.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::{RemoteDocument, RemoteStore};
use crate::error::{Error, Result};
use crate::models::DocumentId;
use crate::util::{compact_text, is_http_url, normalize_text_option};

const DOCUMENTS_PATH: &str = "/rest/v1/documents";

/// Rows requested per page. PostgREST silently caps a response at the
/// project's `max-rows`, so a pull keeps paging until a page comes back empty.
const FETCH_PAGE_SIZE: usize = 1000;

#[derive(Clone)]
pub struct SupabaseRemoteStore {
    endpoint: String,
    anon_key: String,
    access_token: String,
    client: Client,
}

impl fmt::Debug for SupabaseRemoteStore {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SupabaseRemoteStore")
            .field("endpoint", &self.endpoint)
            .field("anon_key", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl SupabaseRemoteStore {
    /// Build a client for the `documents` table of the project at `url`.
    ///
    /// `access_token` is the signed-in session's JWT; row-level security scopes
    /// every request to that user.
    pub fn new(
        url: impl AsRef<str>,
        anon_key: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self> {
        let endpoint = normalize_endpoint(url.as_ref())?;
        let anon_key = normalize_text_option(Some(anon_key.into()))
            .ok_or_else(|| Error::Config("Supabase anon key must not be empty".to_string()))?;
        let access_token = normalize_text_option(Some(access_token.into()))
            .ok_or_else(|| Error::Config("access token must not be empty".to_string()))?;

        Ok(Self {
            endpoint,
            anon_key,
            access_token,
            client: Client::builder().build()?,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.access_token)
    }

    fn upsert_request(&self, documents: &[RemoteDocument]) -> RequestBuilder {
        self.authorized(
            self.client
                .post(&self.endpoint)
                .query(&[("on_conflict", "id")])
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(documents),
        )
    }

    fn fetch_request(
        &self,
        owner_id: &str,
        updated_after: Option<DateTime<Utc>>,
        offset: usize,
    ) -> RequestBuilder {
        let mut query = vec![
            ("select", "*".to_string()),
            ("owner_id", format!("eq.{owner_id}")),
            // id breaks updated_at ties so pages never overlap or skip
            ("order", "updated_at.asc,id.asc".to_string()),
            ("limit", FETCH_PAGE_SIZE.to_string()),
            ("offset", offset.to_string()),
        ];
        if let Some(after) = updated_after {
            query.push((
                "updated_at",
                format!("gt.{}", after.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ));
        }

        self.authorized(
            self.client
                .get(&self.endpoint)
                .query(&query)
                .header("Accept", "application/json"),
        )
    }

    fn delete_request(&self, id: &DocumentId) -> RequestBuilder {
        self.authorized(
            self.client
                .delete(&self.endpoint)
                .query(&[("id", format!("eq.{id}"))]),
        )
    }
}

#[async_trait]
impl RemoteStore for SupabaseRemoteStore {
    async fn upsert_documents(&self, documents: &[RemoteDocument]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let response = self.upsert_request(documents).send().await?;
        ensure_success(response).await?;
        tracing::debug!("Upserted {} documents to Supabase", documents.len());
        Ok(())
    }

    async fn fetch_documents(
        &self,
        owner_id: &str,
        updated_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteDocument>> {
        let mut documents = Vec::new();
        let mut offset = 0;
        loop {
            let response = self
                .fetch_request(owner_id, updated_after, offset)
                .send()
                .await?;
            let response = ensure_success(response).await?;
            let rows = response.json::<Vec<serde_json::Value>>().await?;
            if rows.is_empty() {
                break;
            }
            offset += rows.len();
            documents.extend(parse_rows(rows));
        }
        tracing::debug!("Fetched {} documents from Supabase", documents.len());
        Ok(documents)
    }

    async fn delete_document(&self, id: &DocumentId) -> Result<()> {
        let response = self.delete_request(id).send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Network(parse_api_error(status, &body)))
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorResponse {
    message: Option<String>,
    hint: Option<String>,
    error: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorResponse>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return match payload.hint {
                Some(hint) => format!("{} ({}; {})", message.trim(), status.as_u16(), hint.trim()),
                None => format!("{} ({})", message.trim(), status.as_u16()),
            };
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_endpoint(url: &str) -> Result<String> {
    let base = normalize_text_option(Some(url.to_string()))
        .ok_or_else(|| Error::Config("Supabase URL must not be empty".to_string()))?;
    if !is_http_url(&base) {
        return Err(Error::Config(
            "Supabase URL must include http:// or https://".to_string(),
        ));
    }

    let base = base.trim_end_matches('/');
    if base.ends_with(DOCUMENTS_PATH) {
        Ok(base.to_string())
    } else {
        Ok(format!("{base}{DOCUMENTS_PATH}"))
    }
}

/// One malformed row must not hide the rest of the batch
fn parse_rows(rows: Vec<serde_json::Value>) -> Vec<RemoteDocument> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<RemoteDocument>(row) {
            Ok(document) => Some(document),
            Err(error) => {
                tracing::warn!("Skipping malformed remote document: {error}");
                None
            }
        })
        .collect()
}
