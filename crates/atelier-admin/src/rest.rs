//! PostgREST-style HTTP remote store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::RemoteError;
use crate::remote::{EntityKind, RemoteStore};

/// Junction table holding ordered collection membership.
const MEMBERSHIP_TABLE: &str = "collection_products";

/// Connection settings for [`RestRemote`].
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub base_url: String,
    /// Key sent as both `apikey` and bearer token.
    pub api_key: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl RestConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A [`RemoteStore`] speaking the PostgREST dialect over HTTPS.
///
/// Rows live under `/rest/v1/{table}` and are addressed with `?id=eq.{id}`.
#[derive(Debug, Clone)]
pub struct RestRemote {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestRemote {
    pub fn new(config: RestConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RemoteError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = request.send().await.map_err(from_reqwest)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        let message = response.text().await.unwrap_or_default();
        Err(RemoteError::Http {
            status: status.as_u16(),
            url,
            message,
        })
    }

    async fn replace_membership(&self, collection_id: &str, members: Vec<String>) -> Result<(), RemoteError> {
        self.send(
            self.request(Method::DELETE, MEMBERSHIP_TABLE)
                .query(&[("collection_id", format!("eq.{collection_id}"))]),
        )
        .await?;

        if members.is_empty() {
            return Ok(());
        }
        let rows: Vec<Value> = members
            .iter()
            .enumerate()
            .map(|(position, product_id)| {
                json!({
                    "collection_id": collection_id,
                    "product_id": product_id,
                    "position": position,
                })
            })
            .collect();
        self.send(self.request(Method::POST, MEMBERSHIP_TABLE).json(&rows))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for RestRemote {
    async fn create(&self, kind: EntityKind, record: Value) -> Result<Value, RemoteError> {
        let response = self
            .send(
                self.request(Method::POST, kind.table())
                    .header("Prefer", "return=representation")
                    .json(&record),
            )
            .await?;
        let rows: Value = response.json().await.map_err(from_reqwest)?;
        first_row(rows)
    }

    async fn update(&self, kind: EntityKind, id: &str, patch: Value) -> Result<(), RemoteError> {
        let (fields, members) = split_membership(kind, patch);
        if !fields.is_empty() {
            self.send(
                self.request(Method::PATCH, kind.table())
                    .query(&[("id", format!("eq.{id}"))])
                    .json(&fields),
            )
            .await?;
        }
        if let Some(members) = members {
            self.replace_membership(id, members).await?;
        }
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), RemoteError> {
        self.send(
            self.request(Method::DELETE, kind.table())
                .query(&[("id", format!("eq.{id}"))]),
        )
        .await?;
        Ok(())
    }

    async fn list(&self, kind: EntityKind) -> Result<Vec<Value>, RemoteError> {
        let select = match kind {
            EntityKind::Collection => "*,collection_products(product_id,position)",
            _ => "*",
        };
        let response = self
            .send(self.request(Method::GET, kind.table()).query(&[("select", select)]))
            .await?;
        let mut rows: Vec<Value> = response.json().await.map_err(from_reqwest)?;
        if kind == EntityKind::Collection {
            rows.iter_mut().for_each(flatten_membership);
        }
        Ok(rows)
    }
}

fn from_reqwest(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout(e.to_string())
    } else if e.is_decode() {
        RemoteError::InvalidResponse(e.to_string())
    } else {
        RemoteError::Connection(e.to_string())
    }
}

/// `return=representation` answers with an array holding the new row.
fn first_row(rows: Value) -> Result<Value, RemoteError> {
    match rows {
        Value::Array(mut rows) if !rows.is_empty() => Ok(rows.swap_remove(0)),
        Value::Object(_) => Ok(rows),
        other => Err(RemoteError::InvalidResponse(format!(
            "expected the created row, got {other}"
        ))),
    }
}

/// Separate a collection's `product_ids` from the plain column patch.
///
/// Product ids that are still provisional cannot satisfy the junction's
/// foreign key and are left out; they are sent again once confirmed.
fn split_membership(kind: EntityKind, patch: Value) -> (Map<String, Value>, Option<Vec<String>>) {
    let mut fields = match patch {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if kind != EntityKind::Collection {
        return (fields, None);
    }
    let members = fields.remove("product_ids").map(|ids| {
        ids.as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .filter(|id| {
                        let provisional = id.starts_with("tmp:");
                        if provisional {
                            debug!(product_id = %id, "skipping unconfirmed collection member");
                        }
                        !provisional
                    })
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    });
    (fields, members)
}

/// Turn an embedded `collection_products` list into an ordered
/// `product_ids` array.
fn flatten_membership(row: &mut Value) {
    let Some(map) = row.as_object_mut() else {
        return;
    };
    let mut links: Vec<(i64, String)> = map
        .remove(MEMBERSHIP_TABLE)
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default()
        .iter()
        .filter_map(|link| {
            let product_id = link.get("product_id")?.as_str()?.to_string();
            let position = link.get("position").and_then(Value::as_i64).unwrap_or(i64::MAX);
            Some((position, product_id))
        })
        .collect();
    links.sort();
    let ids: Vec<Value> = links.into_iter().map(|(_, id)| Value::String(id)).collect();
    map.insert("product_ids".into(), Value::Array(ids));
}
