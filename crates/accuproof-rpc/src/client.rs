use crate::wire::{JsonRpcRequest, JsonRpcResponse};
use accuproof_cache::QueryCache;
use accuproof_core::{AccProofError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// External collaborator contract (spec.md §4.9): a node RPC endpoint,
/// supplied by the implementer. `query` returns parsed JSON; `query_raw`
/// returns the undecoded response bytes (used by the artifact store to
/// preserve byte-exact copies).
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn query(&self, scope: &str, query: &Value) -> Result<Value>;
    async fn query_raw(&self, scope: &str, query: &Value) -> Result<Vec<u8>>;
    fn endpoint(&self) -> &str;
}

/// Plain HTTP JSON-RPC 2.0 client, modeled on the wallet's own
/// reqwest-based RPC client: raw `reqwest::Client` + `serde_json`,
/// no intervening RPC framework.
pub struct HttpRpcClient {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpRpcClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client build is infallible for this configuration");
        Self {
            endpoint: endpoint.into(),
            http,
        }
    }

    async fn post_raw(&self, scope: &str, query: &Value) -> Result<Vec<u8>> {
        let body = JsonRpcRequest::query(scope, query);
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AccProofError::Transport(e.to_string()))?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AccProofError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl RpcClient for HttpRpcClient {
    async fn query(&self, scope: &str, query: &Value) -> Result<Value> {
        let bytes = self.post_raw(scope, query).await?;
        let parsed: JsonRpcResponse = serde_json::from_slice(&bytes)
            .map_err(|e| AccProofError::NonJsonBody(e.to_string()))?;
        if let Some(err) = parsed.error {
            if !err.is_null() {
                return Err(AccProofError::RpcError(err.to_string()));
            }
        }
        parsed.result.ok_or(AccProofError::MissingResult)
    }

    async fn query_raw(&self, scope: &str, query: &Value) -> Result<Vec<u8>> {
        self.post_raw(scope, query).await
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Wraps any `RpcClient` with the process-wide query cache, applying the
/// `should_cache` policy from spec.md §4.1 transparently to both the
/// parsed (`query`) and byte-exact (`query_raw`) paths, so artifact
/// recording's raw fetches are cached too.
pub struct CachedRpcClient<C: RpcClient> {
    inner: C,
    cache: Arc<QueryCache>,
}

impl<C: RpcClient> CachedRpcClient<C> {
    pub fn new(inner: C, cache: Arc<QueryCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<C: RpcClient> RpcClient for CachedRpcClient<C> {
    async fn query(&self, scope: &str, query: &Value) -> Result<Value> {
        if QueryCache::should_cache(query) {
            if let Some(hit) = self.cache.get(scope, query) {
                debug!(scope, "cache hit");
                return Ok(hit);
            }
        }
        let response = self.inner.query(scope, query).await?;
        if QueryCache::should_cache(query) {
            self.cache.set(scope, query, &response, None);
        }
        Ok(response)
    }

    async fn query_raw(&self, scope: &str, query: &Value) -> Result<Vec<u8>> {
        if QueryCache::should_cache(query) {
            if let Some(hit) = self.cache.get_raw(scope, query) {
                debug!(scope, "cache hit (raw)");
                return Ok(hit);
            }
        }
        let bytes = self.inner.query_raw(scope, query).await?;
        if QueryCache::should_cache(query) {
            if let Ok(parsed) = serde_json::from_slice::<Value>(&bytes) {
                self.cache.set_raw(scope, query, &bytes, &parsed, None);
            }
        }
        Ok(bytes)
    }

    fn endpoint(&self) -> &str {
        self.inner.endpoint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct CountingClient {
        calls: Mutex<u32>,
        response: Value,
    }

    #[async_trait]
    impl RpcClient for CountingClient {
        async fn query(&self, _scope: &str, _query: &Value) -> Result<Value> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.response.clone())
        }
        async fn query_raw(&self, _scope: &str, _query: &Value) -> Result<Vec<u8>> {
            Ok(serde_json::to_vec(&self.response).unwrap())
        }
        fn endpoint(&self) -> &str {
            "mock://test"
        }
    }

    #[tokio::test]
    async fn cached_client_hits_after_first_query() {
        let inner = CountingClient {
            calls: Mutex::new(0),
            response: json!({"ok": true}),
        };
        let cache = Arc::new(QueryCache::new(10, Duration::from_secs(60)));
        let client = CachedRpcClient::new(inner, cache);
        let query = json!({"queryType": "chain", "name": "main"});

        client.query("acc://x.acme", &query).await.unwrap();
        client.query("acc://x.acme", &query).await.unwrap();

        assert_eq!(*client.inner.calls.lock().unwrap(), 1);
    }

    struct CountingRawClient {
        calls: Mutex<u32>,
        response: Value,
    }

    #[async_trait]
    impl RpcClient for CountingRawClient {
        async fn query(&self, _scope: &str, _query: &Value) -> Result<Value> {
            Ok(self.response.clone())
        }
        async fn query_raw(&self, _scope: &str, _query: &Value) -> Result<Vec<u8>> {
            *self.calls.lock().unwrap() += 1;
            Ok(serde_json::to_vec(&self.response).unwrap())
        }
        fn endpoint(&self) -> &str {
            "mock://test"
        }
    }

    #[tokio::test]
    async fn cached_client_hits_raw_path_too() {
        let inner = CountingRawClient {
            calls: Mutex::new(0),
            response: json!({"jsonrpc": "2.0", "id": 1, "result": {"ok": true}, "error": null}),
        };
        let cache = Arc::new(QueryCache::new(10, Duration::from_secs(60)));
        let client = CachedRpcClient::new(inner, cache);
        let query = json!({"queryType": "chain", "name": "main"});

        let first = client.query_raw("acc://x.acme", &query).await.unwrap();
        let second = client.query_raw("acc://x.acme", &query).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(*client.inner.calls.lock().unwrap(), 1);
    }
}
