use crate::ArtifactStore;
use accuproof_core::Result;
use accuproof_rpc::RpcClient;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Wraps an `RpcClient` so every `query` is transparently persisted to
/// the artifact store under a monotonically increasing label, giving the
/// strict fetch-order custody chain spec.md §5 requires without
/// threading the store through every call site.
pub struct ArtifactRecordingClient<C: RpcClient> {
    inner: C,
    store: Arc<ArtifactStore>,
    sequence: AtomicU64,
}

impl<C: RpcClient> ArtifactRecordingClient<C> {
    pub fn new(inner: C, store: Arc<ArtifactStore>) -> Self {
        Self {
            inner,
            store,
            sequence: AtomicU64::new(0),
        }
    }

    fn next_label(&self, scope: &str) -> String {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        let slug: String = scope
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{n:04}_{slug}")
    }
}

#[async_trait]
impl<C: RpcClient> RpcClient for ArtifactRecordingClient<C> {
    async fn query(&self, scope: &str, query: &Value) -> Result<Value> {
        let label = self.next_label(scope);
        self.store.save_rpc_artifact(&label, &self.inner, scope, query).await
    }

    async fn query_raw(&self, scope: &str, query: &Value) -> Result<Vec<u8>> {
        self.inner.query_raw(scope, query).await
    }

    fn endpoint(&self) -> &str {
        self.inner.endpoint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FakeClient(Value);

    #[async_trait]
    impl RpcClient for FakeClient {
        async fn query(&self, _scope: &str, _query: &Value) -> Result<Value> {
            Ok(self.0.clone())
        }
        async fn query_raw(&self, _scope: &str, _query: &Value) -> Result<Vec<u8>> {
            Ok(serde_json::to_vec(&json!({
                "jsonrpc": "2.0", "id": 1, "result": self.0, "error": null
            }))
            .unwrap())
        }
        fn endpoint(&self) -> &str {
            "mock://test"
        }
    }

    fn tmp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("accuproof_recording_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[tokio::test]
    async fn labels_increase_monotonically_per_query() {
        let dir = tmp_dir("labels");
        let store = Arc::new(ArtifactStore::new(&dir).unwrap());
        let client = ArtifactRecordingClient::new(FakeClient(json!({"ok": true})), store.clone());
        let query = json!({"queryType": "chain", "name": "main"});

        client.query("acc://x.acme", &query).await.unwrap();
        client.query("acc://y.acme", &query).await.unwrap();

        let chain = store.custody_chain();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].artifact_id, "0000_acc__x_acme");
        assert_eq!(chain[1].artifact_id, "0001_acc__y_acme");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
