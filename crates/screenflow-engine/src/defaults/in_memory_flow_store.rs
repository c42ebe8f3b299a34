//! In-memory flow store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::FlowStoreError;
use crate::traits::FlowStore;
use crate::types::ClientFlow;

/// Slug-keyed map behind an async lock. Suitable for tests and
/// single-process deployments where flows are seeded at startup.
#[derive(Default)]
pub struct InMemoryFlowStore {
    flows: RwLock<HashMap<String, ClientFlow>>,
}

impl InMemoryFlowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlowStore for InMemoryFlowStore {
    async fn get_flow(&self, slug: &str) -> Result<Option<ClientFlow>, FlowStoreError> {
        Ok(self.flows.read().await.get(slug).cloned())
    }

    async fn put_flow(&self, flow: &ClientFlow) -> Result<(), FlowStoreError> {
        self.flows
            .write()
            .await
            .insert(flow.slug.clone(), flow.clone());
        Ok(())
    }

    async fn list_flows(&self) -> Result<Vec<ClientFlow>, FlowStoreError> {
        let mut flows: Vec<ClientFlow> = self.flows.read().await.values().cloned().collect();
        flows.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(flows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClientFlow, FlowFlags};
    use serde_json::json;

    fn flow(slug: &str) -> ClientFlow {
        ClientFlow {
            uid: format!("flw_{slug}"),
            slug: slug.to_string(),
            name: slug.to_string(),
            description: None,
            client_schema: json!({"type": "object"}),
            server_schema: json!({"type": "object"}),
            replaces: false,
            screens: vec![],
            rules: vec![],
            flags: FlowFlags::all_platforms(),
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn put_then_get_and_list() {
        let store = InMemoryFlowStore::new();
        store.put_flow(&flow("b")).await.unwrap();
        store.put_flow(&flow("a")).await.unwrap();

        assert_eq!(store.get_flow("a").await.unwrap().unwrap().slug, "a");
        assert!(store.get_flow("missing").await.unwrap().is_none());

        let listed = store.list_flows().await.unwrap();
        assert_eq!(
            listed.iter().map(|f| f.slug.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[tokio::test]
    async fn put_overwrites_by_slug() {
        let store = InMemoryFlowStore::new();
        store.put_flow(&flow("a")).await.unwrap();
        let mut updated = flow("a");
        updated.name = "renamed".to_string();
        store.put_flow(&updated).await.unwrap();

        assert_eq!(store.get_flow("a").await.unwrap().unwrap().name, "renamed");
        assert_eq!(store.list_flows().await.unwrap().len(), 1);
    }
}
