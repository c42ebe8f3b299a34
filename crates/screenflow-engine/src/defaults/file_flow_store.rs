//! File-backed flow store.
//!
//! One JSON document per flow, named `<slug>.json` under the store
//! directory. The screen list is stored as its compressed blob form
//! (the same encoding admin tooling exchanges), so documents stay
//! small even for long flows. Writes go through a temp file and a
//! rename, so readers never observe a half-written flow.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::blob;
use crate::errors::{BlobError, FlowStoreError};
use crate::traits::FlowStore;
use crate::types::{ClientFlow, FlowFlags, FlowRule};

/// On-disk representation: [`ClientFlow`] with `screens` swapped for
/// its blob encoding.
#[derive(Serialize, Deserialize)]
struct StoredFlow {
    uid: String,
    slug: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    client_schema: Value,
    server_schema: Value,
    replaces: bool,
    screens_blob: String,
    rules: Vec<FlowRule>,
    flags: FlowFlags,
    created_at: DateTime<Utc>,
}

impl StoredFlow {
    fn from_flow(flow: &ClientFlow) -> Result<Self, BlobError> {
        Ok(Self {
            uid: flow.uid.clone(),
            slug: flow.slug.clone(),
            name: flow.name.clone(),
            description: flow.description.clone(),
            client_schema: flow.client_schema.clone(),
            server_schema: flow.server_schema.clone(),
            replaces: flow.replaces,
            screens_blob: blob::encode_screens(&flow.screens)?,
            rules: flow.rules.clone(),
            flags: flow.flags,
            created_at: flow.created_at,
        })
    }

    fn into_flow(self) -> Result<ClientFlow, BlobError> {
        Ok(ClientFlow {
            uid: self.uid,
            slug: self.slug,
            name: self.name,
            description: self.description,
            client_schema: self.client_schema,
            server_schema: self.server_schema,
            replaces: self.replaces,
            screens: blob::decode_screens(&self.screens_blob)?,
            rules: self.rules,
            flags: self.flags,
            created_at: self.created_at,
        })
    }
}

pub struct FileFlowStore {
    dir: PathBuf,
}

impl FileFlowStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, FlowStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(store_err)?;
        Ok(Self { dir })
    }

    fn path_for(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{slug}.json"))
    }

    fn read_flow(path: &Path) -> Result<Option<ClientFlow>, FlowStoreError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(store_err(e)),
        };
        let stored: StoredFlow = serde_json::from_slice(&bytes).map_err(store_err)?;
        Ok(Some(stored.into_flow().map_err(store_err)?))
    }
}

fn store_err(e: impl std::fmt::Display) -> FlowStoreError {
    FlowStoreError::Store {
        message: e.to_string(),
    }
}

#[async_trait]
impl FlowStore for FileFlowStore {
    async fn get_flow(&self, slug: &str) -> Result<Option<ClientFlow>, FlowStoreError> {
        Self::read_flow(&self.path_for(slug))
    }

    async fn put_flow(&self, flow: &ClientFlow) -> Result<(), FlowStoreError> {
        let stored = StoredFlow::from_flow(flow).map_err(store_err)?;
        let bytes = serde_json::to_vec_pretty(&stored).map_err(store_err)?;

        let path = self.path_for(&flow.slug);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(store_err)?;
        fs::rename(&tmp, &path).map_err(store_err)?;
        debug!(slug = %flow.slug, path = %path.display(), "flow written");
        Ok(())
    }

    async fn list_flows(&self) -> Result<Vec<ClientFlow>, FlowStoreError> {
        let mut flows = Vec::new();
        for dirent in fs::read_dir(&self.dir).map_err(store_err)? {
            let path = dirent.map_err(store_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(flow) = Self::read_flow(&path)? {
                flows.push(flow);
            }
        }
        flows.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(flows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClientFlowScreen, ScreenRules};
    use serde_json::json;

    fn flow(slug: &str) -> ClientFlow {
        ClientFlow {
            uid: format!("flw_{slug}"),
            slug: slug.to_string(),
            name: slug.to_string(),
            description: Some("a flow".to_string()),
            client_schema: json!({"type": "object"}),
            server_schema: json!({"type": "object"}),
            replaces: true,
            screens: vec![ClientFlowScreen {
                slug: "welcome".to_string(),
                name: None,
                fixed: json!({"header": "hi"}),
                variable: vec![],
                allowed_triggers: vec!["next".to_string()],
                rules: ScreenRules::default(),
            }],
            rules: vec![],
            flags: FlowFlags::all_platforms(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileFlowStore::new(dir.path()).unwrap();

        store.put_flow(&flow("onboarding")).await.unwrap();
        let loaded = store.get_flow("onboarding").await.unwrap().unwrap();

        assert_eq!(loaded.slug, "onboarding");
        assert!(loaded.replaces);
        assert_eq!(loaded.screens.len(), 1);
        assert_eq!(loaded.screens[0].slug, "welcome");
        assert_eq!(loaded.screens[0].fixed, json!({"header": "hi"}));
    }

    #[tokio::test]
    async fn missing_flow_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileFlowStore::new(dir.path()).unwrap();
        assert!(store.get_flow("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_overwrites_and_list_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileFlowStore::new(dir.path()).unwrap();

        store.put_flow(&flow("b")).await.unwrap();
        store.put_flow(&flow("a")).await.unwrap();
        let mut updated = flow("b");
        updated.name = "renamed".to_string();
        store.put_flow(&updated).await.unwrap();

        let listed = store.list_flows().await.unwrap();
        assert_eq!(
            listed.iter().map(|f| f.slug.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(listed[1].name, "renamed");
    }
}
