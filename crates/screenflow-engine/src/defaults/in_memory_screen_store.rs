//! In-memory screen store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::ScreenStoreError;
use crate::traits::ScreenStore;
use crate::types::ClientScreen;

#[derive(Default)]
pub struct InMemoryScreenStore {
    screens: RwLock<HashMap<String, ClientScreen>>,
}

impl InMemoryScreenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScreenStore for InMemoryScreenStore {
    async fn get_screen(&self, slug: &str) -> Result<Option<ClientScreen>, ScreenStoreError> {
        Ok(self.screens.read().await.get(slug).cloned())
    }

    async fn put_screen(&self, screen: &ClientScreen) -> Result<(), ScreenStoreError> {
        self.screens
            .write()
            .await
            .insert(screen.slug.clone(), screen.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScreenFlags;
    use serde_json::json;

    #[tokio::test]
    async fn put_then_get() {
        let store = InMemoryScreenStore::new();
        let screen = ClientScreen {
            uid: "scr_1".to_string(),
            slug: "welcome".to_string(),
            name: "Welcome".to_string(),
            schema: json!({"type": "object"}),
            flags: ScreenFlags::all(),
        };
        store.put_screen(&screen).await.unwrap();

        assert_eq!(
            store.get_screen("welcome").await.unwrap().unwrap().uid,
            "scr_1"
        );
        assert!(store.get_screen("missing").await.unwrap().is_none());
    }
}
