//! Table-backed resource resolver for tests and seeding.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ResolverError;
use crate::traits::ResourceResolver;
use crate::types::CustomFormat;

/// Resolves uids from an in-process table. `insert` is synchronous so
/// fixtures can be loaded without an executor.
#[derive(Default)]
pub struct StaticResources {
    entries: RwLock<HashMap<(CustomFormat, String), Value>>,
}

impl StaticResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, format: CustomFormat, uid: &str, value: Value) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert((format, uid.to_string()), value);
        }
    }

    fn get(&self, format: CustomFormat, uid: &str) -> Result<Option<Value>, ResolverError> {
        let entries = self.entries.read().map_err(|_| ResolverError::Resolver {
            message: "resource table lock poisoned".to_string(),
        })?;
        Ok(entries.get(&(format, uid.to_string())).cloned())
    }
}

#[async_trait]
impl ResourceResolver for StaticResources {
    async fn resolve_image(&self, uid: &str) -> Result<Option<Value>, ResolverError> {
        self.get(CustomFormat::ImageUid, uid)
    }

    async fn resolve_content(&self, uid: &str) -> Result<Option<Value>, ResolverError> {
        self.get(CustomFormat::ContentUid, uid)
    }

    async fn resolve_journey(&self, uid: &str) -> Result<Option<Value>, ResolverError> {
        self.get(CustomFormat::JourneyUid, uid)
    }

    async fn resolve_course(&self, uid: &str) -> Result<Option<Value>, ResolverError> {
        self.get(CustomFormat::CourseUid, uid)
    }

    async fn resolve_interactive_prompt(&self, uid: &str) -> Result<Option<Value>, ResolverError> {
        self.get(CustomFormat::InteractivePromptUid, uid)
    }

    async fn resolve_journal_entry(&self, uid: &str) -> Result<Option<Value>, ResolverError> {
        self.get(CustomFormat::JournalEntryUid, uid)
    }
}
