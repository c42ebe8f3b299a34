//! In-memory per-user queue store.
//!
//! Entries live in a `Vec` kept in display order (head first, i.e.
//! sorted by `(outer_counter DESC, inner_counter ASC)`). A single
//! async lock over the user map serializes mutations per user, which
//! satisfies the [`QueueStore`] atomicity contract for one process.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::errors::QueueStoreError;
use crate::traits::QueueStore;
use crate::types::{new_uid, NewQueueEntry, PopResult, UserClientScreen};

#[derive(Default)]
pub struct InMemoryQueue {
    users: RwLock<HashMap<String, Vec<UserClientScreen>>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_batch(
        user_id: &str,
        outer_counter: i64,
        items: Vec<NewQueueEntry>,
    ) -> Vec<UserClientScreen> {
        items
            .into_iter()
            .enumerate()
            .map(|(inner, item)| UserClientScreen {
                uid: new_uid("ucs"),
                user_id: user_id.to_string(),
                flow_slug: item.flow_slug,
                screen_slug: item.screen.slug.clone(),
                outer_counter,
                inner_counter: inner as i64,
                flow_client_parameters: item.flow_client_parameters,
                flow_server_parameters: item.flow_server_parameters,
                screen: item.screen,
                added_at: Utc::now(),
            })
            .collect()
    }
}

#[async_trait]
impl QueueStore for InMemoryQueue {
    async fn peek_front(&self, user_id: &str) -> Result<Option<UserClientScreen>, QueueStoreError> {
        Ok(self
            .users
            .read()
            .await
            .get(user_id)
            .and_then(|entries| entries.first().cloned()))
    }

    async fn pop_front(
        &self,
        user_id: &str,
        expected_uid: &str,
    ) -> Result<PopResult, QueueStoreError> {
        let mut users = self.users.write().await;
        let Some(entries) = users.get_mut(user_id) else {
            return Ok(PopResult::Empty);
        };
        let Some(head) = entries.first() else {
            return Ok(PopResult::Empty);
        };
        if head.uid != expected_uid {
            return Ok(PopResult::Desync {
                head_uid: head.uid.clone(),
            });
        }
        Ok(PopResult::Removed(Box::new(entries.remove(0))))
    }

    async fn clear(&self, user_id: &str) -> Result<(), QueueStoreError> {
        // Dropping the user row rebases the counter space: the next
        // batch starts back at outer_counter 0.
        self.users.write().await.remove(user_id);
        Ok(())
    }

    async fn prepend_many(
        &self,
        user_id: &str,
        items: Vec<NewQueueEntry>,
    ) -> Result<Vec<String>, QueueStoreError> {
        if items.is_empty() {
            return Ok(vec![]);
        }
        let mut users = self.users.write().await;
        let entries = users.entry(user_id.to_string()).or_default();
        let outer = entries
            .iter()
            .map(|e| e.outer_counter)
            .max()
            .map(|max| max + 1)
            .unwrap_or(0);
        let batch = Self::build_batch(user_id, outer, items);
        let uids = batch.iter().map(|e| e.uid.clone()).collect();
        entries.splice(0..0, batch);
        Ok(uids)
    }

    async fn replace_all(
        &self,
        user_id: &str,
        items: Vec<NewQueueEntry>,
    ) -> Result<Vec<String>, QueueStoreError> {
        let batch = Self::build_batch(user_id, 0, items);
        let uids = batch.iter().map(|e| e.uid.clone()).collect();
        self.users
            .write()
            .await
            .insert(user_id.to_string(), batch);
        Ok(uids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClientFlowScreen, ScreenRules};
    use serde_json::json;

    fn entry(slug: &str) -> NewQueueEntry {
        NewQueueEntry {
            flow_slug: Some("f".to_string()),
            screen: ClientFlowScreen {
                slug: slug.to_string(),
                name: None,
                fixed: json!({}),
                variable: vec![],
                allowed_triggers: vec![],
                rules: ScreenRules::default(),
            },
            flow_client_parameters: json!({}),
            flow_server_parameters: json!({}),
        }
    }

    async fn drain(queue: &InMemoryQueue, user: &str) -> Vec<String> {
        let mut slugs = Vec::new();
        while let Some(head) = queue.peek_front(user).await.unwrap() {
            slugs.push(head.screen_slug.clone());
            match queue.pop_front(user, &head.uid).await.unwrap() {
                PopResult::Removed(_) => {}
                other => panic!("expected removal, got {other:?}"),
            }
        }
        slugs
    }

    #[tokio::test]
    async fn newer_batch_sits_in_front_keeping_batch_order() {
        let queue = InMemoryQueue::new();
        queue
            .prepend_many("u", vec![entry("a"), entry("b"), entry("c")])
            .await
            .unwrap();
        queue
            .prepend_many("u", vec![entry("x"), entry("y")])
            .await
            .unwrap();

        assert_eq!(drain(&queue, "u").await, vec!["x", "y", "a", "b", "c"]);
    }

    #[tokio::test]
    async fn pop_with_stale_uid_is_desync_and_removes_nothing() {
        let queue = InMemoryQueue::new();
        queue.prepend_many("u", vec![entry("a")]).await.unwrap();

        match queue.pop_front("u", "ucs_stale").await.unwrap() {
            PopResult::Desync { head_uid } => {
                assert_eq!(
                    queue.peek_front("u").await.unwrap().unwrap().uid,
                    head_uid
                );
            }
            other => panic!("expected desync, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pop_on_empty_queue_reports_empty() {
        let queue = InMemoryQueue::new();
        assert!(matches!(
            queue.pop_front("u", "ucs_x").await.unwrap(),
            PopResult::Empty
        ));
    }

    #[tokio::test]
    async fn replace_all_discards_existing_entries() {
        let queue = InMemoryQueue::new();
        queue
            .prepend_many("u", vec![entry("a"), entry("b")])
            .await
            .unwrap();
        queue.replace_all("u", vec![entry("z")]).await.unwrap();

        assert_eq!(drain(&queue, "u").await, vec!["z"]);
    }

    #[tokio::test]
    async fn replace_with_nothing_empties_the_queue() {
        let queue = InMemoryQueue::new();
        queue.prepend_many("u", vec![entry("a")]).await.unwrap();
        queue.replace_all("u", vec![]).await.unwrap();

        assert!(queue.peek_front("u").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_rebases_counters_to_zero() {
        let queue = InMemoryQueue::new();
        queue.prepend_many("u", vec![entry("a")]).await.unwrap();
        queue.prepend_many("u", vec![entry("b")]).await.unwrap();
        queue.clear("u").await.unwrap();
        queue.prepend_many("u", vec![entry("c")]).await.unwrap();

        let head = queue.peek_front("u").await.unwrap().unwrap();
        assert_eq!(head.outer_counter, 0);
        assert_eq!(head.inner_counter, 0);
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let queue = InMemoryQueue::new();
        queue.prepend_many("u1", vec![entry("a")]).await.unwrap();

        assert!(queue.peek_front("u2").await.unwrap().is_none());
    }
}
