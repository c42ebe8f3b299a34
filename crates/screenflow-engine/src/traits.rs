//! Plugin trait interfaces.
//!
//! Every pluggable component is an async trait with a default
//! implementation in [`defaults`](crate::defaults). Row storage and
//! resource resolution are external collaborators of the queue engine;
//! these traits are the whole contract.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{FlowStoreError, JwtError, QueueStoreError, ResolverError, ScreenStoreError};
use crate::types::{
    ClientFlow, ClientScreen, CustomFormat, NewQueueEntry, PopResult, UserClientScreen,
};

// ---------------------------------------------------------------------------
// FlowStore / ScreenStore
// ---------------------------------------------------------------------------

/// Persistence for flow definitions, keyed by slug.
///
/// Definitions are created and edited only by migrations or admin
/// surfaces; the engine reads them at trigger time. Slugs are globally
/// unique.
#[async_trait]
pub trait FlowStore: Send + Sync {
    async fn get_flow(&self, slug: &str) -> Result<Option<ClientFlow>, FlowStoreError>;

    async fn put_flow(&self, flow: &ClientFlow) -> Result<(), FlowStoreError>;

    async fn list_flows(&self) -> Result<Vec<ClientFlow>, FlowStoreError>;
}

/// Persistence for screen definitions, keyed by slug.
#[async_trait]
pub trait ScreenStore: Send + Sync {
    async fn get_screen(&self, slug: &str) -> Result<Option<ClientScreen>, ScreenStoreError>;

    async fn put_screen(&self, screen: &ClientScreen) -> Result<(), ScreenStoreError>;
}

// ---------------------------------------------------------------------------
// QueueStore
// ---------------------------------------------------------------------------

/// The per-user ordered screen queue.
///
/// Mutations (`pop_front`, `clear`, `prepend_many`, `replace_all`) must
/// serialize per user id and be individually atomic: a multi-item
/// insert is visible all-or-nothing, and `replace_all` is one unit.
/// Reads may run concurrently with writers but must observe a
/// consistent snapshot. No cross-user coordination is required.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// The entry that sorts first by `(outer_counter DESC,
    /// inner_counter ASC)`, without removing it.
    async fn peek_front(&self, user_id: &str) -> Result<Option<UserClientScreen>, QueueStoreError>;

    /// Remove the head only if its uid matches `expected_uid` — guards
    /// against clients stale relative to server-driven mutations.
    async fn pop_front(
        &self,
        user_id: &str,
        expected_uid: &str,
    ) -> Result<PopResult, QueueStoreError>;

    /// Remove every entry and rebase the counter space toward zero.
    async fn clear(&self, user_id: &str) -> Result<(), QueueStoreError>;

    /// Insert `items` (in order) in front of the existing queue: one
    /// fresh `outer_counter` bucket, `inner_counter` 0..N-1. Returns
    /// the assigned entry uids in the same order.
    async fn prepend_many(
        &self,
        user_id: &str,
        items: Vec<NewQueueEntry>,
    ) -> Result<Vec<String>, QueueStoreError>;

    /// Atomically clear the queue and insert `items` as its entire new
    /// content. Equivalent to `clear` + `prepend_many` as one unit.
    async fn replace_all(
        &self,
        user_id: &str,
        items: Vec<NewQueueEntry>,
    ) -> Result<Vec<String>, QueueStoreError>;
}

// ---------------------------------------------------------------------------
// ResourceResolver
// ---------------------------------------------------------------------------

/// Dereferences trusted custom-format uids into embeddable objects.
///
/// Implementations back onto whatever owns each resource type (image
/// pipeline, content library, journal storage). Returned objects are
/// embedded into realized parameters as-is; images should match the
/// [`ImageRef`](crate::types::ImageRef) shape so export selection works.
#[async_trait]
pub trait ResourceResolver: Send + Sync {
    async fn resolve_image(&self, uid: &str) -> Result<Option<Value>, ResolverError>;

    async fn resolve_content(&self, uid: &str) -> Result<Option<Value>, ResolverError>;

    async fn resolve_journey(&self, uid: &str) -> Result<Option<Value>, ResolverError>;

    async fn resolve_course(&self, uid: &str) -> Result<Option<Value>, ResolverError>;

    async fn resolve_interactive_prompt(&self, uid: &str) -> Result<Option<Value>, ResolverError>;

    async fn resolve_journal_entry(&self, uid: &str) -> Result<Option<Value>, ResolverError>;

    /// Dispatch on format. Flow slugs name flows, not resources, and
    /// always resolve to `None` here.
    async fn resolve(
        &self,
        format: CustomFormat,
        uid: &str,
    ) -> Result<Option<Value>, ResolverError> {
        match format {
            CustomFormat::ImageUid => self.resolve_image(uid).await,
            CustomFormat::ContentUid => self.resolve_content(uid).await,
            CustomFormat::JourneyUid => self.resolve_journey(uid).await,
            CustomFormat::CourseUid => self.resolve_course(uid).await,
            CustomFormat::InteractivePromptUid => self.resolve_interactive_prompt(uid).await,
            CustomFormat::JournalEntryUid => self.resolve_journal_entry(uid).await,
            CustomFormat::FlowSlug => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// JwtIssuer
// ---------------------------------------------------------------------------

/// Mints reference tokens scoped to a single resource.
///
/// Called during realization for every custom-format field delivered to
/// a client. Tokens are short-lived; audience comes from
/// [`CustomFormat::jwt_audience`](crate::types::CustomFormat::jwt_audience).
pub trait JwtIssuer: Send + Sync {
    fn issue(&self, audience: &str, uid: &str, ttl: chrono::Duration) -> Result<String, JwtError>;
}
