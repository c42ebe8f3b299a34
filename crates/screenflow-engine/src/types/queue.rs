//! Queue entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ClientFlowScreen;

/// One entry in a user's screen queue.
///
/// **Ordering invariant**: entries for a user form a strict total order
/// by `(outer_counter DESC, inner_counter ASC)`; no two entries share
/// the pair. Entries queued together by one trigger call share an
/// `outer_counter` one above the previous maximum, with `inner_counter`
/// 0..N-1 in flow order — so they sort before everything older, in
/// their intended order, without renumbering existing rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UserClientScreen {
    pub uid: String,
    pub user_id: String,
    /// Originating flow, kept for debugging. `None` once the flow row
    /// is deleted.
    pub flow_slug: Option<String>,
    pub screen_slug: String,
    pub outer_counter: i64,
    pub inner_counter: i64,
    /// Client-provided trigger parameters, frozen at insertion.
    pub flow_client_parameters: Value,
    /// Server-provided trigger parameters, including `__extracted`
    /// values written at trigger time.
    pub flow_server_parameters: Value,
    /// Frozen copy of the flow screen at insertion time — immune to
    /// later flow edits.
    pub screen: ClientFlowScreen,
    pub added_at: DateTime<Utc>,
}

impl UserClientScreen {
    /// Sort key matching `(outer_counter DESC, inner_counter ASC)`.
    pub fn sort_key(&self) -> (i64, i64) {
        (-self.outer_counter, self.inner_counter)
    }
}

/// A not-yet-persisted queue entry. The queue store assigns uid,
/// counters, and timestamp on insertion.
#[derive(Debug, Clone)]
pub struct NewQueueEntry {
    pub flow_slug: Option<String>,
    pub screen: ClientFlowScreen,
    pub flow_client_parameters: Value,
    pub flow_server_parameters: Value,
}

/// Result of a guarded front-pop.
#[derive(Debug, Clone)]
pub enum PopResult {
    /// The head matched the expected uid and was removed.
    Removed(Box<UserClientScreen>),
    /// The head's uid differed from the expected uid. Nothing removed.
    Desync { head_uid: String },
    /// The queue was empty.
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(outer: i64, inner: i64) -> UserClientScreen {
        UserClientScreen {
            uid: format!("ucs_{outer}_{inner}"),
            user_id: "u_1".into(),
            flow_slug: None,
            screen_slug: "s".into(),
            outer_counter: outer,
            inner_counter: inner,
            flow_client_parameters: json!({}),
            flow_server_parameters: json!({}),
            screen: ClientFlowScreen {
                slug: "s".into(),
                name: None,
                fixed: json!({}),
                variable: vec![],
                allowed_triggers: vec![],
                rules: Default::default(),
            },
            added_at: Utc::now(),
        }
    }

    #[test]
    fn sort_key_orders_outer_desc_inner_asc() {
        let mut entries = vec![entry(0, 1), entry(-1, 0), entry(0, 0), entry(-1, 1)];
        entries.sort_by_key(|e| e.sort_key());
        let uids: Vec<&str> = entries.iter().map(|e| e.uid.as_str()).collect();
        assert_eq!(uids, ["ucs_0_0", "ucs_0_1", "ucs_-1_0", "ucs_-1_1"]);
    }
}
