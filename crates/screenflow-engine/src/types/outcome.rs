//! Results of the public trigger / peek / pop surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a trigger call, after any rule-driven replacements.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TriggerOutcome {
    /// The flow that actually ran — may differ from the requested slug
    /// after replacements or system-flow redirects.
    pub flow_slug: String,
    /// uids of the queue entries created, in queue order.
    pub queued: Vec<String>,
    /// Whether the existing queue was cleared first.
    pub replaced: bool,
    /// Screens dropped from the build list (missing definitions or
    /// unresolvable parameters). Reported for monitoring.
    pub dropped_screens: usize,
}

/// A screen ready for client consumption: substituted parameters with
/// trusted references exchanged for JWT-bearing objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RealizedScreen {
    /// uid of the queue entry this realization came from. The client
    /// echoes it back on pop as the expected head.
    pub uid: String,
    pub slug: String,
    pub parameters: Value,
}

/// Client-supplied flow trigger attached to a pop (screen completion).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TriggerDirective {
    pub slug: String,
    #[serde(default = "empty_object")]
    pub client_parameters: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}
