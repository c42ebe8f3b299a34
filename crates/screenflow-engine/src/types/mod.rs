//! Core data model — the contract between flow definitions, the queue,
//! and the client-facing surface.

mod flow;
mod outcome;
mod queue;
mod screen;

pub use flow::{
    ClientFlow, ClientFlowScreen, FieldConstraint, FlowFlags, FlowRule, ParamPolicy, RuleEffect,
    RuleOperator, ScreenRules, Substitution,
};
pub use outcome::{RealizedScreen, TriggerDirective, TriggerOutcome};
pub use queue::{NewQueueEntry, PopResult, UserClientScreen};
pub use screen::{ClientScreen, CustomFormat, ImageExport, ImageRef, Platform, ScreenFlags};

/// Mint a new prefixed uid, e.g. `ucs_7c9e6679-...`.
///
/// Every persisted row type carries a short prefix so a bare uid is
/// attributable to its table in logs.
pub fn new_uid(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4())
}
