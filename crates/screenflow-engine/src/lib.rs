//! ScreenFlow — a server-driven client flow and screen queue engine.
//!
//! Each user carries an ordered queue of screens. Server or client
//! events trigger named flows whose screens are materialized — rules
//! evaluated, parameters substituted, trusted references extracted —
//! and placed at the front of (or replacing) that queue. Clients only
//! ever peek the head, act on it, and pop it with the uid they saw.
//!
//! The engine is designed to be embedded: storage, resource
//! resolution, and token issuance are trait-pluggable, with in-process
//! defaults suitable for tests and single-node deployments.

pub mod blob;
pub mod defaults;
pub mod engine;
pub mod errors;
pub mod params;
pub mod realize;
pub mod rules;
pub mod schema;
pub mod system;
pub mod traits;
pub mod types;

// Re-export public types at the crate level.

// defaults
pub use defaults::{
    FileFlowStore, HmacJwtIssuer, InMemoryFlowStore, InMemoryQueue, InMemoryScreenStore,
    StaticResources,
};

// engine
pub use engine::{Engine, EngineBuilder, EngineConfig, TriggerContext};

// errors
pub use errors::{
    BlobError, EngineError, FlowStoreError, JwtError, ParamError, QueueStoreError, ResolverError,
    ScreenStoreError,
};

// realize
pub use realize::{RealizeSignal, ScreenRealizer};

// rules
pub use rules::RuleContext;

// traits
pub use traits::{FlowStore, JwtIssuer, QueueStore, ResourceResolver, ScreenStore};

// types
pub use types::{
    ClientFlow, ClientFlowScreen, ClientScreen, CustomFormat, FieldConstraint, FlowFlags,
    FlowRule, ImageExport, ImageRef, NewQueueEntry, ParamPolicy, Platform, PopResult,
    RealizedScreen, RuleEffect, RuleOperator, ScreenFlags, ScreenRules, Substitution,
    TriggerDirective, TriggerOutcome, UserClientScreen,
};
