//! The flow trigger engine — the single entry point for the crate.
//!
//! One [`Engine`] owns the stores, resolvers, and realizer, and exposes
//! the client-visible surface: [`trigger`](Engine::trigger),
//! [`peek`](Engine::peek), [`pop`](Engine::pop), and
//! [`trace`](Engine::trace). Construct via [`Engine::builder()`].
//!
//! Every failure mode with a defined system flow is resolved here by
//! triggering that flow; callers of peek/pop cannot distinguish an
//! error redirect from an ordinary screen. Only transport-level faults
//! (storage down, resolver failure) surface as [`EngineError`], and
//! those never partially mutate the queue.

mod builder;

pub use builder::EngineBuilder;

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::errors::EngineError;
use crate::params::{self, ExtractError};
use crate::realize::{RealizeSignal, ScreenRealizer};
use crate::rules::{self, RuleContext};
use crate::schema;
use crate::system::slugs;
use crate::traits::{FlowStore, QueueStore, ResourceResolver, ScreenStore};
use crate::types::{
    ClientFlow, NewQueueEntry, ParamPolicy, Platform, PopResult, RealizedScreen, RuleEffect,
    TriggerDirective, TriggerOutcome,
};

/// Engine tuning knobs. The defaults are production values.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cap on admin-configurable flow→flow replacement chains. Beyond
    /// it the trigger fails closed to `error_contact_support`.
    pub max_replace_depth: usize,
    /// Budget for the peek/skip loop before failing closed.
    pub max_peek_iterations: usize,
    /// Validate trigger parameters and realized screens against their
    /// schemas. Skippable for performance in trusted deployments.
    pub validate_schemas: bool,
    /// Lifetime of minted reference JWTs.
    pub jwt_ttl: chrono::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_replace_depth: 12,
            max_peek_iterations: 25,
            validate_schemas: true,
            jwt_ttl: chrono::Duration::minutes(30),
        }
    }
}

/// Request context accompanying every trigger/peek/pop.
#[derive(Debug, Clone)]
pub struct TriggerContext {
    pub platform: Platform,
    /// Client app version code, when the transport layer knows it.
    pub app_version: Option<i64>,
}

impl TriggerContext {
    fn rule_context(&self) -> RuleContext {
        RuleContext::new()
            .with("platform", json!(self.platform.as_str()))
            .with(
                "version",
                self.app_version.map(|v| json!(v)).unwrap_or(Value::Null),
            )
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// The assembled engine. `Clone`-friendly — all internals are
/// `Arc`-wrapped.
pub struct Engine {
    flows: Arc<dyn FlowStore>,
    screens: Arc<dyn ScreenStore>,
    queue: Arc<dyn QueueStore>,
    resources: Arc<dyn ResourceResolver>,
    realizer: ScreenRealizer,
    config: EngineConfig,
}

impl Engine {
    /// Create a new [`EngineBuilder`].
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Trigger a flow for a user.
    ///
    /// `verified` marks server-originated triggers: only those may
    /// populate custom-format (JWT-bearing) parameters. Client-originated
    /// triggers (the pop directive path) must pass `false`.
    pub async fn trigger(
        &self,
        user_id: &str,
        slug: &str,
        client_parameters: Value,
        server_parameters: Value,
        ctx: &TriggerContext,
        verified: bool,
    ) -> Result<TriggerOutcome, EngineError> {
        let rule_ctx = ctx.rule_context();
        let mut slug = slug.to_string();
        let mut client = client_parameters;
        let mut server = server_parameters;
        let mut verified = verified;

        // Replacement chains are admin-configurable and may cycle; the
        // loop is bounded and fails closed.
        let mut depth = 0usize;
        let flow = loop {
            if depth > self.config.max_replace_depth {
                warn!(
                    slug = %slug,
                    depth,
                    "replace chain exceeded depth cap, failing closed"
                );
                client = empty_object();
                server = empty_object();
                // Fail-closed redirect skips rule evaluation entirely.
                let Some(fallback) = self.flows.get_flow(slugs::ERROR_CONTACT_SUPPORT).await?
                else {
                    return Err(EngineError::ReplaceDepthExceeded { depth });
                };
                break fallback;
            }
            depth += 1;

            let Some(flow) = self.flows.get_flow(&slug).await? else {
                info!(slug = %slug, "flow not found, redirecting");
                (slug, client, server, verified) = redirect(slugs::NOT_FOUND);
                continue;
            };

            if !flow.flags.triggerable_on(ctx.platform) {
                info!(slug = %slug, platform = ctx.platform.as_str(), "flow not triggerable on platform");
                (slug, client, server, verified) = redirect(slugs::WRONG_PLATFORM);
                continue;
            }

            if !verified && self.has_unsafe_outputs(&flow).await? {
                warn!(slug = %slug, "unverified trigger would populate trusted field");
                (slug, client, server, verified) = redirect(slugs::ERROR_UNSAFE);
                continue;
            }

            if self.config.validate_schemas
                && (schema::validate(&flow.client_schema, &client).is_err()
                    || schema::validate(&flow.server_schema, &server).is_err())
            {
                warn!(slug = %slug, "trigger parameters failed flow schema");
                (slug, client, server, verified) = redirect(slugs::ERROR_FLOW_SCHEMA);
                continue;
            }

            match rules::evaluate(&flow.rules, &rule_ctx) {
                Some(RuleEffect::Replace {
                    slug: replacement,
                    client_parameters,
                    server_parameters,
                }) => {
                    debug!(from = %slug, to = %replacement, "flow rule replacement");
                    if *client_parameters == ParamPolicy::Omit {
                        client = empty_object();
                    }
                    if *server_parameters == ParamPolicy::Omit {
                        server = empty_object();
                    }
                    slug = replacement.clone();
                }
                Some(RuleEffect::Skip) => {
                    debug!(from = %slug, "flow rule skip");
                    (slug, client, server, verified) = redirect(slugs::SKIP);
                }
                None => break flow,
            }
        };

        self.materialize(user_id, flow, client, server, &rule_ctx)
            .await
    }

    /// Build the screen list for a selected flow and mutate the queue.
    async fn materialize(
        &self,
        user_id: &str,
        flow: ClientFlow,
        client: Value,
        server: Value,
        rule_ctx: &RuleContext,
    ) -> Result<TriggerOutcome, EngineError> {
        let mut entries = Vec::with_capacity(flow.screens.len());
        let mut dropped = 0usize;

        for screen_def in &flow.screens {
            // Trigger-time rule: a match removes the screen entirely.
            if rules::evaluate(&screen_def.rules.trigger, rule_ctx).is_some() {
                debug!(flow = %flow.slug, screen = %screen_def.slug, "trigger rule dropped screen");
                continue;
            }

            if self.screens.get_screen(&screen_def.slug).await?.is_none() {
                warn!(flow = %flow.slug, screen = %screen_def.slug, "flow references missing screen");
                dropped += 1;
                continue;
            }

            let mut entry_server = server.clone();
            let extracted = params::run_trigger_extractions(
                screen_def,
                &flow.client_schema,
                &flow.server_schema,
                &client,
                &mut entry_server,
                self.resources.as_ref(),
            )
            .await;
            match extracted {
                Ok(()) => {}
                Err(ExtractError::Param(e)) => {
                    warn!(flow = %flow.slug, screen = %screen_def.slug, error = %e, "extraction failed, dropping screen");
                    dropped += 1;
                    continue;
                }
                Err(ExtractError::Missing { format, uid }) => {
                    warn!(
                        flow = %flow.slug,
                        screen = %screen_def.slug,
                        format = format.name(),
                        uid = %uid,
                        "extraction target missing, dropping screen"
                    );
                    dropped += 1;
                    continue;
                }
                Err(ExtractError::Resolver(e)) => return Err(e.into()),
            }

            entries.push(NewQueueEntry {
                flow_slug: Some(flow.slug.clone()),
                screen: screen_def.clone(),
                flow_client_parameters: client.clone(),
                flow_server_parameters: entry_server,
            });
        }

        let count = entries.len();
        let queued = if flow.replaces {
            self.queue.replace_all(user_id, entries).await?
        } else {
            self.queue.prepend_many(user_id, entries).await?
        };
        info!(
            user = user_id,
            flow = %flow.slug,
            queued = count,
            dropped,
            replaced = flow.replaces,
            "flow triggered"
        );

        Ok(TriggerOutcome {
            flow_slug: flow.slug,
            queued,
            replaced: flow.replaces,
            dropped_screens: dropped,
        })
    }

    /// Realize the current queue head without consuming it.
    ///
    /// An empty queue triggers the `empty` flow and retries once. A head
    /// the platform can't show, or whose peek rules match, is dropped
    /// via the `skip` flow and the loop continues (bounded).
    pub async fn peek(
        &self,
        user_id: &str,
        ctx: &TriggerContext,
    ) -> Result<Option<RealizedScreen>, EngineError> {
        let rule_ctx = ctx.rule_context();
        let mut triggered_empty = false;

        for _ in 0..self.config.max_peek_iterations {
            let Some(entry) = self.queue.peek_front(user_id).await? else {
                if triggered_empty {
                    // Operator configuration error: `empty` must queue
                    // at least one screen.
                    warn!(user = user_id, "empty flow produced an empty queue");
                    return Ok(None);
                }
                triggered_empty = true;
                self.trigger_system(user_id, slugs::EMPTY, ctx).await?;
                continue;
            };

            match self.realizer.realize(&entry, &rule_ctx, ctx.platform).await {
                Ok(realized) => return Ok(Some(realized)),
                Err(RealizeSignal::Skip) => {
                    debug!(user = user_id, uid = %entry.uid, "head skipped at peek");
                    self.drop_head(user_id, &entry.uid).await?;
                    self.trigger_system(user_id, slugs::SKIP, ctx).await?;
                }
                Err(RealizeSignal::ScreenMissing) => {
                    warn!(user = user_id, screen = %entry.screen_slug, "head references missing screen");
                    self.drop_head(user_id, &entry.uid).await?;
                    self.trigger_system(user_id, slugs::ERROR_SCREEN_MISSING, ctx)
                        .await?;
                }
                Err(RealizeSignal::SchemaInvalid(errors)) => {
                    warn!(user = user_id, screen = %entry.screen_slug, ?errors, "realized head failed schema");
                    self.drop_head(user_id, &entry.uid).await?;
                    self.trigger_system(user_id, slugs::ERROR_SCREEN_SCHEMA, ctx)
                        .await?;
                }
                Err(RealizeSignal::Param(e)) => {
                    warn!(user = user_id, screen = %entry.screen_slug, error = %e, "head parameters unresolvable");
                    self.drop_head(user_id, &entry.uid).await?;
                    self.trigger_system(user_id, slugs::ERROR_SCREEN_SCHEMA, ctx)
                        .await?;
                }
                Err(RealizeSignal::Fault(e)) => return Err(e),
            }
        }

        // Budget exhausted — fail closed to a screen that always renders.
        warn!(user = user_id, "peek loop budget exhausted, failing closed");
        self.trigger_system(user_id, slugs::ERROR_CONTACT_SUPPORT, ctx)
            .await?;
        let entry = self.queue.peek_front(user_id).await?.ok_or(
            EngineError::PeekLoopExhausted {
                iterations: self.config.max_peek_iterations,
            },
        )?;
        match self.realizer.realize(&entry, &rule_ctx, ctx.platform).await {
            Ok(realized) => Ok(Some(realized)),
            Err(RealizeSignal::Fault(e)) => Err(e),
            Err(_) => Err(EngineError::PeekLoopExhausted {
                iterations: self.config.max_peek_iterations,
            }),
        }
    }

    /// Consume the queue head the client just finished, optionally
    /// firing a completion trigger, and return the realized new head.
    ///
    /// A stale `expected_uid` removes nothing and redirects through the
    /// `desync` flow. The directive's slug must be in the popped
    /// screen's `allowed_triggers` (`skip` always is); otherwise the
    /// `forbidden` flow fires instead.
    pub async fn pop(
        &self,
        user_id: &str,
        expected_uid: &str,
        directive: Option<TriggerDirective>,
        ctx: &TriggerContext,
    ) -> Result<Option<RealizedScreen>, EngineError> {
        match self.queue.pop_front(user_id, expected_uid).await? {
            PopResult::Removed(entry) => {
                if let Some(directive) = directive {
                    let allowed = directive.slug == slugs::SKIP
                        || entry.screen.allowed_triggers.contains(&directive.slug);
                    if allowed {
                        // Client-originated: never verified.
                        self.trigger(
                            user_id,
                            &directive.slug,
                            directive.client_parameters,
                            empty_object(),
                            ctx,
                            false,
                        )
                        .await?;
                    } else {
                        warn!(
                            user = user_id,
                            screen = %entry.screen_slug,
                            slug = %directive.slug,
                            "trigger outside allowed_triggers"
                        );
                        self.trigger_system(user_id, slugs::FORBIDDEN, ctx).await?;
                    }
                }
            }
            PopResult::Desync { head_uid } => {
                warn!(
                    user = user_id,
                    expected = expected_uid,
                    actual = %head_uid,
                    "pop desync"
                );
                self.trigger_system(user_id, slugs::DESYNC, ctx).await?;
            }
            PopResult::Empty => {
                // Nothing to remove; the peek below handles `empty`.
            }
        }
        self.peek(user_id, ctx).await
    }

    /// Record a client-supplied debug event tied to a realized screen.
    /// Logged only; never behavior-affecting.
    pub fn trace(&self, user_id: &str, screen_uid: &str, event: &Value) {
        info!(user = user_id, screen = screen_uid, event = %event, "client trace");
    }

    /// Trigger a system flow with empty, verified parameters.
    async fn trigger_system(
        &self,
        user_id: &str,
        slug: &str,
        ctx: &TriggerContext,
    ) -> Result<TriggerOutcome, EngineError> {
        self.trigger(user_id, slug, empty_object(), empty_object(), ctx, true)
            .await
    }

    /// Remove a known head without surfacing desync races: if another
    /// request moved the head first, the caller's loop re-peeks anyway.
    async fn drop_head(&self, user_id: &str, uid: &str) -> Result<(), EngineError> {
        if let PopResult::Desync { .. } = self.queue.pop_front(user_id, uid).await? {
            debug!(user = user_id, uid = %uid, "head moved before internal drop");
        }
        Ok(())
    }

    /// Whether any screen's substitutions would write a field the
    /// screen schema declares as a trusted reference. Screens whose
    /// definition is missing are ignored — they drop at build time.
    async fn has_unsafe_outputs(&self, flow: &ClientFlow) -> Result<bool, EngineError> {
        for screen_def in &flow.screens {
            let Some(screen) = self.screens.get_screen(&screen_def.slug).await? else {
                continue;
            };
            for sub in &screen_def.variable {
                if schema::writes_custom_format(&screen.schema, sub.output_path()) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

/// Fresh `(slug, client, server, verified)` for a system redirect.
fn redirect(slug: &str) -> (String, Value, Value, bool) {
    (slug.to_string(), empty_object(), empty_object(), true)
}
