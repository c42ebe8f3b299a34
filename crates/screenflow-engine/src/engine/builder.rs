//! Fluent construction of an [`Engine`].
//!
//! Every component has an in-process default, so `Engine::builder()
//! .build().await` yields a fully working engine for tests and local
//! development. `build()` also seeds the system flows and the fallback
//! screen into the stores when they are absent, so every error
//! redirect has somewhere to land.

use std::sync::Arc;

use tracing::debug;

use crate::defaults::{
    HmacJwtIssuer, InMemoryFlowStore, InMemoryQueue, InMemoryScreenStore, StaticResources,
};
use crate::engine::{Engine, EngineConfig};
use crate::errors::EngineError;
use crate::realize::ScreenRealizer;
use crate::system::{self, slugs, FALLBACK_SCREEN_SLUG};
use crate::traits::{FlowStore, JwtIssuer, QueueStore, ResourceResolver, ScreenStore};

#[derive(Default)]
pub struct EngineBuilder {
    flows: Option<Arc<dyn FlowStore>>,
    screens: Option<Arc<dyn ScreenStore>>,
    queue: Option<Arc<dyn QueueStore>>,
    resources: Option<Arc<dyn ResourceResolver>>,
    jwt: Option<Arc<dyn JwtIssuer>>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flow_store(mut self, flows: Arc<dyn FlowStore>) -> Self {
        self.flows = Some(flows);
        self
    }

    pub fn screen_store(mut self, screens: Arc<dyn ScreenStore>) -> Self {
        self.screens = Some(screens);
        self
    }

    pub fn queue_store(mut self, queue: Arc<dyn QueueStore>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn resource_resolver(mut self, resources: Arc<dyn ResourceResolver>) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn jwt_issuer(mut self, jwt: Arc<dyn JwtIssuer>) -> Self {
        self.jwt = Some(jwt);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_replace_depth(mut self, depth: usize) -> Self {
        self.config.max_replace_depth = depth;
        self
    }

    pub fn max_peek_iterations(mut self, iterations: usize) -> Self {
        self.config.max_peek_iterations = iterations;
        self
    }

    pub fn validate_schemas(mut self, validate: bool) -> Self {
        self.config.validate_schemas = validate;
        self
    }

    pub fn jwt_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.config.jwt_ttl = ttl;
        self
    }

    /// Assemble the engine, filling unset components with in-process
    /// defaults and seeding the system flows and fallback screen.
    pub async fn build(self) -> Result<Engine, EngineError> {
        let flows = self
            .flows
            .unwrap_or_else(|| Arc::new(InMemoryFlowStore::new()));
        let screens = self
            .screens
            .unwrap_or_else(|| Arc::new(InMemoryScreenStore::new()));
        let queue = self
            .queue
            .unwrap_or_else(|| Arc::new(InMemoryQueue::new()));
        let resources = self
            .resources
            .unwrap_or_else(|| Arc::new(StaticResources::new()));
        let jwt = self.jwt.unwrap_or_else(|| {
            // Per-process random secret: fine for tests, references
            // won't verify across restarts.
            let secret = uuid::Uuid::new_v4();
            Arc::new(HmacJwtIssuer::new(secret.as_bytes(), "screenflow"))
        });

        if screens.get_screen(FALLBACK_SCREEN_SLUG).await?.is_none() {
            debug!(slug = FALLBACK_SCREEN_SLUG, "seeding fallback screen");
            screens.put_screen(&system::fallback_screen()).await?;
        }
        for slug in slugs::ALL {
            if flows.get_flow(slug).await?.is_none() {
                let flow =
                    system::system_flow(slug).ok_or_else(|| EngineError::MissingSystemFlow {
                        slug: slug.to_string(),
                    })?;
                debug!(slug, "seeding system flow");
                flows.put_flow(&flow).await?;
            }
        }

        let realizer = ScreenRealizer::new(
            Arc::clone(&screens),
            Arc::clone(&resources),
            jwt,
            self.config.validate_schemas,
            self.config.jwt_ttl,
        );

        Ok(Engine {
            flows,
            screens,
            queue,
            resources,
            realizer,
            config: self.config,
        })
    }
}
