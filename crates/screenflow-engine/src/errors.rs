//! Error types for all trait operations and the engine surface.

use thiserror::Error;

/// Errors from [`FlowStore`](crate::traits::FlowStore).
#[derive(Debug, Error)]
pub enum FlowStoreError {
    #[error("flow not found: {slug}")]
    NotFound { slug: String },
    #[error("flow store error: {message}")]
    Store { message: String },
}

/// Errors from [`ScreenStore`](crate::traits::ScreenStore).
#[derive(Debug, Error)]
pub enum ScreenStoreError {
    #[error("screen store error: {message}")]
    Store { message: String },
}

/// Errors from [`QueueStore`](crate::traits::QueueStore).
#[derive(Debug, Error)]
pub enum QueueStoreError {
    #[error("queue store error: {message}")]
    Store { message: String },
}

/// Errors from [`ResourceResolver`](crate::traits::ResourceResolver).
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("resolver error: {message}")]
    Resolver { message: String },
}

/// Errors from [`JwtIssuer`](crate::traits::JwtIssuer).
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("jwt issuance failed: {message}")]
    Issue { message: String },
}

/// Errors from the persisted-screens blob codec.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("compression failed: {message}")]
    Compress { message: String },
    #[error("decompression failed: {message}")]
    Decompress { message: String },
    #[error("base85 decode failed: {message}")]
    Decode { message: String },
    #[error("serialization failed: {message}")]
    Serde { message: String },
}

/// Errors from parameter resolution.
///
/// Inside the engine these redirect to system flows (`error_screen_schema`,
/// `error_unsafe`) rather than surfacing to callers; they are public for
/// direct users of [`params`](crate::params).
#[derive(Debug, Error)]
pub enum ParamError {
    #[error("missing parameter at {path}")]
    MissingParameter { path: String },
    #[error("extraction from non-trusted input at {path}")]
    UnsafeExtraction { path: String },
    #[error("malformed format string: {message}")]
    Format { message: String },
}

/// Transport-level engine failures. Everything representable as a system
/// flow is redirected instead and never reaches this type.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    FlowStore(#[from] FlowStoreError),
    #[error(transparent)]
    ScreenStore(#[from] ScreenStoreError),
    #[error(transparent)]
    QueueStore(#[from] QueueStoreError),
    #[error(transparent)]
    Resolver(#[from] ResolverError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    /// A hard-coded system flow is absent and could not be seeded.
    #[error("system flow missing: {slug}")]
    MissingSystemFlow { slug: String },
    /// Replace-chain recursion exceeded the configured cap and the
    /// fail-closed redirect also failed.
    #[error("flow replacement chain exceeded depth {depth}")]
    ReplaceDepthExceeded { depth: usize },
    /// The peek/skip loop did not converge within its budget.
    #[error("peek loop exhausted after {iterations} iterations")]
    PeekLoopExhausted { iterations: usize },
}
