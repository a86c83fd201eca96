//! # Stepflow
//!
//! Stepflow is the run context of a step-based, event-driven workflow engine.
//! One [`Context`] is shared by every concurrently running step of a single
//! workflow invocation.
//!
//! ## Core Features
//!
//! - **Shared Store**: a lock-guarded key/value map for cross-step state
//! - **Event Broker**: per-step inbound queues, a waiter queue and an append-only broker log
//! - **Wait-For-Event**: timeout-bounded, type and field filtered reads from the waiter queue
//! - **Join Collector**: release a batch only once every required event type has arrived
//! - **Snapshot / Restore**: freeze a run into a portable record and resume it later,
//!   replaying in-flight events ahead of queued ones
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stepflow::{Context, Event, JsonCodec, WorkflowModel};
//!
//! let workflow = WorkflowModel::from_json(json_str)?;
//! let ctx = Arc::new(Context::new(Arc::new(workflow), false));
//!
//! ctx.set("attempts", 3).await?;
//! ctx.send(Event::empty("start"), Some("prepare"))?;
//!
//! let snapshot = ctx.snapshot(&JsonCodec).await?;
//! let resumed = Context::restore(ctx.workflow(), &snapshot, &JsonCodec)?;
//! ```

mod builder;
mod common;
mod config;
mod error;
mod events;
mod model;
mod runtime;
mod snapshot;

pub use builder::ContextBuilder;
pub use common::{Queue, Signal, Vars};
pub use config::ContextConfig;
pub use error::StepflowError;
pub use events::{Event, EventType, StreamItem, TypedEvent};
pub use model::*;
pub use runtime::{Context, DEFAULT_WAIT_TIMEOUT, StepGate};
pub use snapshot::{Base64Codec, CodecKind, ContextSnapshot, EventCodec, JsonCodec};

/// Result type alias for Stepflow operations.
pub type Result<T> = std::result::Result<T, StepflowError>;
