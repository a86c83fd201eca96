use std::{sync::Arc, time::Duration};

use crate::{
    ContextConfig, Result,
    model::Workflow,
    runtime::Context,
    snapshot::{CodecKind, ContextSnapshot},
};

pub struct ContextBuilder {
    workflow: Arc<dyn Workflow>,
    config: ContextConfig,
}

impl ContextBuilder {
    pub fn new(workflow: Arc<dyn Workflow>) -> Self {
        Self {
            workflow,
            config: ContextConfig::default(),
        }
    }

    pub fn config(
        mut self,
        config: ContextConfig,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn stepwise(
        mut self,
        stepwise: bool,
    ) -> Self {
        self.config.stepwise = stepwise;
        self
    }

    /// Sub-millisecond timeouts round up to one millisecond, a zero timeout
    /// is rejected by [`ContextBuilder::build`].
    pub fn wait_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.wait_timeout_ms = u64::try_from(timeout.as_micros().div_ceil(1000)).unwrap_or(u64::MAX);
        self
    }

    pub fn codec(
        mut self,
        codec: CodecKind,
    ) -> Self {
        self.config.codec = codec;
        self
    }

    /// Build a fresh context, failing on an invalid config.
    pub fn build(&self) -> Result<Context> {
        self.config.validate()?;
        Ok(Context::with_parts(self.workflow.clone(), self.config.stepwise, self.config.wait_timeout(), uuid::Uuid::new_v4().to_string()))
    }

    /// Take a snapshot of `ctx` with the configured codec.
    pub async fn snapshot(
        &self,
        ctx: &Context,
    ) -> Result<ContextSnapshot> {
        ctx.snapshot(self.config.codec.codec().as_ref()).await
    }

    /// Restore a context from `snapshot` with the configured codec and timeout.
    /// The `stepwise` flag always comes from the snapshot.
    pub fn restore(
        &self,
        snapshot: &ContextSnapshot,
    ) -> Result<Context> {
        self.config.validate()?;
        Context::restore_with(self.workflow.clone(), snapshot, self.config.codec.codec().as_ref(), self.config.wait_timeout())
    }
}
