// This file is part of Hopper.
//
// Hopper is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Hopper is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Hopper.
// If not, see https://www.gnu.org/licenses/.

//! Standard interfaces for extending the client and bundler with middleware.
//!
//! Validation and transformation logic is supplied as ordered stages over a
//! shared mutable context rather than hard-coded into the client or bundler.
//! Batch stages run during a bundler iteration; user op stages run during
//! client admission.

mod context;
pub use context::{BatchHandlerContext, UserOpHandlerContext};

pub mod batch;
pub mod checks;
pub mod entities;
pub mod expire;
pub mod relay;
pub mod simulation;

use async_trait::async_trait;
use hopper_types::MempoolResult;

/// One stage of the per-batch pipeline. Stages may freely mutate the shared
/// context: reassign the batch, move operations to pending removal, or write
/// to the data bag.
#[async_trait]
pub trait BatchHandler: Send + Sync + 'static {
    /// Process the batch context.
    async fn handle(&self, ctx: &mut BatchHandlerContext) -> anyhow::Result<()>;
}

/// One stage of the per-operation pipeline. Stages may replace the candidate
/// operation wholesale but must not mutate the caller's original value.
#[async_trait]
pub trait UserOpHandler: Send + Sync + 'static {
    /// Process the operation context.
    async fn handle(&self, ctx: &mut UserOpHandlerContext) -> MempoolResult<()>;
}

/// A batch stage failure, annotated with the ordinal of the failing stage.
#[derive(Debug, thiserror::Error)]
#[error("batch handler {index} failed: {source}")]
pub struct BatchHandlerError {
    /// Position of the failing stage in the composed pipeline
    pub index: usize,
    /// The stage's error
    #[source]
    pub source: anyhow::Error,
}

/// An ordered composition of batch stages. The empty pipeline is the no-op
/// default, so a bundler with zero configured modules is still well-defined.
#[derive(Default)]
pub struct BatchPipeline {
    handlers: Vec<Box<dyn BatchHandler>>,
}

impl BatchPipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn with(mut self, handler: impl BatchHandler) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Run each stage in order. The first failure short-circuits the rest;
    /// the batch is considered unprocessed, though context mutations made by
    /// earlier stages and the failing stage remain.
    pub async fn run(&self, ctx: &mut BatchHandlerContext) -> Result<(), BatchHandlerError> {
        for (index, handler) in self.handlers.iter().enumerate() {
            handler
                .handle(ctx)
                .await
                .map_err(|source| BatchHandlerError { index, source })?;
        }
        Ok(())
    }
}

#[async_trait]
impl BatchHandler for BatchPipeline {
    async fn handle(&self, ctx: &mut BatchHandlerContext) -> anyhow::Result<()> {
        self.run(ctx).await.map_err(Into::into)
    }
}

/// An ordered composition of per-operation stages. The first failure
/// short-circuits the rest and is returned as-is.
#[derive(Default)]
pub struct UserOpPipeline {
    handlers: Vec<Box<dyn UserOpHandler>>,
}

impl UserOpPipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn with(mut self, handler: impl UserOpHandler) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Run each stage in order, stopping at the first rejection.
    pub async fn run(&self, ctx: &mut UserOpHandlerContext) -> MempoolResult<()> {
        for handler in &self.handlers {
            handler.handle(ctx).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl UserOpHandler for UserOpPipeline {
    async fn handle(&self, ctx: &mut UserOpHandlerContext) -> MempoolResult<()> {
        self.run(ctx).await
    }
}

/// Batch stage that performs no work and succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBatchHandler;

#[async_trait]
impl BatchHandler for NoopBatchHandler {
    async fn handle(&self, _ctx: &mut BatchHandlerContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Per-operation stage that performs no work and succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUserOpHandler;

#[async_trait]
impl UserOpHandler for NoopUserOpHandler {
    async fn handle(&self, _ctx: &mut UserOpHandlerContext) -> MempoolResult<()> {
        Ok(())
    }
}
