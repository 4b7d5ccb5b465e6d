//! Factory seam for starting a child's run loop.

use std::sync::Arc;

use async_trait::async_trait;
use subagentlaw_core::traits::{ChildRunConfig, RunLoop};
use subagentlaw_permissions::Arbiter;

/// Constructs a fresh [`RunLoop`] for a spawned child, handed the arbiter
/// the supervisor built for this child's permission mode so every tool call
/// the loop makes is gated the same way a foreground call would be. The
/// concrete LLM client and generic turn loop live entirely behind this seam.
#[async_trait]
pub trait RunLoopFactory: Send + Sync {
    async fn start(&self, config: ChildRunConfig, arbiter: Arc<Arbiter>) -> Box<dyn RunLoop>;
}
