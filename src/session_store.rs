//! Session store (§6) — persistence of memory logs, plan, and offload
//! table is explicitly out of this core's scope (§1 Non-goals); this
//! trait is the boundary an application wires a concrete store behind,
//! grounded in the same external-collaborator pattern as `Model`/`Tool`.

use crate::message::Message;
use crate::plan::Plan;
use async_trait::async_trait;
use std::error::Error;

/// A snapshot of everything a session needs to resume: the working log,
/// the original log, and the plan if one was attached. The offload table
/// is intentionally excluded from this trait's contract — the spec leaves
/// offload durability undefined (§9 Design Notes), so a `SessionStore`
/// implementation that wants it must reach into its own concrete memory
/// type rather than relying on this trait.
pub struct SessionSnapshot {
    pub working: Vec<Message>,
    pub original: Vec<Message>,
    pub plan: Option<Plan>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, id: &str, snapshot: &SessionSnapshot) -> Result<(), Box<dyn Error + Send + Sync>>;

    async fn load(&self, id: &str) -> Result<Option<SessionSnapshot>, Box<dyn Error + Send + Sync>>;
}
