pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::{DeliveryOrder, OrderPatch, OrderStatus};

pub use memory::MemoryOrderStore;

/// Result of a compare-and-set acceptance write.
#[derive(Debug, Clone)]
pub enum AssignOutcome {
    Assigned(DeliveryOrder),
    AlreadyAssigned { courier_id: Uuid },
    NotAcceptable { status: OrderStatus },
}

/// The order record collaborator.
///
/// Every successful write publishes an `OrderEvent`. The conditional methods
/// must evaluate their precondition and apply their change atomically, the
/// way a datastore's conditional update would.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: DeliveryOrder) -> Result<DeliveryOrder, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<DeliveryOrder>, AppError>;

    /// Orders still in `PLACED`, for the retry sweep.
    async fn placed_orders(&self) -> Result<Vec<DeliveryOrder>, AppError>;

    async fn apply(&self, id: Uuid, patch: OrderPatch) -> Result<DeliveryOrder, AppError>;

    /// Marks the first dispatch attempt. Succeeds only while the order is
    /// searching, has never been dispatched and has notified nobody.
    async fn begin_search(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<DeliveryOrder>, AppError>;

    /// Gives back a `begin_search` claim that notified nobody, so a
    /// redelivered creation event can dispatch again. Returns `false` when
    /// the claim has moved on.
    async fn release_search(&self, id: Uuid, observed: DateTime<Utc>) -> Result<bool, AppError>;

    /// Claims one retry cycle. Succeeds only while the order is searching and
    /// `search_started_at` still equals `observed`; refreshes it to `now` and
    /// bumps `retry_count`.
    async fn claim_retry(
        &self,
        id: Uuid,
        observed: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<DeliveryOrder>, AppError>;

    /// Adds `couriers` to the notified set while the order is still
    /// searching, and returns the current record either way. Callers must not
    /// send anything when the returned order is no longer searching.
    async fn offer(&self, id: Uuid, couriers: Vec<Uuid>) -> Result<DeliveryOrder, AppError>;

    /// Sets the assigned courier if and only if nobody holds the order yet.
    async fn compare_and_assign(
        &self,
        id: Uuid,
        courier_id: Uuid,
        courier_name: &str,
        now: DateTime<Utc>,
    ) -> Result<AssignOutcome, AppError>;
}
