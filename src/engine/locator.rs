use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::directory::UserDirectory;
use crate::error::AppError;
use crate::models::courier::{COURIER_ROLE, Candidate};

/// Pulls the online courier pool and keeps the ones that can be offered a job.
pub struct CourierLocator {
    directory: Arc<dyn UserDirectory>,
}

impl CourierLocator {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Eligible couriers, minus `exclude`. An empty pool is a normal answer;
    /// only a failing directory query is an error.
    pub async fn locate(&self, exclude: &BTreeSet<Uuid>) -> Result<Vec<Candidate>, AppError> {
        let couriers = self.directory.find_couriers(COURIER_ROLE, true).await?;
        let pool_size = couriers.len();

        let candidates: Vec<Candidate> = couriers
            .iter()
            .filter(|courier| !exclude.contains(&courier.id))
            .filter_map(Candidate::from_courier)
            .collect();

        debug!(
            pool_size,
            eligible = candidates.len(),
            excluded = exclude.len(),
            "courier pool filtered"
        );

        Ok(candidates)
    }
}
