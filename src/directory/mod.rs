use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::courier::{COURIER_ROLE, Courier, Customer, GeoPoint};

/// The user-management collaborator, seen from the dispatch side: read-only
/// queries over courier and customer records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Couriers matching `role` and `is_online` by equality.
    async fn find_couriers(&self, role: &str, is_online: bool) -> Result<Vec<Courier>, AppError>;

    async fn find_courier(&self, id: Uuid) -> Result<Option<Courier>, AppError>;

    async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, AppError>;
}

#[derive(Default)]
pub struct MemoryUserDirectory {
    couriers: DashMap<Uuid, Courier>,
    customers: DashMap<Uuid, Customer>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_courier(&self, courier: Courier) -> Courier {
        self.couriers.insert(courier.id, courier.clone());
        courier
    }

    pub fn upsert_customer(&self, customer: Customer) -> Customer {
        self.customers.insert(customer.id, customer.clone());
        customer
    }

    pub fn couriers(&self) -> Vec<Courier> {
        self.couriers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn courier_count(&self) -> usize {
        self.couriers.len()
    }

    pub fn set_online(&self, id: Uuid, is_online: bool) -> Result<Courier, AppError> {
        let mut courier = self
            .couriers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("courier {id} not found")))?;

        courier.is_online = is_online;
        courier.updated_at = Utc::now();

        Ok(courier.clone())
    }

    pub fn set_location(&self, id: Uuid, location: GeoPoint) -> Result<Courier, AppError> {
        let mut courier = self
            .couriers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("courier {id} not found")))?;

        courier.location = Some(location);
        courier.updated_at = Utc::now();

        Ok(courier.clone())
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_couriers(&self, role: &str, is_online: bool) -> Result<Vec<Courier>, AppError> {
        Ok(self
            .couriers
            .iter()
            .filter(|entry| entry.role == role && entry.is_online == is_online)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn find_courier(&self, id: Uuid) -> Result<Option<Courier>, AppError> {
        Ok(self
            .couriers
            .get(&id)
            .filter(|entry| entry.role == COURIER_ROLE)
            .map(|entry| entry.value().clone()))
    }

    async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, AppError> {
        Ok(self.customers.get(&id).map(|entry| entry.value().clone()))
    }
}
