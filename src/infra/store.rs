//! Record store selection.

use std::sync::Arc;

use tracing::info;

use crate::application::repos::{AdsRepo, StoreHealth, UsersRepo};
use crate::config::{DatabaseSettings, StoreBackendKind};

use super::db::PostgresRepositories;
use super::error::InfraError;
use super::memory::InMemoryRepositories;

/// The configured record store, chosen once at startup.
#[derive(Clone)]
pub enum RecordStore {
    Postgres(Arc<PostgresRepositories>),
    Memory(Arc<InMemoryRepositories>),
}

impl RecordStore {
    pub async fn open(settings: &DatabaseSettings) -> Result<Self, InfraError> {
        match settings.backend {
            StoreBackendKind::Memory => {
                info!(target = "listings::store", backend = "memory", "Record store ready");
                Ok(Self::Memory(Arc::new(InMemoryRepositories::new())))
            }
            StoreBackendKind::Postgres => {
                let url = settings
                    .require_url()
                    .map_err(|err| InfraError::configuration(err.to_string()))?;
                let pool = PostgresRepositories::connect(
                    url,
                    settings.max_connections.get(),
                    settings.acquire_timeout,
                )
                .await
                .map_err(|err| InfraError::database(err.to_string()))?;

                PostgresRepositories::run_migrations(&pool)
                    .await
                    .map_err(|err| InfraError::database(err.to_string()))?;

                info!(target = "listings::store", backend = "postgres", "Record store ready");
                Ok(Self::Postgres(Arc::new(PostgresRepositories::new(pool))))
            }
        }
    }

    pub fn ads(&self) -> Arc<dyn AdsRepo> {
        match self {
            Self::Postgres(repo) => repo.clone(),
            Self::Memory(repo) => repo.clone(),
        }
    }

    pub fn users(&self) -> Arc<dyn UsersRepo> {
        match self {
            Self::Postgres(repo) => repo.clone(),
            Self::Memory(repo) => repo.clone(),
        }
    }

    pub fn health(&self) -> Arc<dyn StoreHealth> {
        match self {
            Self::Postgres(repo) => repo.clone(),
            Self::Memory(repo) => repo.clone(),
        }
    }

    pub async fn close(&self) {
        if let Self::Postgres(repo) = self {
            repo.close().await;
        }
    }
}
