//! Runtime wiring: which ledger store and auth service back the router.

use std::sync::Arc;

use anyhow::Context;

use loyalty_auth::AuthService;
use loyalty_infra::{db, external::HttpAuthService, InMemoryLedgerStore, LedgerService, LedgerStore, PostgresLedgerStore};

use crate::config::AppConfig;

pub struct AppServices {
    pub ledger: LedgerService,
    pub auth: Arc<dyn AuthService>,
}

impl AppServices {
    pub fn new(store: Arc<dyn LedgerStore>, auth: Arc<dyn AuthService>) -> Self {
        Self {
            ledger: LedgerService::new(store),
            auth,
        }
    }
}

/// Production wiring: Postgres when `DATABASE_URL` is set, otherwise the
/// in-memory store; tokens checked by the remote auth service.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn LedgerStore> = match &config.database_url {
        Some(url) => {
            let pool = db::connect(url, config.database_max_connections)
                .await
                .context("failed to connect to the database")?;
            db::apply_schema(&pool)
                .await
                .context("failed to apply the ledger schema")?;
            tracing::info!(max_connections = config.database_max_connections, "using postgres ledger store");
            Arc::new(PostgresLedgerStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory ledger store (data is lost on restart)");
            Arc::new(InMemoryLedgerStore::new())
        }
    };

    let auth = HttpAuthService::new(config.auth_service_url.clone(), config.auth_service_timeout)
        .context("failed to build the auth service client")?;
    tracing::info!(url = %auth.url(), "using remote auth service");

    Ok(AppServices::new(store, Arc::new(auth)))
}
