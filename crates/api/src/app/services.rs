use std::sync::Arc;

use tree_core::ContainerId;
use tree_infra::config::{AppConfig, StoreBackend};
use tree_infra::fixture::{Fixture, FixtureSummary};
use tree_infra::move_service::{MoveError, MoveReport, MoveService};
use tree_infra::store::{InMemoryDocumentStore, PostgresDocumentStore};
use tree_inventory::{Container, InventoryItem};

type InMemoryMover = MoveService<InMemoryDocumentStore>;
type PersistentMover = MoveService<PostgresDocumentStore>;

#[derive(Clone)]
pub enum AppServices {
    InMemory {
        mover: Arc<InMemoryMover>,
        fixture_child_containers: usize,
    },
    Persistent {
        mover: Arc<PersistentMover>,
        fixture_child_containers: usize,
    },
}

/// Run the same expression against whichever mover backs the services.
macro_rules! with_mover {
    ($services:expr, |$mover:ident| $body:expr) => {
        match $services {
            AppServices::InMemory { mover: $mover, .. } => $body,
            AppServices::Persistent { mover: $mover, .. } => $body,
        }
    };
}

/// Wire the store selected by `config` and load the fixture into it.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, MoveError> {
    let services = match &config.store {
        StoreBackend::InMemory => {
            tracing::info!("using in-memory document store");
            AppServices::InMemory {
                mover: Arc::new(MoveService::new(InMemoryDocumentStore::new())),
                fixture_child_containers: config.fixture_child_containers,
            }
        }
        StoreBackend::Postgres { database_url } => {
            tracing::info!("using postgres document store");
            let store = PostgresDocumentStore::connect(database_url).await?;
            AppServices::Persistent {
                mover: Arc::new(MoveService::new(store)),
                fixture_child_containers: config.fixture_child_containers,
            }
        }
    };

    services.reset_fixture().await?;
    Ok(services)
}

impl AppServices {
    fn fixture(&self) -> Fixture {
        match self {
            AppServices::InMemory {
                fixture_child_containers,
                ..
            }
            | AppServices::Persistent {
                fixture_child_containers,
                ..
            } => Fixture::canonical(*fixture_child_containers),
        }
    }

    pub async fn reset_fixture(&self) -> Result<FixtureSummary, MoveError> {
        let fixture = self.fixture();
        with_mover!(self, |mover| mover.reset_fixture(&fixture).await)
    }

    pub async fn move_fixture_subtree(&self) -> Result<MoveReport, MoveError> {
        with_mover!(self, |mover| mover.move_fixture_subtree().await)
    }

    pub async fn move_subtree(
        &self,
        source: &ContainerId,
        destination: &ContainerId,
    ) -> Result<MoveReport, MoveError> {
        with_mover!(self, |mover| mover.move_subtree(source, destination).await)
    }

    pub async fn container(&self, id: &ContainerId) -> Result<Option<Container>, MoveError> {
        with_mover!(self, |mover| mover.container(id).await)
    }

    pub async fn items_under(&self, id: &ContainerId) -> Result<Vec<InventoryItem>, MoveError> {
        with_mover!(self, |mover| mover.items_under(id).await)
    }
}
