use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_http::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::logger::*;
use crate::server::*;
use crate::settings::*;
use nanoid::nanoid;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{MySql, Pool};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Wired application: the services the HTTP layer calls plus the background
/// user event listener.
pub struct Server {
    pub relationship_service: Arc<dyn RelationshipService>,
    pub token_verifier: Arc<dyn TokenVerifier>,
    pub request_timeout: Duration,
    listener_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pool: Option<Pool<MySql>>,
}

type StoreParts = (Arc<dyn RelationStore>, Arc<dyn TxManager>, Option<Pool<MySql>>);

async fn open_store(settings: &Store) -> anyhow::Result<StoreParts> {
    match settings.backend {
        StoreBackend::Mysql => {
            let pool = MySqlPoolOptions::new()
                .max_connections(settings.max_connections)
                .connect(&settings.mysql_dsn)
                .await?;
            let store = MySqlRelationStore::new(pool.clone());
            store.ensure_schema().await?;

            let relation_store: Arc<dyn RelationStore> = Arc::new(store);
            let tx_manager: Arc<dyn TxManager> = Arc::new(MySqlTxManager::new(pool.clone()));
            Ok((relation_store, tx_manager, Some(pool)))
        }
        StoreBackend::Memory => {
            warn!("using in-memory relation store; state is lost on exit");
            let store = MemoryRelationStore::new();
            let relation_store: Arc<dyn RelationStore> = Arc::new(store.clone());
            let tx_manager: Arc<dyn TxManager> = Arc::new(store);
            Ok((relation_store, tx_manager, None))
        }
    }
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let alphabet: [char; 16] = [
            '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f',
        ];
        let run_id = nanoid!(10, &alphabet);

        let (relation_store, tx_manager, pool) = open_store(&settings.store).await?;

        let profile_lookup: Arc<dyn ProfileLookup> = match settings.users.backend {
            UsersBackend::Http => Arc::new(HttpProfileLookup::new(
                &settings.users.base_url,
                settings.users.timeout(),
            )?),
            UsersBackend::Memory => Arc::new(MemoryProfileLookup::with_profiles(
                settings
                    .users
                    .profiles
                    .iter()
                    .map(|(id, name)| (id.as_str(), name.as_str())),
            )),
        };

        let token_verifier: Arc<dyn TokenVerifier> = Arc::new(JwtTokenVerifier::new(&JwtConfig {
            issuer: settings.auth.issuer.clone(),
            audience: settings.auth.audience.clone(),
            signing_key: settings.auth.signing_key.clone().into_bytes(),
        }));

        let relationship_service: Arc<dyn RelationshipService> = Arc::new(
            RealRelationshipService::new(relation_store.clone(), tx_manager, profile_lookup),
        );

        // region runtime infra
        let cancel = CancellationToken::new();

        let listener_handle = match settings.events.backend {
            EventsBackend::Kafka => {
                let source: Arc<dyn EventSource> = Arc::new(
                    KafkaEventSource::connect(&KafkaSourceConfig {
                        bootstrap_server: &settings.events.bootstrap_server,
                        client_id: &format!("friendgraph-sub-{}", run_id),
                        group_id: &settings.events.group_id,
                        topic: &settings.events.topic,
                    })
                    .await?,
                );
                let handler: Arc<dyn EventHandler> = Arc::new(UserEventsHandler::new(
                    relation_store,
                    settings.events.timeout(),
                ));
                let listener = UserEventListener::new(source, handler, cancel.clone());
                Some(tokio::spawn(async move { listener.run().await }))
            }
            EventsBackend::None => {
                info!("user event listener disabled");
                None
            }
        };

        // endregion

        info!(run_id = %run_id, "server started");

        Ok(Self {
            relationship_service,
            token_verifier,
            request_timeout: settings.http.request_timeout(),
            listener_handle: Mutex::new(listener_handle),
            cancel,
            pool,
        })
    }

    /// Server without background tasks, around already-built services.
    pub fn for_services(
        relationship_service: Arc<dyn RelationshipService>,
        token_verifier: Arc<dyn TokenVerifier>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            relationship_service,
            token_verifier,
            request_timeout,
            listener_handle: Mutex::new(None),
            cancel: CancellationToken::new(),
            pool: None,
        }
    }

    /// Per-request context: the configured timeout, cancelled on shutdown.
    pub fn request_context(&self) -> CallContext {
        CallContext::with_timeout(self.request_timeout).with_cancel(self.cancel.child_token())
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = self.listener_handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            let r = handle.await;
            info!("listener handle dropped: {:?}", r);
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
