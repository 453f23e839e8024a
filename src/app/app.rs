
use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::app_conf::{AppConfig, StorageBackend};
use crate::config::collections_conf::CollectionConfig;
use crate::config::identifier_conf::IdentifierConfig;
use crate::config::mongo_conf::MongoConfig;
use crate::handler::draft_handler::DraftHandlerState;
use crate::repository::activity_log_repo::{ActivityLogRepository, InMemoryActivityLogRepository, MongoActivityLogRepository};
use crate::repository::client_repo::{ClientRepository, InMemoryClientRepository, MongoClientRepository};
use crate::repository::counter_repo::{CounterRepository, InMemoryCounterRepository, MongoCounterRepository};
use crate::repository::draft_request_repo::{DraftRequestRepository, InMemoryDraftRequestRepository, MongoDraftRequestRepository};
use crate::repository::inquiry_repo::{InMemoryInquiryRepository, InquiryRepository, MongoInquiryRepository};
use crate::repository::project_repo::{InMemoryProjectRepository, MongoProjectRepository, ProjectRepository};
use crate::repository::quotation_thread_repo::{InMemoryQuotationThreadRepository, MongoQuotationThreadRepository, QuotationThreadRepository};
use crate::router::activity_router::activity_router;
use crate::router::draft_router::draft_router;
use crate::router::quotation_router::quotation_router;
use crate::service::activity_logger::{ActivityLogService, ActivityLogServiceImpl};
use crate::service::approval_service::{ApprovalService, ApprovalServiceImpl};
use crate::service::draft_service::{DraftEvents, DraftService, DraftServiceImpl};
use crate::service::id_allocator::{IdentifierAllocator, SequentialIdAllocator};
use crate::service::quotation_service::{QuotationService, QuotationServiceImpl};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Every repository the services need, behind trait objects
pub struct Repositories {
    pub inquiries: Arc<dyn InquiryRepository>,
    pub drafts: Arc<dyn DraftRequestRepository>,
    pub clients: Arc<dyn ClientRepository>,
    pub projects: Arc<dyn ProjectRepository>,
    pub counters: Arc<dyn CounterRepository>,
    pub threads: Arc<dyn QuotationThreadRepository>,
    pub activity_logs: Arc<dyn ActivityLogRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Repositories {
            inquiries: Arc::new(InMemoryInquiryRepository::new()),
            drafts: Arc::new(InMemoryDraftRequestRepository::new()),
            clients: Arc::new(InMemoryClientRepository::new()),
            projects: Arc::new(InMemoryProjectRepository::new()),
            counters: Arc::new(InMemoryCounterRepository::new()),
            threads: Arc::new(InMemoryQuotationThreadRepository::new()),
            activity_logs: Arc::new(InMemoryActivityLogRepository::new()),
        }
    }

    pub async fn mongo(
        mongo_config: &MongoConfig,
        collections: &CollectionConfig,
    ) -> Result<Self, BoxError> {
        let db = crate::repository::connect(mongo_config).await?;

        let clients = MongoClientRepository::new(&db, &collections.clients);
        clients.ensure_indexes().await?;
        let projects = MongoProjectRepository::new(&db, &collections.projects);
        projects.ensure_indexes().await?;

        Ok(Repositories {
            inquiries: Arc::new(MongoInquiryRepository::new(&db, &collections.inquiries)),
            drafts: Arc::new(MongoDraftRequestRepository::new(
                &db,
                &collections.client_requests,
                &collections.project_requests,
            )),
            clients: Arc::new(clients),
            projects: Arc::new(projects),
            counters: Arc::new(MongoCounterRepository::new(&db, &collections.counters)),
            threads: Arc::new(MongoQuotationThreadRepository::new(&db, &collections.quotation_threads)),
            activity_logs: Arc::new(MongoActivityLogRepository::new(&db, &collections.activity_logs)),
        })
    }
}

/// The wired service layer
#[derive(Clone)]
pub struct Services {
    pub drafts: Arc<dyn DraftService>,
    pub approvals: Arc<dyn ApprovalService>,
    pub quotations: Arc<dyn QuotationService>,
    pub activity: Arc<dyn ActivityLogService>,
}

impl Services {
    pub fn new(repos: &Repositories, identifiers: IdentifierConfig) -> Self {
        let events = DraftEvents::default();
        let activity: Arc<dyn ActivityLogService> = Arc::new(ActivityLogServiceImpl::new(repos.activity_logs.clone()));
        let allocator: Arc<dyn IdentifierAllocator> =
            Arc::new(SequentialIdAllocator::new(repos.counters.clone(), identifiers));

        let drafts = Arc::new(DraftServiceImpl::new(
            repos.drafts.clone(),
            repos.inquiries.clone(),
            activity.clone(),
            events.clone(),
        ));
        let approvals = Arc::new(ApprovalServiceImpl::new(
            repos.drafts.clone(),
            repos.inquiries.clone(),
            repos.clients.clone(),
            repos.projects.clone(),
            allocator,
            activity.clone(),
            events,
        ));
        let quotations = Arc::new(QuotationServiceImpl::new(
            repos.threads.clone(),
            repos.inquiries.clone(),
            activity.clone(),
        ));

        Services {
            drafts,
            approvals,
            quotations,
            activity,
        }
    }

    pub fn router(&self) -> Router {
        let draft_state = DraftHandlerState {
            drafts: self.drafts.clone(),
            approvals: self.approvals.clone(),
        };
        Router::new()
            .merge(draft_router(draft_state))
            .merge(quotation_router(self.quotations.clone()))
            .merge(activity_router(self.activity.clone()))
            .route("/health", get(|| async { "OK" }))
    }
}

pub struct App {
    config: AppConfig,
    router: Router,
}

impl App {
    pub async fn new() -> Result<Self, BoxError> {
        let config = AppConfig::from_env()?;
        let identifiers = IdentifierConfig::from_env()?;

        let repos = match config.storage {
            StorageBackend::Mongo => {
                let mongo_config = MongoConfig::from_env()?;
                let collections = CollectionConfig::from_env()?;
                Repositories::mongo(&mongo_config, &collections).await.map_err(|e| {
                    error!("Failed to initialise MongoDB repositories: {}", e);
                    e
                })?
            }
            StorageBackend::InMemory => {
                info!("Using in-memory storage, nothing will survive a restart");
                Repositories::in_memory()
            }
        };

        let services = Services::new(&repos, identifiers);
        let router = services.router();
        Ok(App { config, router })
    }

    pub async fn start(self) -> Result<(), BoxError> {
        let addr = SocketAddr::new(self.config.host.parse()?, self.config.port);
        info!("🚀 Server running at http://{}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}
