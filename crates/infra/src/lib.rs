mod config;
mod repos;
mod services;
mod system;

pub use config::Config;
pub use repos::{AcknowledgeResult, DueRecordsQuery, IReminderRecordRepo, Repos};
pub use services::*;
use std::{sync::Arc, time::Duration};
pub use system::{ISys, RealSys, StaticTimeSys};
use tracing::{info, warn};

#[derive(Clone)]
pub struct RemindrContext {
    pub repos: Repos,
    pub config: Config,
    pub sys: Arc<dyn ISys>,
    pub push: Arc<dyn IPushGateway>,
}

struct ContextParams {
    mongodb_connection_string: String,
    mongodb_db_name: String,
    fcm_service_account_path: Option<String>,
}

impl RemindrContext {
    pub fn create_inmemory() -> Self {
        Self {
            repos: Repos::create_inmemory(),
            config: Config::new(),
            sys: Arc::new(RealSys {}),
            push: Arc::new(InMemoryPushGateway::new()),
        }
    }

    async fn create(params: ContextParams) -> Self {
        let repos = Repos::create_mongodb(&params.mongodb_connection_string, &params.mongodb_db_name)
            .await
            .expect("Mongo db credentials must be set and valid");
        let config = Config::new();
        let push = create_push_gateway(params.fcm_service_account_path, &config);
        Self {
            repos,
            config,
            sys: Arc::new(RealSys {}),
            push,
        }
    }
}

fn create_push_gateway(service_account_path: Option<String>, config: &Config) -> Arc<dyn IPushGateway> {
    match service_account_path {
        Some(path) => {
            let gateway = FcmPushGateway::from_service_account_file(
                &path,
                config.push_concurrency,
                Duration::from_secs(config.push_request_timeout_secs),
            )
            .unwrap_or_else(|e| panic!("Unable to set up FCM with {}: {}", path, e));
            info!("Delivering push notifications through FCM");
            Arc::new(gateway)
        }
        None => {
            warn!("FCM_SERVICE_ACCOUNT_PATH is not set, notifications will only be recorded in memory");
            Arc::new(InMemoryPushGateway::new())
        }
    }
}

/// Will setup the correct Infra Context given the environment
pub async fn setup_context() -> RemindrContext {
    const MONGODB_CONNECTION_STRING: &str = "MONGODB_CONNECTION_STRING";
    const MONGODB_NAME: &str = "MONGODB_NAME";
    const FCM_SERVICE_ACCOUNT_PATH: &str = "FCM_SERVICE_ACCOUNT_PATH";

    let fcm_service_account_path = std::env::var(FCM_SERVICE_ACCOUNT_PATH).ok();
    let mongodb_connection_string = std::env::var(MONGODB_CONNECTION_STRING);
    let mongodb_db_name = std::env::var(MONGODB_NAME);

    match (mongodb_connection_string, mongodb_db_name) {
        (Ok(mongodb_connection_string), Ok(mongodb_db_name)) => {
            info!("{} and {} env vars was provided. Going to use mongodb.", MONGODB_CONNECTION_STRING, MONGODB_NAME);
            RemindrContext::create(ContextParams {
                mongodb_connection_string,
                mongodb_db_name,
                fcm_service_account_path,
            })
            .await
        }
        _ => {
            warn!("{} and {} env vars was not provided. Going to use inmemory infra. This should only be used during testing!", MONGODB_CONNECTION_STRING, MONGODB_NAME);
            let config = Config::new();
            let push = create_push_gateway(fcm_service_account_path, &config);
            RemindrContext {
                repos: Repos::create_inmemory(),
                config,
                sys: Arc::new(RealSys {}),
                push,
            }
        }
    }
}
