use remindr_api::Application;
use remindr_infra::{Config, InMemoryPushGateway, RemindrContext, StaticTimeSys};
use std::sync::Arc;

pub struct TestApp {
    pub config: Config,
    pub address: String,
}

// Launch the application as a background task
pub async fn spawn_app() -> TestApp {
    let mut ctx = RemindrContext::create_inmemory();
    ctx.config.port = 0; // Random port

    let config = ctx.config.clone();
    let application = Application::new(ctx)
        .await
        .expect("Failed to build application.");

    let address = format!("http://localhost:{}", application.port());
    let _ = actix_web::rt::spawn(async move {
        application
            .start()
            .await
            .expect("Expected application to start");
    });

    TestApp { config, address }
}

/// In-memory context frozen at `now` with a push gateway the test can inspect
pub fn setup_context_at(now: i64) -> (RemindrContext, Arc<InMemoryPushGateway>) {
    let mut ctx = RemindrContext::create_inmemory();
    ctx.sys = Arc::new(StaticTimeSys {
        timestamp_millis: now,
    });
    let push = Arc::new(InMemoryPushGateway::new());
    ctx.push = push.clone();
    (ctx, push)
}
