//! src/startup.rs

use crate::campaign::{Dispatcher, HtmlContentExtractor, Personalizer};
use crate::configuration::{DatabaseSettings, Settings};
use crate::repository::PgSubscriberRepository;
use crate::routes::{health_check, send_campaign, subscribe, unsubscribe};
use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::net::TcpListener;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    pub async fn build(configuration: Settings) -> Result<Self, anyhow::Error> {
        let connection_pool = get_connection_pool(&configuration.database);
        let repository = Arc::new(PgSubscriberRepository::new(
            connection_pool,
            configuration.campaign.query_timeout(),
        ));

        let campaign = &configuration.campaign;
        let unsubscribe_url = if campaign.unsubscribe_url.is_empty() {
            format!(
                "{}/subscriptions/unsubscribe",
                configuration.application.base_url.trim_end_matches('/')
            )
        } else {
            campaign.unsubscribe_url.clone()
        };
        let personalizer = Personalizer::new(
            configuration.emailclient.template_id.clone(),
            &unsubscribe_url,
        )?;
        let extractor = HtmlContentExtractor::new(
            campaign.title_selector.clone(),
            campaign.content_selector.clone(),
            campaign.fetch_timeout(),
        )?;
        let email_client = configuration.emailclient.client()?;
        let dispatcher = Dispatcher::new(
            &campaign.passcode,
            personalizer,
            Arc::new(extractor),
            repository.clone(),
            Arc::new(email_client),
        )?
        .with_batch_id(configuration.emailclient.use_batch_id)
        .with_max_concurrent_sends(campaign.max_concurrent_sends);

        let address = format!(
            "{}:{}",
            configuration.application.host, configuration.application.port
        );
        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();
        let server = run(listener, repository, dispatcher)?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn get_connection_pool(configuration: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(configuration.with_db())
}

pub fn run(
    listener: TcpListener,
    repository: Arc<PgSubscriberRepository>,
    dispatcher: Dispatcher,
) -> Result<Server, std::io::Error> {
    let repository = web::Data::from(repository);
    let dispatcher = web::Data::new(dispatcher);
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .route("/campaigns", web::post().to(send_campaign))
            .route("/subscriptions", web::post().to(subscribe))
            .route("/subscriptions/unsubscribe", web::get().to(unsubscribe))
            .app_data(repository.clone())
            .app_data(dispatcher.clone())
    })
    .listen(listener)?
    .run();
    Ok(server)
}
