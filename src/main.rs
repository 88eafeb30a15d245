use std::net::TcpListener;
use std::sync::Arc;

use anyhow::Context;

use sqlx::PgPool;

use folio::app;
use folio::crypto::SigningKey;
use folio::notify::{Dispatcher, NotificationScheduler, PgNotificationStore};
use folio::settings::Settings;
use folio::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = telemetry::create_subscriber("info", std::io::stdout);
    telemetry::set_subscriber(subscriber)?;

    let settings = Settings::load().context("Failed to load settings")?;

    let pool = PgPool::connect_with(settings.database.with_db())
        .await
        .context("Failed to connect to database")?;
    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let signing_key = SigningKey::new(settings.app.secret_key())?;
    let email_client = Arc::new(settings.email.client()?);

    let dispatcher = Arc::new(Dispatcher::new(
        PgNotificationStore::new(pool.clone()),
        email_client.clone(),
        settings.dispatch()?,
    ));
    let scheduler =
        NotificationScheduler::start(dispatcher.clone(), settings.notifications.schedule);

    let listener = TcpListener::bind(settings.app.addr())?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    let served = app::run(listener, pool, signing_key, email_client, dispatcher)?
        .await
        .context("Failed to run app");

    scheduler.stop().await;
    served
}
