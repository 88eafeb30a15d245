//! Run the notification dispatcher once, for cron jobs and manual use.
//! Exits non-zero only when the run could not start.

use std::sync::Arc;

use anyhow::Context;

use sqlx::PgPool;

use folio::notify::{Dispatcher, PgNotificationStore};
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

    let dispatcher = Dispatcher::new(
        PgNotificationStore::new(pool),
        Arc::new(settings.email.client()?),
        settings.dispatch()?,
    );

    let report = dispatcher.run_pending_notifications().await;
    println!("{}", serde_json::to_string(&report)?);

    if !report.is_completed() {
        anyhow::bail!("Notification run aborted");
    }
    Ok(())
}
