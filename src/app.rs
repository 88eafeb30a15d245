use std::net::TcpListener;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::{get, HttpResponse, Responder};
use actix_web::{web, App, HttpServer};

use sqlx::PgPool;

use tracing_actix_web::TracingLogger;

use crate::client::EmailClient;
use crate::controller::{account, admin, blog, password_reset, users};
use crate::crypto::SigningKey;
use crate::notify::BlogDispatcher;

/// Simple health-check endpoint
#[tracing::instrument(name = "Health check")]
#[get("/health_check")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("I am alive")
}

/// Run the application on a specified TCP listener. The dispatcher is shared
/// with the notification scheduler, so "send now" and scheduled runs go
/// through the same single-flight lock.
pub fn run(
    listener: TcpListener,
    pool: PgPool,
    signing_key: SigningKey,
    email_client: Arc<EmailClient>,
    dispatcher: Arc<BlogDispatcher>,
) -> anyhow::Result<Server> {
    // Wrap application data
    let pool = web::Data::new(pool);
    let signing_key = web::Data::new(signing_key);
    let email_client = web::Data::from(email_client);
    let dispatcher = web::Data::from(dispatcher);

    // Start the server
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(pool.clone())
            .app_data(signing_key.clone())
            .app_data(email_client.clone())
            .app_data(dispatcher.clone())
            .service(health_check)
            .service(users::scope())
            .service(password_reset::scope())
            .service(account::scope())
            .service(blog::scope())
            .service(admin::scope())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
