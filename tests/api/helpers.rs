use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use reqwest::{Client, Method, Response};

use secrecy::Secret;

use serde::Serialize;

use url::Url;

use uuid::Uuid;

use wiremock::MockServer;

use sqlx::PgPool;

use folio::app;
use folio::client::EmailClient;
use folio::crypto::{password, SigningKey};
use folio::domain::Role;
use folio::model::{NewPost, NewUser, Post};
use folio::notify::{DispatchSettings, Dispatcher, PgNotificationStore};
use folio::repo::{PostsRepo, UsersRepo};

#[derive(Debug, Serialize)]
pub struct Registration {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub subscribe: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

pub struct TestApp {
    addr: String,

    pub pool: PgPool,
    pub client: Client,
    pub email_server: MockServer,
}

impl TestApp {
    pub async fn spawn(pool: &PgPool) -> Self {
        Self::spawn_with_batch_size(pool, 10).await
    }

    pub async fn spawn_with_batch_size(pool: &PgPool, batch_size: u32) -> Self {
        use rand::{distributions::Alphanumeric, Rng};

        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to listen on random port");
        let port = listener.local_addr().unwrap().port();

        let addr = format!("http://127.0.0.1:{}", port);

        let signing_key = {
            let rand_key: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(32)
                .map(char::from)
                .collect();
            let rand_key = Secret::new(rand_key);

            SigningKey::new(&rand_key).expect("Failed to create crypto signing key")
        };

        let email_server = MockServer::start().await;

        let email_client = {
            let sender = "test@test.com"
                .parse()
                .expect("Failed to parse sender email address");
            let api_base_url =
                Url::parse(&email_server.uri()).expect("Failed to parse mock server uri");
            let api_auth_token = Secret::new("TestAuthorization".into());
            let api_timeout = Duration::from_secs(2);

            EmailClient::new(sender, api_timeout, api_base_url, api_auth_token)
                .expect("Failed to create email client")
        };
        let email_client = Arc::new(email_client);

        let dispatcher = Arc::new(Dispatcher::new(
            PgNotificationStore::new(pool.clone()),
            email_client.clone(),
            DispatchSettings {
                batch_size,
                send_timeout: Duration::from_secs(5),
                site_url: Url::parse(&addr).expect("Failed to parse app address"),
            },
        ));

        let server = app::run(
            listener,
            pool.clone(),
            signing_key,
            email_client,
            dispatcher,
        )
        .expect("Failed to spawn app instance");
        let _ = tokio::spawn(server);

        let client = Client::new();

        Self {
            addr,
            pool: pool.clone(),
            client,
            email_server,
        }
    }

    pub fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", &self.addr, url);
        self.client.request(method, url)
    }

    pub fn authorized_request(
        &self,
        method: Method,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> reqwest::RequestBuilder {
        let req = self.request(method, url);
        if let Some(creds) = credentials {
            req.basic_auth(creds.email.clone(), Some(creds.password.clone()))
        } else {
            req
        }
    }

    pub async fn health_check(&self) -> reqwest::Result<Response> {
        self.request(Method::GET, "health_check").send().await
    }

    pub async fn register(&self, registration: &Registration) -> reqwest::Result<Response> {
        self.request(Method::POST, "users")
            .form(registration)
            .send()
            .await
    }

    pub async fn request_password_reset(&self, email: &str) -> reqwest::Result<Response> {
        self.request(Method::POST, "auth/password-reset")
            .form(&[("email", email)])
            .send()
            .await
    }

    pub async fn send_notifications_now(
        &self,
        credentials: Option<&Credentials>,
    ) -> reqwest::Result<Response> {
        self.authorized_request(Method::POST, "admin/notifications/send", credentials)
            .send()
            .await
    }

    /// Store a post directly, dated `created_at`
    pub async fn insert_post(&self, author: &TestUser, created_at: DateTime<Utc>) -> Uuid {
        let new_post = NewPost {
            title: "A post".into(),
            subtitle: "With a subtitle".into(),
            body: "<p>Body</p>".into(),
            img_url: "https://example.com/image.png".into(),
            category_id: None,
            author_id: author.id,
            publish_at: created_at,
        };
        PostsRepo::insert(&self.pool, &new_post)
            .await
            .expect("Failed to insert test post")
    }

    pub async fn post(&self, id: Uuid) -> Post {
        PostsRepo::fetch_by_id(&self.pool, id)
            .await
            .expect("Failed to fetch post")
            .expect("Post missing")
    }

    /// Links in the text body of the `n`th email sent to the mock server
    pub async fn email_links(&self, n: usize) -> Vec<String> {
        let requests = self
            .email_server
            .received_requests()
            .await
            .expect("Request recording disabled");
        let body: serde_json::Value =
            serde_json::from_slice(&requests[n].body).expect("Failed to parse email request");
        let text = body["TextBody"].as_str().expect("Missing text body");

        linkify::LinkFinder::new()
            .links(text)
            .filter(|link| *link.kind() == linkify::LinkKind::Url)
            .map(|link| link.as_str().to_owned())
            .collect()
    }

    /// Recipients of every email sent to the mock server, in order
    pub async fn email_recipients(&self) -> Vec<String> {
        self.email_server
            .received_requests()
            .await
            .expect("Request recording disabled")
            .iter()
            .map(|request| {
                let body: serde_json::Value =
                    serde_json::from_slice(&request.body).expect("Failed to parse email request");
                body["To"].as_str().expect("Missing recipient").to_owned()
            })
            .collect()
    }
}

pub const TEST_PASSWORD: &str = "Test-Passw0rd!";

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub password: String,
}

impl TestUser {
    pub async fn register(pool: &PgPool, email: &str, roles: &[Role]) -> Self {
        let password_hash = password::hash(Secret::new(TEST_PASSWORD.into()))
            .expect("Failed to hash user password");

        let new_user = NewUser {
            name: "Test User".parse().expect("Failed to parse name"),
            email: email.parse().expect("Failed to parse email address"),
            password_hash,
            password_set: true,
        };

        let id = UsersRepo::insert(pool, &new_user)
            .await
            .expect("Failed to insert test user");
        for role in roles {
            UsersRepo::add_role(pool, id, *role)
                .await
                .expect("Failed to grant test role");
        }

        Self {
            id,
            email: email.to_string(),
            password: TEST_PASSWORD.to_string(),
        }
    }

    pub async fn admin(pool: &PgPool) -> Self {
        Self::register(pool, "admin@example.com", &[Role::User, Role::Admin]).await
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }
}
