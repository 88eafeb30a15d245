use reqwest::{Method, StatusCode};

use sqlx::PgPool;

use wiremock::matchers::*;
use wiremock::{Mock, ResponseTemplate};

use folio::domain::Role;

use crate::helpers::{Credentials, TestApp, TestUser};

const NEW_PASSWORD: &str = "Brand-New-Passw0rd";

#[sqlx::test]
async fn reset_request_for_unknown_email_sends_nothing(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    let res = app
        .request_password_reset("nobody@example.com")
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::OK, res.status());

    Ok(())
}

#[sqlx::test]
async fn reset_link_sets_a_new_password(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;
    let user = TestUser::register(&pool, "reader@example.com", &[Role::User]).await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let res = app
        .request_password_reset(&user.email)
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::OK, res.status());

    let links = app.email_links(0).await;
    assert_eq!(1, links.len());

    let res = app
        .client
        .post(&links[0])
        .form(&[("password", NEW_PASSWORD)])
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::OK, res.status());

    let old = user.credentials();
    let new = Credentials {
        password: NEW_PASSWORD.into(),
        ..user.credentials()
    };

    let res = app
        .authorized_request(Method::POST, "account/subscription", Some(&old))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::UNAUTHORIZED, res.status());

    let res = app
        .authorized_request(Method::POST, "account/subscription", Some(&new))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::OK, res.status());

    Ok(())
}

#[sqlx::test]
async fn tampered_token_is_unauthorized(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;

    let res = app
        .request(Method::POST, "auth/password-reset/eyJmb28iOiJiYXIifQ.c2lnbmF0dXJl")
        .form(&[("password", NEW_PASSWORD)])
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::UNAUTHORIZED, res.status());

    Ok(())
}

#[sqlx::test]
async fn weak_new_password_is_rejected(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;
    let user = TestUser::register(&pool, "reader@example.com", &[Role::User]).await;

    Mock::given(path("/email"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&app.email_server)
        .await;

    app.request_password_reset(&user.email)
        .await
        .expect("Failed to execute request");
    let links = app.email_links(0).await;

    let res = app
        .client
        .post(&links[0])
        .form(&[("password", "weak")])
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::BAD_REQUEST, res.status());

    Ok(())
}
