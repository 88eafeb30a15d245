use chrono::{Duration, Utc};

use reqwest::StatusCode;

use serde_json::Value;

use sqlx::PgPool;

use wiremock::matchers::*;
use wiremock::{Mock, ResponseTemplate};

use folio::domain::Role;
use folio::repo::UsersRepo;

use crate::helpers::{TestApp, TestUser};

async fn send_now(app: &TestApp, admin: &TestUser) -> (StatusCode, Value) {
    let res = app
        .send_notifications_now(Some(&admin.credentials()))
        .await
        .expect("Failed to execute request");
    let status = res.status();
    let body = res.json().await.expect("Failed to parse dispatch report");
    (status, body)
}

#[sqlx::test]
async fn due_posts_are_mailed_to_subscribers_once(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;
    let admin = TestUser::admin(&pool).await;
    TestUser::register(&pool, "first@example.com", &[Role::User, Role::Subscriber]).await;
    TestUser::register(&pool, "second@example.com", &[Role::User, Role::Subscriber]).await;
    TestUser::register(&pool, "lurker@example.com", &[Role::User]).await;
    let due = app.insert_post(&admin, Utc::now() - Duration::minutes(5)).await;
    let scheduled = app.insert_post(&admin, Utc::now() + Duration::days(1)).await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&app.email_server)
        .await;

    let (status, report) = send_now(&app, &admin).await;

    assert_eq!(StatusCode::OK, status);
    assert_eq!("sent", report["outcome"]);
    assert_eq!(1, report["notified"]);
    assert_eq!(2, report["emails_sent"]);
    assert!(app.post(due).await.email_sent);
    assert!(!app.post(scheduled).await.email_sent);

    let mut recipients = app.email_recipients().await;
    recipients.sort();
    assert_eq!(vec!["first@example.com", "second@example.com"], recipients);

    let links = app.email_links(0).await;
    assert!(links.iter().any(|link| link.ends_with(&format!("/blog/posts/{}", due))));

    let (_, again) = send_now(&app, &admin).await;
    assert_eq!(0, again["selected"]);

    Ok(())
}

#[sqlx::test]
async fn a_run_takes_at_most_one_batch(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;
    let admin = TestUser::admin(&pool).await;
    TestUser::register(&pool, "reader@example.com", &[Role::Subscriber]).await;
    let mut posts = Vec::new();
    for minutes in 1..=12 {
        posts.push(app.insert_post(&admin, Utc::now() - Duration::minutes(minutes)).await);
    }

    Mock::given(path("/email"))
        .respond_with(ResponseTemplate::new(200))
        .expect(12)
        .mount(&app.email_server)
        .await;

    let (_, first) = send_now(&app, &admin).await;
    assert_eq!(10, first["notified"]);

    let mut notified = 0;
    for post in &posts {
        if app.post(*post).await.email_sent {
            notified += 1;
        }
    }
    assert_eq!(10, notified);

    let (_, second) = send_now(&app, &admin).await;
    assert_eq!(2, second["notified"]);

    for post in &posts {
        assert!(app.post(*post).await.email_sent);
    }

    Ok(())
}

#[sqlx::test]
async fn configured_batch_size_caps_a_run(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn_with_batch_size(&pool, 2).await;
    let admin = TestUser::admin(&pool).await;
    TestUser::register(&pool, "reader@example.com", &[Role::Subscriber]).await;
    let oldest = app.insert_post(&admin, Utc::now() - Duration::minutes(30)).await;
    let older = app.insert_post(&admin, Utc::now() - Duration::minutes(20)).await;
    let newest = app.insert_post(&admin, Utc::now() - Duration::minutes(10)).await;

    Mock::given(path("/email"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&app.email_server)
        .await;

    let (_, first) = send_now(&app, &admin).await;
    assert_eq!(2, first["selected"]);
    assert!(app.post(oldest).await.email_sent);
    assert!(app.post(older).await.email_sent);
    assert!(!app.post(newest).await.email_sent);

    let (_, second) = send_now(&app, &admin).await;
    assert_eq!(1, second["notified"]);
    assert!(app.post(newest).await.email_sent);

    Ok(())
}

#[sqlx::test]
async fn post_without_subscribers_is_still_marked(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;
    let admin = TestUser::admin(&pool).await;
    let post = app.insert_post(&admin, Utc::now() - Duration::minutes(1)).await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    let (status, report) = send_now(&app, &admin).await;

    assert_eq!(StatusCode::OK, status);
    assert_eq!(1, report["notified"]);
    assert!(app.post(post).await.email_sent);

    Ok(())
}

#[sqlx::test]
async fn failing_mail_api_does_not_block_marking(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;
    let admin = TestUser::admin(&pool).await;
    TestUser::register(&pool, "bounce@example.com", &[Role::Subscriber]).await;
    TestUser::register(&pool, "reader@example.com", &[Role::Subscriber]).await;
    let post = app.insert_post(&admin, Utc::now() - Duration::minutes(1)).await;

    Mock::given(path("/email"))
        .and(body_partial_json(serde_json::json!({ "To": "bounce@example.com" })))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&app.email_server)
        .await;
    Mock::given(path("/email"))
        .and(body_partial_json(serde_json::json!({ "To": "reader@example.com" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let (status, report) = send_now(&app, &admin).await;

    assert_eq!(StatusCode::OK, status);
    assert_eq!("sent", report["outcome"]);
    assert_eq!(1, report["emails_sent"]);
    assert_eq!(1, report["emails_failed"]);
    assert!(app.post(post).await.email_sent);

    Ok(())
}

#[sqlx::test]
async fn inactive_subscribers_are_not_mailed(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;
    let admin = TestUser::admin(&pool).await;
    let gone = TestUser::register(&pool, "gone@example.com", &[Role::Subscriber]).await;
    let paused = TestUser::register(&pool, "paused@example.com", &[Role::Subscriber]).await;
    TestUser::register(&pool, "reader@example.com", &[Role::Subscriber]).await;
    UsersRepo::anonymize(&pool, gone.id).await?;
    UsersRepo::set_active(&pool, paused.id, false).await?;
    app.insert_post(&admin, Utc::now() - Duration::minutes(1)).await;

    Mock::given(path("/email"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    send_now(&app, &admin).await;

    assert_eq!(vec!["reader@example.com"], app.email_recipients().await);

    Ok(())
}

#[sqlx::test]
async fn concurrent_send_requests_mail_each_post_once(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;
    let admin = TestUser::admin(&pool).await;
    TestUser::register(&pool, "first@example.com", &[Role::Subscriber]).await;
    TestUser::register(&pool, "second@example.com", &[Role::Subscriber]).await;
    for minutes in 1..=3 {
        app.insert_post(&admin, Utc::now() - Duration::minutes(minutes)).await;
    }

    Mock::given(path("/email"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_millis(50)))
        .expect(6)
        .mount(&app.email_server)
        .await;

    let ((_, first), (_, second)) = tokio::join!(send_now(&app, &admin), send_now(&app, &admin));

    let notified = first["notified"].as_u64().unwrap() + second["notified"].as_u64().unwrap();
    assert_eq!(3, notified);

    Ok(())
}
