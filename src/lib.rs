/// Basic application code
pub mod app;
/// Authentication and the role-based access guard
pub mod auth;
/// REST clients for outside services
pub mod client;
/// Controllers for REST endpoints
pub mod controller;
/// Cryptography-related objects
pub mod crypto;
/// Domain objects
pub mod domain;
/// REST error responses
pub mod error;
/// Records stored in the database
pub mod model;
/// Subscriber notifications for new blog posts
pub mod notify;
/// Repositories
pub mod repo;
/// Application settings
pub mod settings;
/// Application telemetry for tracing and logging
pub mod telemetry;
