//! Google Cloud REST plumbing shared by the Secret Manager and BigQuery clients.

pub mod auth;

pub use auth::AccessTokenSource;
