pub mod app;
pub mod authz;
pub mod db;
pub mod docs;
pub mod errors;
pub mod jwt;
pub mod models;
pub mod reports;
pub mod routes;
pub mod utils;

pub use app::{create_app, create_router, AppState};
