pub mod auth;
pub mod csv_store;
pub mod db;
pub mod models;
pub mod normalize;
pub mod service;
pub mod stats;
pub mod store;
