pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod resume;
pub mod routes;
pub mod state;
