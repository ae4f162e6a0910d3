pub mod auth;
pub mod config;
pub mod error;
pub mod gate;
pub mod http;
pub mod routes;
