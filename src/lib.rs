pub mod app;
pub mod config;
pub mod country;
pub mod links;
pub mod models;
pub mod resolver;
pub mod server;
