pub mod api;
pub mod config;
pub mod entities;
pub mod identity;
pub mod images;
pub mod middleware;
