pub mod app;
pub mod config;
pub mod models;
pub mod render;
pub mod session;
pub mod tmdb;
pub mod view;
