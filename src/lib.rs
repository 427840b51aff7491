pub mod audit;
pub mod auth;
pub mod budget;
pub mod config;
pub mod currency;
pub mod db;
pub mod demo;
pub mod error;
pub mod itinerary;
pub mod kinds;
pub mod models;
pub mod routes;
pub mod s3;
pub mod schema;
pub mod state;
pub mod storage;
pub mod timeline;
pub mod users;
pub mod utils;
