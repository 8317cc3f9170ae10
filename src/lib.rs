//! Local concert discovery: similarity-ranked search and weekly digests

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
