// Listing search-and-filter engine for the vehicle marketplace

use axum::extract::FromRef;
use std::sync::Arc;

pub mod auth;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod facets;
pub mod filters;
pub mod history;
pub mod models;
pub mod pagination;
pub mod predicate;
pub mod repository;
pub mod routes;
pub mod search;

#[cfg(test)]
mod testing;

use crate::config::Settings;
use crate::search::SearchEngine;

// Shared application state handed to every handler
#[derive(Clone, FromRef)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub engine: Arc<SearchEngine>,
}
