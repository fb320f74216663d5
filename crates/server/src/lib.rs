//! Host integration for the claims engine: configuration, the JSON store,
//! the durable-write queue, the claim action layer, protection rules,
//! transfer expiry and the stats dashboard.

pub mod config;
pub mod dashboard;
pub mod event_bus;
pub mod expiry;
pub mod persistence;
pub mod player_state;
pub mod rules;
pub mod service;
pub mod services;
pub mod writer;
