pub mod agenda;
pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod form;
pub mod model;
pub mod observability;
pub mod store;
