pub mod cache;
pub mod config;
pub mod errors;
pub mod keys;
pub mod models;
pub mod services;
pub mod storage;
pub mod web;
