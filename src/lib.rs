//! leafblog - a small server-rendered blog
//!
//! Posts with Markdown bodies, categories, search, threaded comments,
//! likes and user profiles, served by axum over SQLite or MySQL.

pub mod config;
pub mod db;
pub mod forms;
pub mod models;
pub mod services;
pub mod theme;
pub mod web;
