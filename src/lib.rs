#[macro_use]
extern crate rocket;

pub mod auth;
pub mod background;
pub mod catchers;
pub mod checkers;
pub mod config;
pub mod db;
pub mod engine;
pub mod models;
pub mod routes;
pub mod webhook;
