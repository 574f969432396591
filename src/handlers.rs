// src/handlers.rs

pub mod auth;
pub mod documents;
pub mod purchase_orders;
pub mod requests;
