// src/services.rs

pub mod approval_service;
pub mod auth;
pub mod document_service;
pub mod extraction;
pub mod file_store;
pub mod pdf_renderer;
pub mod purchase_order_service;
pub mod reconciliation;
pub mod request_service;
