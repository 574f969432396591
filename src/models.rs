pub mod auth;
pub mod documents;
pub mod extraction;
pub mod requests;
