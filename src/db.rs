pub mod user_repo;
pub use user_repo::UserRepository;
pub mod request_repo;
pub use request_repo::RequestRepository;
pub mod document_repo;
pub use document_repo::DocumentRepository;
pub mod purchase_order_repo;
pub use purchase_order_repo::PurchaseOrderRepository;
#[cfg(test)]
pub mod testing;
