pub mod access;
pub mod auth;
pub mod inventory;
pub mod plan;
pub mod purchase_order;
pub mod subscription;
pub mod transfer;
