pub mod access_repo;
pub use access_repo::AccessRepository;
pub mod inventory_repo;
pub use inventory_repo::InventoryRepository;
pub mod transfer_repo;
pub use transfer_repo::TransferRepository;
pub mod purchase_order_repo;
pub use purchase_order_repo::PurchaseOrderRepository;
pub mod subscription_repo;
pub use subscription_repo::SubscriptionRepository;
pub mod usage_repo;
pub use usage_repo::UsageRepository;
