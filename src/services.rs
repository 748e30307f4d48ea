// src/services.rs

pub mod access_service;
pub mod auth;
pub mod inventory_service;
pub mod plan_service;
pub mod purchase_order_service;
pub mod staff_service;
pub mod subscription_service;
pub mod transfer_service;
