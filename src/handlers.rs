// src/handlers.rs

pub mod access;
pub mod inventory;
pub mod purchase_orders;
pub mod staff;
pub mod stock;
pub mod subscriptions;
pub mod transfers;
