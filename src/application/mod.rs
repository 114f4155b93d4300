pub mod cart;
pub mod catalog_service;
pub mod order_service;
