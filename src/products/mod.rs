pub mod dto;
pub mod handlers;
pub mod images;
pub mod repo;

pub use handlers::products_routes;
