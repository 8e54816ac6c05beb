pub mod model;
pub mod publisher;
pub mod repository;
