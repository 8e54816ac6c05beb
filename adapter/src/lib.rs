pub mod database;
pub mod event;
pub mod redis;
pub mod repository;
