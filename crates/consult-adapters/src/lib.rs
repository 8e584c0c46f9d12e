pub mod cache;
pub mod events;
pub mod notify;
pub mod persistence;
