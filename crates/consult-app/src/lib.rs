pub mod config;
pub mod consult_service;
mod dispatch;
pub mod error;
pub mod resolver;
pub mod sweep;

#[cfg(test)]
mod testing;
