//! 业务服务层

pub mod auth_service;
pub mod validation;

pub use auth_service::AuthService;
