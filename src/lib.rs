//! Order lifecycle and payment settlement core of the storefront backend.
//!
//! - `storage`: SQLite pool, schema and data access functions
//! - `gateway`: payment provider adapters (WeChat Pay, Alipay)
//! - `service`: transactional order, payment and logistics operations
//! - `response`: `{code, msg, data}` envelope for the HTTP layer

pub mod config;
pub mod domain;
pub mod gateway;
pub mod response;
pub mod service;
pub mod storage;
