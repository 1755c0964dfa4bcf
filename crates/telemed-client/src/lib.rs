//! # Telemed 远程服务客户端
//!
//! 为四类记录（用户档案、患者、预约、问诊会话）及角色查询提供类型化的远程调用接口：
//! - `BackendService`：每个远程过程一个异步方法
//! - `HttpBackend`：基于 HTTP 的 JSON 远程调用实现
//! - `MemoryBackend`：进程内实现，用于离线模式与测试

pub mod backend;
pub mod http;
pub mod memory;

pub use backend::{BackendService, Procedure, ALL_PROCEDURES};
pub use http::{HttpBackend, HttpBackendConfig, PRINCIPAL_HEADER};
pub use memory::{MemoryBackend, MemoryStore};
