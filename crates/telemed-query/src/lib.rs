//! # Telemed 查询缓存层
//!
//! 在远程服务客户端之上提供：
//! - 按逻辑查询键缓存读取结果，并发读取去重
//! - 写操作成功后按声明的键列表失效并重新获取
//! - 每个远程过程对应的类型化读写入口（`Queries`）

pub mod cache;
pub mod hooks;
pub mod key;
pub mod mutation;

pub use cache::{CacheConfig, CacheEvent, QueryCache, QueryObserver, QueryStatus};
pub use hooks::{ActorSlot, ProfileLookup, Queries, SharedBackend};
pub use key::{Invalidation, QueryFamily, QueryKey};
pub use mutation::{MutationStatus, MutationTracker};
