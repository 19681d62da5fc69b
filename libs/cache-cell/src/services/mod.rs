pub mod manager;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use manager::CacheManager;
pub use memory::InMemoryCacheStore;
pub use redis_store::RedisCacheStore;
pub use store::CacheStore;
