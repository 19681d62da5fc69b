use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),
}
