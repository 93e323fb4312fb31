mod redis_cache_tier;

pub use redis_cache_tier::RedisCacheTier;
