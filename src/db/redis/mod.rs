pub mod store;

pub use store::create_redis_client;
pub use store::RedisDocumentStore;
pub use store::StoreWriterHandle;
