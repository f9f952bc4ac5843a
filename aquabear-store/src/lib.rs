pub mod app_config;
pub mod database;
pub mod mailer;
pub mod memory;
pub mod redis_repo;
pub mod reservation_repo;

pub use database::DbClient;
pub use mailer::ResendDispatcher;
pub use memory::MemoryReservationStore;
pub use redis_repo::RedisClient;
pub use reservation_repo::PgReservationStore;
