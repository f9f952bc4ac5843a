use std::sync::Arc;

use aquabear_core::{BookingIntake, NotificationDispatcher, ReservationConsole};
use aquabear_store::app_config::RateLimitConfig;
use aquabear_store::RedisClient;

use crate::auth::{RevocationList, StaffDirectory};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub console: Arc<ReservationConsole>,
    pub intake: Arc<BookingIntake>,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    pub staff: Arc<StaffDirectory>,
    pub revoked: Arc<RevocationList>,
    /// Rate limiting is skipped when Redis is not configured.
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(
        console: Arc<ReservationConsole>,
        intake: Arc<BookingIntake>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        staff: StaffDirectory,
        auth: AuthConfig,
    ) -> Self {
        Self {
            console,
            intake,
            dispatcher,
            staff: Arc::new(staff),
            revoked: Arc::new(RevocationList::default()),
            redis: None,
            rate_limit: RateLimitConfig::default(),
            auth,
        }
    }

    pub fn with_redis(mut self, redis: Arc<RedisClient>, rate_limit: RateLimitConfig) -> Self {
        self.redis = Some(redis);
        self.rate_limit = rate_limit;
        self
    }
}
