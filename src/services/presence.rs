use mongodb::bson::oid::ObjectId;
use redis::aio::ConnectionManager;
use rocket::fairing::AdHoc;

/// Window after which a user with no live session drops to offline even
/// if the disconnect cleanup never ran.
pub const PRESENCE_TTL_SECS: i64 = 120;

/// Ephemeral online/offline state, keyed by user id in redis with a TTL.
/// Nothing here is authoritative: a reconnect simply re-announces online,
/// and the TTL sweeps up sessions that died without cleanup.
#[derive(Clone)]
pub struct PresenceStore {
    conn: ConnectionManager,
}

pub fn init() -> AdHoc {
    AdHoc::on_ignite("Redis presence", |rocket| async {
        let url = crate::config::Config::redis_url();
        match connect(&url).await {
            Ok(store) => {
                log::info!("✓ Redis connected successfully");
                rocket.manage(store)
            }
            Err(e) => {
                log::error!("✗ Failed to connect to Redis: {}", e);
                rocket
            }
        }
    })
}

async fn connect(url: &str) -> Result<PresenceStore, redis::RedisError> {
    let client = redis::Client::open(url)?;
    let conn = ConnectionManager::new(client).await?;
    Ok(PresenceStore { conn })
}

impl PresenceStore {
    pub fn key(user_id: &ObjectId) -> String {
        format!("presence:{}", user_id.to_hex())
    }

    pub async fn mark_online(&self, user_id: &ObjectId) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        redis::cmd("SETEX")
            .arg(Self::key(user_id))
            .arg(PRESENCE_TTL_SECS)
            .arg("online")
            .query_async::<_, ()>(&mut conn)
            .await
    }

    /// Called on each heartbeat tick while a session stays connected.
    pub async fn refresh(&self, user_id: &ObjectId) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        redis::cmd("EXPIRE")
            .arg(Self::key(user_id))
            .arg(PRESENCE_TTL_SECS)
            .query_async::<_, ()>(&mut conn)
            .await
    }

    pub async fn mark_offline(&self, user_id: &ObjectId) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(Self::key(user_id))
            .query_async::<_, ()>(&mut conn)
            .await
    }

    pub async fn is_online(&self, user_id: &ObjectId) -> Result<bool, redis::RedisError> {
        let mut conn = self.conn.clone();
        redis::cmd("EXISTS")
            .arg(Self::key(user_id))
            .query_async(&mut conn)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_key_shape() {
        let id = ObjectId::new();
        assert_eq!(PresenceStore::key(&id), format!("presence:{}", id.to_hex()));
    }
}
