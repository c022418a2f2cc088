//! Small utility surface exposed to flows (`utils.uuid`, `utils.now`,
//! `utils.sleep`).

use chrono::{DateTime, Utc};
use tokio::time::Duration;

pub fn uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub async fn sleep(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
