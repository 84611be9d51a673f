//! 过期清扫
//!
//! 每小时把 expires_at 已过去的活跃映射标记为 inactive。
//! 解析路径本身也会判过期，这个清扫只是让状态收敛。

use chrono::Utc;
use tokio::time::{Duration, sleep};
use tracing::{error, info};

use crate::storage::MappingStore;

const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// 启动后台清扫任务
pub fn spawn_expiry_sweeper(mappings: MappingStore) {
    tokio::spawn(async move {
        loop {
            sleep(SWEEP_INTERVAL).await;

            match mappings.mark_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(n) => info!("Expiry sweep marked {} mappings inactive", n),
                Err(e) => error!("Expiry sweep failed: {}", e),
            }
        }
    });
}
