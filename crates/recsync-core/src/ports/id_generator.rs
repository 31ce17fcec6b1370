//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース。Clock を差し替えればタイムスタンプ部分が決定的になる

use crate::domain::{PassId, WorkId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は recsync 自身が採番する ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（host の worker と submit 側の両方から使う）
pub trait IdGenerator: Send + Sync {
    fn generate_pass_id(&self) -> PassId;

    fn generate_work_id(&self) -> WorkId;
}

/// UlidGenerator は ULID ベースの ID 生成器
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_pass_id(&self) -> PassId {
        PassId::from(self.next_ulid())
    }

    fn generate_work_id(&self) -> WorkId {
        WorkId::from(self.next_ulid())
    }
}
