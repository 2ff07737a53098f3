//! IdGenerator port.

use ulid::Ulid;

use crate::domain::ids::{LogId, UnitId};
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate_unit_id(&self) -> UnitId;

    fn generate_log_id(&self) -> LogId;
}

/// ULIDs stamped with the injected clock, so a `FixedClock` pins the
/// timestamp half of every id.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_unit_id(&self) -> UnitId {
        UnitId::from(self.next())
    }

    fn generate_log_id(&self) -> LogId {
        LogId::from(self.next())
    }
}
