// Copyright 2026 The Branchstore Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Wall-clock / monotonic time source collaborator (§6), swappable for
//! tests the same way [`crate::id::IdGenerator`] is.

use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use chrono::DateTime;
use chrono::Utc;

/// A commit timestamp, stored as milliseconds since the Unix epoch plus a
/// minutes-east-of-UTC offset, matching the teacher's `MillisSinceEpoch`
/// shape in `backend.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Timestamp {
    pub millis_since_epoch: i64,
    pub tz_offset_mins: i32,
}

impl Timestamp {
    pub fn now() -> Self {
        let now: DateTime<Utc> = Utc::now();
        Self {
            millis_since_epoch: now.timestamp_millis(),
            tz_offset_mins: 0,
        }
    }
}

/// Time source the core consumes instead of calling `Utc::now()` directly,
/// so tests can supply a fixed or stepped clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that starts at a fixed instant and advances by one millisecond
/// on every read, so commit timestamps in a test fixture are both
/// deterministic and strictly increasing.
pub struct SteppedClock {
    next_millis: AtomicI64,
}

impl SteppedClock {
    pub fn starting_at(millis_since_epoch: i64) -> Self {
        Self {
            next_millis: AtomicI64::new(millis_since_epoch),
        }
    }
}

impl Clock for SteppedClock {
    fn now(&self) -> Timestamp {
        let millis = self.next_millis.fetch_add(1, Ordering::SeqCst);
        Timestamp {
            millis_since_epoch: millis,
            tz_offset_mins: 0,
        }
    }
}
