//! Monotonic + wall time behind a small capability trait, so orchestrator
//! tests can advance time deterministically instead of sleeping in real
//! time. Production code always uses [`SystemClock`].

use std::time::Instant;

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    fn monotonic_now(&self) -> Instant;
}

#[derive(Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic_now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
pub mod test_clock {
    use super::*;
    use std::sync::Mutex;

    pub struct TestClock {
        current: Mutex<DateTime<Utc>>,
        started: Instant,
    }

    impl TestClock {
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                current: Mutex::new(start),
                started: Instant::now(),
            }
        }

        pub fn advance(&self, delta: chrono::Duration) {
            let mut current = self.current.lock().unwrap();
            *current += delta;
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> DateTime<Utc> {
            *self.current.lock().unwrap()
        }

        fn monotonic_now(&self) -> Instant {
            self.started
        }
    }
}
