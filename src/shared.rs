use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::gpx_types::{Coordinate, Fix};
use crate::session::{RunningTotals, TrackSession};
use crate::stats::Stats;

/// A session behind one mutex, shared by the task delivering fixes and the
/// ones handling user actions. Snapshots see segments and totals together.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<TrackSession>>,
}

impl SharedSession {
    pub fn new(session: TrackSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackSession> {
        // no session method panics between related updates
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the session.
    pub fn with_session<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut TrackSession) -> R,
    {
        let mut session = self.lock();
        f(&mut session)
    }

    pub fn add_fix(&self, fix: Fix) -> Result<()> {
        self.lock().add_fix(fix)
    }

    pub fn start_new_segment(&self) {
        self.lock().start_new_segment();
    }

    pub fn erase(&self, at: Coordinate, radius_meters: f64) -> usize {
        self.lock().erase(at, radius_meters)
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    pub fn totals(&self) -> RunningTotals {
        self.lock().totals()
    }

    pub fn global_stats(&self) -> Stats {
        self.lock().global_stats()
    }

    /// A consistent copy of the whole session.
    pub fn snapshot(&self) -> TrackSession {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_concurrent_writers_and_readers() {
        let shared = SharedSession::default();

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        let fix = Fix::new(w as f64 * 0.0001, i as f64 * 0.0005).unwrap();
                        shared.add_fix(fix).unwrap();
                        if i % 10 == 9 {
                            shared.start_new_segment();
                        }
                    }
                })
            })
            .collect();

        let reader = {
            let shared = shared.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    let snap = shared.snapshot();
                    let mut fresh = snap.clone();
                    fresh.recalculate_stats();
                    // snapshot totals may be incremental but never torn
                    assert!(
                        (snap.total_tracked_distance() - fresh.total_tracked_distance()).abs()
                            < 1e-6
                    );
                }
            })
        };

        for handle in writers {
            handle.join().unwrap();
        }
        reader.join().unwrap();

        let snap = shared.snapshot();
        let fixes: usize = snap.all_segments().map(|s| s.len()).sum();
        assert_eq!(fixes, 200);
        assert!(
            (shared.totals().total_tracked_distance - shared.global_stats().total_distance).abs()
                < 1e-6
        );
    }

    #[test]
    fn test_with_session_erase_and_reset() {
        let shared = SharedSession::new(TrackSession::new());
        shared.with_session(|s| {
            for i in 0..5 {
                s.add_fix(Fix::new(0.0, i as f64 * 0.001).unwrap()).unwrap();
            }
        });
        let removed = shared.erase(Coordinate::new(0.0, 0.002).unwrap(), 0.0);
        assert_eq!(removed, 1);
        assert_eq!(shared.with_session(|s| s.track_segments().len()), 1);

        shared.reset();
        assert_eq!(shared.totals(), RunningTotals::default());
    }
}
