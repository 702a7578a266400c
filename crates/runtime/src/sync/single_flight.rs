use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Non-reentrant busy flag.
///
/// At most one flight runs at a time; callers arriving while one is in
/// progress skip their work instead of queueing.
#[derive(Clone, Debug, Default)]
pub struct SingleFlight {
    busy: Arc<AtomicBool>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a flight, or returns `None` if one is already running.
    pub fn try_begin(&self) -> Option<FlightGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Ends its flight when dropped, on every exit path.
#[derive(Debug)]
#[must_use = "the flight ends as soon as the guard is dropped"]
pub struct FlightGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_flight_is_refused_until_the_first_ends() {
        let flight = SingleFlight::new();

        let guard = flight.try_begin().unwrap();
        assert!(flight.is_busy());
        assert!(flight.try_begin().is_none());

        drop(guard);
        assert!(!flight.is_busy());
        assert!(flight.try_begin().is_some());
    }

    #[test]
    fn clones_share_the_flag() {
        let flight = SingleFlight::new();
        let other = flight.clone();

        let _guard = flight.try_begin().unwrap();
        assert!(other.try_begin().is_none());
    }
}
