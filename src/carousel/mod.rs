//! Rotating slide carousel driven on the tokio runtime.
//!
//! [`CarouselState`] holds the pure state machine; [`Carousel`] owns one
//! instance in a watch channel, runs its phase timers and the optional
//! autoplay interval, and aborts both when dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::CarouselConfig;

mod state;

pub use state::{CarouselState, Direction, Phase, PhaseTimer};

#[derive(Error, Debug)]
pub enum CarouselError {
    #[error("carousel needs at least one slide")]
    NoSlides,

    #[error("slide '{0}' not found")]
    UnknownSlide(String),

    #[error("carousel must be created inside a tokio runtime")]
    NoRuntime,
}

struct Rotation {
    period: Duration,
    direction: Direction,
    handle: JoinHandle<()>,
}

struct Shared {
    state: watch::Sender<CarouselState>,
    runtime: Handle,
    /// Phase timer task and the transition token it belongs to
    timer: Mutex<Option<(u64, JoinHandle<()>)>>,
    rotation: Mutex<Option<Rotation>>,
}

// The guarded values are plain handles, so a panic elsewhere cannot leave
// them half-written
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn request(
        self: &Arc<Self>,
        id: Option<&str>,
        direction: Direction,
        forced: bool,
    ) -> Result<bool, CarouselError> {
        let mut outcome = Ok(None);
        self.state.send_if_modified(|state| {
            let target = match id {
                Some(id) => id.to_string(),
                None => match direction {
                    Direction::Right => state.next_id().to_string(),
                    Direction::Left => state.previous_id().to_string(),
                },
            };
            outcome = state.request(&target, forced.then_some(direction));
            matches!(outcome, Ok(Some(_)))
        });

        match outcome? {
            Some(timer) => {
                let state = self.state.borrow();
                debug!(
                    current = state.current(),
                    previous = ?state.previous(),
                    direction = ?state.direction(),
                    "carousel transition started"
                );
                drop(state);
                self.schedule(timer);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Spawn the phase timers of one transition.
    ///
    /// A transition can reach this point after a newer one has already been
    /// scheduled; the newer timer task is kept and the late one is discarded.
    fn schedule(self: &Arc<Self>, timer: PhaseTimer) {
        let token = timer.token;
        let shared = Arc::clone(self);
        let mut deadline = tokio::time::Instant::now();
        let handle = self.runtime.spawn(async move {
            let mut pending = Some(timer);
            while let Some(timer) = pending.take() {
                deadline += timer.delay;
                tokio::time::sleep_until(deadline).await;
                shared.state.send_if_modified(|state| {
                    let before = state.phase();
                    pending = state.fire(timer.token);
                    state.phase() != before
                });
                debug!(phase = ?shared.state.borrow().phase(), "carousel phase advanced");
            }
        });

        let mut slot = lock(&self.timer);
        let superseded = slot
            .as_ref()
            .is_some_and(|(current, _)| *current > token);
        if superseded {
            debug!(token, "discarding timer of superseded transition");
            handle.abort();
        } else if let Some((_, previous)) = slot.replace((token, handle)) {
            previous.abort();
        }
    }

    fn start_rotation(self: &Arc<Self>, period: Duration, direction: Direction) {
        let shared = Arc::downgrade(self);
        let start = tokio::time::Instant::now() + period;
        let handle = self.runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                // Ignored while a transition is still running
                let _ = shared.request(None, direction, true);
            }
        });

        let rotation = Rotation {
            period,
            direction,
            handle,
        };
        if let Some(previous) = lock(&self.rotation).replace(rotation) {
            previous.handle.abort();
        }
    }

    fn restart_rotation(self: &Arc<Self>) {
        let current = lock(&self.rotation)
            .as_ref()
            .map(|rotation| (rotation.period, rotation.direction));
        if let Some((period, direction)) = current {
            self.start_rotation(period, direction);
        }
    }

    fn stop_rotation(&self) {
        if let Some(rotation) = lock(&self.rotation).take() {
            rotation.handle.abort();
        }
    }

    fn cancel_timer(&self) {
        if let Some((_, timer)) = lock(&self.timer).take() {
            timer.abort();
        }
    }
}

/// Carousel instance. Dropping it cancels pending timers and autoplay.
pub struct Carousel {
    shared: Arc<Shared>,
}

impl Carousel {
    /// Create a carousel on the current tokio runtime.
    ///
    /// Autoplay starts immediately when `timing.rotation_interval_ms` is set.
    pub fn new(
        slides: Vec<String>,
        initial: Option<&str>,
        timing: &CarouselConfig,
    ) -> Result<Self, CarouselError> {
        let runtime = Handle::try_current().map_err(|_| CarouselError::NoRuntime)?;
        let state = CarouselState::new(slides, initial, timing)?;
        let (state, _rx) = watch::channel(state);

        let carousel = Self {
            shared: Arc::new(Shared {
                state,
                runtime,
                timer: Mutex::new(None),
                rotation: Mutex::new(None),
            }),
        };
        if let Some(period) = timing.rotation_interval() {
            carousel.set_rotation_interval(Some(period));
        }
        Ok(carousel)
    }

    pub fn state(&self) -> CarouselState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CarouselState> {
        self.shared.state.subscribe()
    }

    /// Move to `id`. Returns false if the request was ignored.
    ///
    /// `restart_interval` resets the autoplay countdown so a manual change is
    /// not immediately followed by an automatic one.
    pub fn set_current_item(
        &self,
        id: &str,
        direction: Option<Direction>,
        restart_interval: bool,
    ) -> Result<bool, CarouselError> {
        let started = self.shared.request(
            Some(id),
            direction.unwrap_or(Direction::Right),
            direction.is_some(),
        )?;
        if started && restart_interval {
            self.shared.restart_rotation();
        }
        Ok(started)
    }

    pub fn next(&self) -> bool {
        self.shared
            .request(None, Direction::Right, true)
            .unwrap_or(false)
    }

    pub fn previous(&self) -> bool {
        self.shared
            .request(None, Direction::Left, true)
            .unwrap_or(false)
    }

    /// Change the autoplay period. Restarts the interval only when the period changes.
    pub fn set_rotation_interval(&self, period: Option<Duration>) {
        self.set_rotation(period, Direction::Right);
    }

    /// Autoplay moving in `direction`
    pub fn set_rotation(&self, period: Option<Duration>, direction: Direction) {
        let unchanged = lock(&self.shared.rotation)
            .as_ref()
            .map(|rotation| (rotation.period, rotation.direction))
            == period.map(|p| (p, direction));
        if unchanged {
            return;
        }

        match period.filter(|p| !p.is_zero()) {
            Some(period) => {
                info!(?period, ?direction, "carousel rotation started");
                self.shared.start_rotation(period, direction);
            }
            None => {
                info!("carousel rotation stopped");
                self.shared.stop_rotation();
            }
        }
    }

    pub fn rotation_interval(&self) -> Option<Duration> {
        lock(&self.shared.rotation)
            .as_ref()
            .map(|rotation| rotation.period)
    }

    /// Replace the slide list
    pub fn set_slides(&self, slides: Vec<String>) -> Result<(), CarouselError> {
        let mut result = Ok(());
        self.shared.state.send_modify(|state| {
            result = state.set_slides(slides);
        });
        result
    }

    /// Abort pending phase timers and settle immediately
    pub fn cancel(&self) {
        self.shared.cancel_timer();
        self.shared.state.send_modify(CarouselState::cancel);
    }

    /// Wait until the in-flight transition, if any, has settled
    pub async fn settled(&self) -> CarouselState {
        let mut rx = self.subscribe();
        loop {
            {
                let state = rx.borrow_and_update();
                if !state.in_flight() {
                    return state.clone();
                }
            }
            if rx.changed().await.is_err() {
                return self.state();
            }
        }
    }
}

impl Drop for Carousel {
    fn drop(&mut self) {
        self.shared.stop_rotation();
        self.shared.cancel_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_late_timer_of_older_transition_is_discarded() {
        let carousel =
            Carousel::new(vec!["a".into(), "b".into()], None, &CarouselConfig::default())
                .unwrap();
        assert!(carousel.next());
        let token = carousel.state().generation();

        // An older transition that lost the race schedules its timers last
        carousel.shared.schedule(PhaseTimer {
            token: token - 1,
            delay: Duration::from_millis(50),
        });

        let settled = tokio::time::timeout(Duration::from_secs(5), carousel.settled())
            .await
            .expect("newer transition still settles");
        assert_eq!(settled.current(), "b");
        assert_eq!(settled.phase(), Phase::Idle);
        assert!(carousel.next());
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_timer_replaces_older_one() {
        let carousel =
            Carousel::new(vec!["a".into(), "b".into()], None, &CarouselConfig::default())
                .unwrap();
        carousel.shared.schedule(PhaseTimer {
            token: 0,
            delay: Duration::from_millis(50),
        });
        assert!(carousel.next());

        let stored = lock(&carousel.shared.timer).as_ref().map(|(token, _)| *token);
        assert_eq!(stored, Some(carousel.state().generation()));
        assert_eq!(carousel.settled().await.current(), "b");
    }
}
