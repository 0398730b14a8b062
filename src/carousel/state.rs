//! Cross-fade carousel state machine.
//!
//! A transition moves through three phases:
//! `Idle -> TransitioningOut -> (fade delay) -> TransitioningIn -> (transition) -> Idle`.
//! Each transition gets a generation token; timers carrying an older token
//! are ignored, which is how pending phase changes are cancelled.

use std::time::Duration;

use serde::Serialize;

use super::CarouselError;
use crate::config::CarouselConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    /// New slide chosen, previous slide still fully visible
    TransitioningOut,
    /// Cross-fade running
    TransitioningIn,
}

/// A delayed phase change the driver must schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimer {
    pub token: u64,
    pub delay: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct CarouselState {
    slides: Vec<String>,
    current: String,
    previous: Option<String>,
    direction: Direction,
    phase: Phase,
    #[serde(skip)]
    generation: u64,
    #[serde(skip)]
    fade_delay: Duration,
    #[serde(skip)]
    transition: Duration,
}

impl CarouselState {
    /// Start on `initial`, or the first slide
    pub fn new(
        slides: Vec<String>,
        initial: Option<&str>,
        timing: &CarouselConfig,
    ) -> Result<Self, CarouselError> {
        let current = match initial {
            Some(id) if slides.iter().any(|s| s == id) => id.to_string(),
            Some(id) => return Err(CarouselError::UnknownSlide(id.to_string())),
            None => slides.first().cloned().ok_or(CarouselError::NoSlides)?,
        };
        Ok(Self {
            slides,
            current,
            previous: None,
            direction: Direction::Right,
            phase: Phase::Idle,
            generation: 0,
            fade_delay: timing.fade_delay(),
            transition: timing.transition(),
        })
    }

    pub fn slides(&self) -> &[String] {
        &self.slides
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Slide fading out, set while a transition is in flight
    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True during the short pause before the fade starts
    pub fn delaying(&self) -> bool {
        self.phase == Phase::TransitioningOut
    }

    pub fn in_flight(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.slides.iter().position(|s| s == id)
    }

    /// Begin a transition to `id`.
    ///
    /// Returns `Ok(None)` when the request is ignored: a transition is already
    /// in flight or `id` is already current. Without a forced direction it is
    /// inferred from the slides' relative order.
    pub fn request(
        &mut self,
        id: &str,
        direction: Option<Direction>,
    ) -> Result<Option<PhaseTimer>, CarouselError> {
        let target = self
            .index_of(id)
            .ok_or_else(|| CarouselError::UnknownSlide(id.to_string()))?;
        if self.in_flight() || id == self.current {
            return Ok(None);
        }

        let direction = direction.unwrap_or_else(|| match self.index_of(&self.current) {
            Some(current) if target < current => Direction::Left,
            _ => Direction::Right,
        });

        self.generation += 1;
        self.previous = Some(std::mem::replace(&mut self.current, id.to_string()));
        self.direction = direction;
        self.phase = Phase::TransitioningOut;

        Ok(Some(PhaseTimer {
            token: self.generation,
            delay: self.fade_delay,
        }))
    }

    /// Id of the slide after the current one, wrapping around
    pub fn next_id(&self) -> &str {
        let index = self.index_of(&self.current).unwrap_or(0);
        &self.slides[(index + 1) % self.slides.len()]
    }

    /// Id of the slide before the current one, wrapping around
    pub fn previous_id(&self) -> &str {
        let index = self.index_of(&self.current).unwrap_or(0);
        let len = self.slides.len();
        &self.slides[(index + len - 1) % len]
    }

    pub fn next(&mut self) -> Option<PhaseTimer> {
        let id = self.next_id().to_string();
        self.request(&id, Some(Direction::Right)).ok().flatten()
    }

    pub fn previous_slide(&mut self) -> Option<PhaseTimer> {
        let id = self.previous_id().to_string();
        self.request(&id, Some(Direction::Left)).ok().flatten()
    }

    /// Advance the phase a timer was scheduled for.
    ///
    /// Stale tokens are ignored. Returns the follow-up timer, if any.
    pub fn fire(&mut self, token: u64) -> Option<PhaseTimer> {
        if token != self.generation {
            return None;
        }
        match self.phase {
            Phase::TransitioningOut => {
                self.phase = Phase::TransitioningIn;
                Some(PhaseTimer {
                    token,
                    delay: self.transition,
                })
            }
            Phase::TransitioningIn => {
                self.settle();
                None
            }
            Phase::Idle => None,
        }
    }

    /// Invalidate pending timers and jump to the end of any transition
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.settle();
    }

    fn settle(&mut self) {
        self.phase = Phase::Idle;
        self.previous = None;
    }

    /// Replace the slide list. A current slide that disappeared resets to the first.
    pub fn set_slides(&mut self, slides: Vec<String>) -> Result<(), CarouselError> {
        let first = slides.first().cloned().ok_or(CarouselError::NoSlides)?;
        let keep_current = slides.iter().any(|s| *s == self.current);
        self.slides = slides;
        if !keep_current {
            self.cancel();
            self.current = first;
        }
        Ok(())
    }
}
