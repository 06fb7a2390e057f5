#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Timed population changes replayed one frame at a time.
//!
//! The script is a FIFO of [`ScenarioEvent`] values. Each tick counts down the
//! head event's frame delay; when it reaches zero the event is dequeued and
//! its delta returned. Only the head event counts down, so an event with
//! delay `F` fires `F` ticks after its predecessor. The queue drains
//! monotonically and is never rewound.

use std::collections::VecDeque;

use gpumark_core::{Command, Event, PopulationDelta, ScenarioEvent};

/// Ordered queue of pending population changes.
#[derive(Clone, Debug, Default)]
pub struct ScenarioScript {
    pending: VecDeque<PendingEvent>,
}

#[derive(Clone, Copy, Debug)]
struct PendingEvent {
    remaining: u32,
    delta: PopulationDelta,
}

impl ScenarioScript {
    /// Creates a script that replays `events` in order.
    #[must_use]
    pub fn new(events: impl IntoIterator<Item = ScenarioEvent>) -> Self {
        Self {
            pending: events
                .into_iter()
                .map(|event| PendingEvent {
                    remaining: event.frames().get(),
                    delta: event.delta(),
                })
                .collect(),
        }
    }

    /// Advances the head event by one frame, returning its delta when it fires.
    ///
    /// Ticking an empty script is a no-op.
    pub fn tick(&mut self) -> Option<PopulationDelta> {
        let head = self.pending.front_mut()?;
        head.remaining = head.remaining.saturating_sub(1);
        if head.remaining > 0 {
            return None;
        }
        self.pending.pop_front().map(|event| event.delta)
    }

    /// Consumes world events and emits a target adjustment per fired event.
    ///
    /// Every [`Event::TimeAdvanced`] counts as one frame.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Command>) {
        for event in events {
            if !matches!(event, Event::TimeAdvanced { .. }) {
                continue;
            }
            if let Some(delta) = self.tick() {
                out.push(Command::AdjustTargetTotal { delta });
            }
        }
    }

    /// Number of events that have not fired yet.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Reports whether every event has fired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Ticks still required before the final event fires.
    #[must_use]
    pub fn frames_remaining(&self) -> u64 {
        self.pending
            .iter()
            .map(|event| u64::from(event.remaining))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;

    fn event(frames: u32, delta: PopulationDelta) -> ScenarioEvent {
        ScenarioEvent::new(NonZeroU32::new(frames).expect("non-zero delay"), delta)
    }

    #[test]
    fn head_fires_after_its_delay() {
        let mut script = ScenarioScript::new([event(3, PopulationDelta::add(10))]);

        assert_eq!(script.tick(), None);
        assert_eq!(script.tick(), None);
        assert_eq!(script.tick(), Some(PopulationDelta::add(10)));
        assert!(script.is_empty());
    }

    #[test]
    fn later_events_wait_for_the_head() {
        let mut script = ScenarioScript::new([
            event(1, PopulationDelta::add(1)),
            event(2, PopulationDelta::remove(1)),
        ]);

        assert_eq!(script.frames_remaining(), 3);
        assert_eq!(script.tick(), Some(PopulationDelta::add(1)));
        assert_eq!(script.tick(), None);
        assert_eq!(script.tick(), Some(PopulationDelta::remove(1)));
    }

    #[test]
    fn empty_script_ticks_are_noops() {
        let mut script = ScenarioScript::default();
        for _ in 0..10 {
            assert_eq!(script.tick(), None);
        }
        assert_eq!(script.len(), 0);
    }

    #[test]
    fn handle_ignores_events_other_than_time() {
        let mut script = ScenarioScript::new([event(1, PopulationDelta::add(5))]);
        let mut commands = Vec::new();

        script.handle(&[Event::ClockReset], &mut commands);
        assert!(commands.is_empty());
        assert_eq!(script.len(), 1);
    }
}
