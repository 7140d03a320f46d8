//! Button debouncing, combo arbitration and long-hold detection.
//!
//! Everything here is driven by explicit `now_ms` timestamps and owned by a single task, so
//! none of it needs a lock.

use crate::{config::InputConfig, types::Button};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    /// The raw level differs from the stable one; `from_pressed` is the stable level.
    PendingEdge { since_ms: u64, from_pressed: bool },
    Held,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Pressed,
    Released,
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    debounce_ms: u64,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            state: DebounceState::Idle,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn is_pressed(&self) -> bool {
        match self.state {
            DebounceState::Held => true,
            DebounceState::PendingEdge { from_pressed, .. } => from_pressed,
            DebounceState::Idle => false,
        }
    }

    /// Feeds one raw level sample. Emits an edge once the new level has been stable for longer
    /// than the debounce delay.
    pub fn sample(&mut self, raw_pressed: bool, now_ms: u64) -> Option<Edge> {
        match self.state {
            DebounceState::Idle if raw_pressed => {
                self.state = DebounceState::PendingEdge {
                    since_ms: now_ms,
                    from_pressed: false,
                };
                None
            }
            DebounceState::Held if !raw_pressed => {
                self.state = DebounceState::PendingEdge {
                    since_ms: now_ms,
                    from_pressed: true,
                };
                None
            }
            DebounceState::PendingEdge {
                since_ms,
                from_pressed,
            } => {
                if raw_pressed == from_pressed {
                    // Bounced back before settling.
                    self.state = if from_pressed {
                        DebounceState::Held
                    } else {
                        DebounceState::Idle
                    };
                    return None;
                }
                if now_ms.saturating_sub(since_ms) <= self.debounce_ms {
                    return None;
                }
                if from_pressed {
                    self.state = DebounceState::Idle;
                    Some(Edge::Released)
                } else {
                    self.state = DebounceState::Held;
                    Some(Edge::Pressed)
                }
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Single(Button),
    /// Both buttons down within the combo window.
    Combo,
}

#[derive(Debug, Clone, Copy)]
struct PendingPress {
    button: Button,
    deadline_ms: u64,
}

/// Two debounced buttons with combo suppression.
///
/// A confirmed press is not reported immediately. The panel waits the combo window and then
/// checks the other button: if it is down too, the gesture is a combo and no single press is
/// emitted for either button. Once a gesture has fired, further presses are ignored until both
/// buttons are released, so one gesture never yields a single and a combo.
#[derive(Debug, Clone)]
pub struct ButtonPanel {
    buttons: [Debouncer; 2],
    combo_window_ms: u64,
    pending: Option<PendingPress>,
    gesture_active: bool,
}

impl ButtonPanel {
    pub fn new(config: &InputConfig) -> Self {
        Self {
            buttons: [
                Debouncer::new(config.debounce_ms),
                Debouncer::new(config.debounce_ms),
            ],
            combo_window_ms: config.combo_window_ms,
            pending: None,
            gesture_active: false,
        }
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons[button.index()].is_pressed()
    }

    pub fn both_pressed(&self) -> bool {
        self.is_pressed(Button::Up) && self.is_pressed(Button::Down)
    }

    pub fn poll(&mut self, raw_up: bool, raw_down: bool, now_ms: u64) -> Option<ButtonEvent> {
        for (button, raw) in [(Button::Up, raw_up), (Button::Down, raw_down)] {
            let edge = self.buttons[button.index()].sample(raw, now_ms);
            if edge == Some(Edge::Pressed) && !self.gesture_active && self.pending.is_none() {
                self.pending = Some(PendingPress {
                    button,
                    deadline_ms: now_ms.saturating_add(self.combo_window_ms),
                });
            }
        }

        if self.gesture_active && !self.is_pressed(Button::Up) && !self.is_pressed(Button::Down) {
            self.gesture_active = false;
        }

        let pending = self.pending?;
        if now_ms < pending.deadline_ms {
            return None;
        }
        self.pending = None;
        self.gesture_active = true;

        if self.is_pressed(pending.button.other()) {
            Some(ButtonEvent::Combo)
        } else {
            Some(ButtonEvent::Single(pending.button))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldState {
    Idle,
    Holding { since_ms: u64 },
    /// Fired for the current gesture; waits for release.
    Sent,
}

/// Fires once per gesture when both buttons stay down for the hold duration.
#[derive(Debug, Clone)]
pub struct HoldDetector {
    hold_duration_ms: u64,
    state: HoldState,
}

impl HoldDetector {
    pub fn new(hold_duration_ms: u64) -> Self {
        Self {
            hold_duration_ms,
            state: HoldState::Idle,
        }
    }

    pub fn state(&self) -> HoldState {
        self.state
    }

    pub fn sample(&mut self, both_held: bool, now_ms: u64) -> bool {
        if !both_held {
            self.state = HoldState::Idle;
            return false;
        }

        match self.state {
            HoldState::Idle => {
                self.state = HoldState::Holding { since_ms: now_ms };
                false
            }
            HoldState::Holding { since_ms }
                if now_ms.saturating_sub(since_ms) >= self.hold_duration_ms =>
            {
                self.state = HoldState::Sent;
                true
            }
            HoldState::Holding { .. } | HoldState::Sent => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TICK_MS: u64 = 10;

    fn panel() -> ButtonPanel {
        ButtonPanel::new(&InputConfig::default())
    }

    /// Polls the panel every tick for `duration_ms`, collecting emitted events.
    fn drive(
        panel: &mut ButtonPanel,
        now: &mut u64,
        duration_ms: u64,
        up: bool,
        down: bool,
    ) -> Vec<ButtonEvent> {
        let mut events = Vec::new();
        let end = *now + duration_ms;
        while *now < end {
            if let Some(event) = panel.poll(up, down, *now) {
                events.push(event);
            }
            *now += TICK_MS;
        }
        events
    }

    #[test]
    fn press_confirmed_after_debounce_delay() {
        let mut debouncer = Debouncer::new(50);
        assert_eq!(debouncer.sample(true, 0), None);
        assert_eq!(debouncer.sample(true, 40), None);
        assert_eq!(debouncer.sample(true, 50), None);
        assert_eq!(debouncer.sample(true, 60), Some(Edge::Pressed));
        assert_eq!(debouncer.sample(true, 70), None);
        assert_eq!(debouncer.state(), DebounceState::Held);
    }

    #[test]
    fn bounce_restarts_the_debounce_timer() {
        let mut debouncer = Debouncer::new(50);
        debouncer.sample(true, 0);
        debouncer.sample(false, 20);
        assert_eq!(debouncer.state(), DebounceState::Idle);

        debouncer.sample(true, 30);
        assert_eq!(debouncer.sample(true, 80), None);
        assert_eq!(debouncer.sample(true, 90), Some(Edge::Pressed));
    }

    #[test]
    fn release_is_debounced_too() {
        let mut debouncer = Debouncer::new(50);
        debouncer.sample(true, 0);
        debouncer.sample(true, 60);

        assert_eq!(debouncer.sample(false, 100), None);
        assert!(debouncer.is_pressed());
        assert_eq!(debouncer.sample(false, 150), None);
        assert_eq!(debouncer.sample(false, 160), Some(Edge::Released));
        assert!(!debouncer.is_pressed());
    }

    #[test]
    fn single_press_fires_once_after_combo_window() {
        let mut panel = panel();
        let mut now = 0;

        let events = drive(&mut panel, &mut now, 1_000, true, false);
        assert_eq!(events, vec![ButtonEvent::Single(Button::Up)]);

        let events = drive(&mut panel, &mut now, 200, false, false);
        assert!(events.is_empty());
    }

    #[test]
    fn quick_tap_still_counts_as_single() {
        let mut panel = panel();
        let mut now = 0;

        let mut events = drive(&mut panel, &mut now, 80, false, true);
        events.extend(drive(&mut panel, &mut now, 400, false, false));

        assert_eq!(events, vec![ButtonEvent::Single(Button::Down)]);
    }

    #[test]
    fn simultaneous_press_is_only_a_combo() {
        let mut panel = panel();
        let mut now = 0;

        let mut events = drive(&mut panel, &mut now, 30, true, false);
        events.extend(drive(&mut panel, &mut now, 600, true, true));
        events.extend(drive(&mut panel, &mut now, 100, true, false));
        events.extend(drive(&mut panel, &mut now, 300, false, false));

        assert_eq!(events, vec![ButtonEvent::Combo]);
    }

    #[test]
    fn presses_after_combo_release_are_singles_again() {
        let mut panel = panel();
        let mut now = 0;

        let mut events = drive(&mut panel, &mut now, 400, true, true);
        events.extend(drive(&mut panel, &mut now, 200, false, false));
        events.extend(drive(&mut panel, &mut now, 400, false, true));

        assert_eq!(
            events,
            vec![ButtonEvent::Combo, ButtonEvent::Single(Button::Down)]
        );
    }

    #[test]
    fn second_press_inside_combo_window_is_a_combo() {
        let window = InputConfig::default().combo_window_ms;
        let mut panel = panel();
        let mut now = 0;

        let mut events = drive(&mut panel, &mut now, window - TICK_MS, true, false);
        events.extend(drive(&mut panel, &mut now, 400, true, true));
        events.extend(drive(&mut panel, &mut now, 300, false, false));

        assert_eq!(events, vec![ButtonEvent::Combo]);
    }

    #[test]
    fn second_press_after_combo_window_leaves_the_single() {
        let window = InputConfig::default().combo_window_ms;
        let mut panel = panel();
        let mut now = 0;

        let mut events = drive(&mut panel, &mut now, window + TICK_MS, true, false);
        events.extend(drive(&mut panel, &mut now, 600, true, true));
        events.extend(drive(&mut panel, &mut now, 300, false, false));

        assert_eq!(events, vec![ButtonEvent::Single(Button::Up)]);
    }

    #[test]
    fn press_at_exact_debounce_delay_is_not_confirmed() {
        let mut debouncer = Debouncer::new(50);
        debouncer.sample(true, 100);
        assert_eq!(debouncer.sample(true, 150), None);
        assert_eq!(debouncer.sample(true, 151), Some(Edge::Pressed));
    }

    #[test]
    fn hold_fires_once_per_gesture() {
        let mut detector = HoldDetector::new(1_000);
        let mut fired = 0;

        for now in (0..=3_000).step_by(10) {
            if detector.sample(true, now) {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
        assert_eq!(detector.state(), HoldState::Sent);

        detector.sample(false, 3_010);
        assert_eq!(detector.state(), HoldState::Idle);
    }

    #[test]
    fn short_hold_does_not_fire() {
        let mut detector = HoldDetector::new(1_000);
        for now in (0..990).step_by(10) {
            assert!(!detector.sample(true, now));
        }
        assert!(!detector.sample(false, 990));
        assert!(!detector.sample(true, 1_000));
    }

    #[test]
    fn both_buttons_held_sends_once_and_again_after_rehold() {
        let config = InputConfig::default();
        let mut up = Debouncer::new(config.debounce_ms);
        let mut down = Debouncer::new(config.debounce_ms);
        let mut detector = HoldDetector::new(config.hold_duration_ms);
        let mut sends = 0;
        let mut now = 0;

        let mut run = |raw: bool, duration_ms: u64, now: &mut u64, sends: &mut u32| {
            let end = *now + duration_ms;
            while *now < end {
                up.sample(raw, *now);
                down.sample(raw, *now);
                if detector.sample(up.is_pressed() && down.is_pressed(), *now) {
                    *sends += 1;
                }
                *now += TICK_MS;
            }
        };

        run(true, 1_100, &mut now, &mut sends);
        assert_eq!(sends, 1);
        run(true, 2_000, &mut now, &mut sends);
        assert_eq!(sends, 1);

        run(false, 200, &mut now, &mut sends);
        run(true, 1_100, &mut now, &mut sends);
        assert_eq!(sends, 2);
    }
}
