//! Narrowcast scheduler.
//!
//! The default widget holds the screen for `defaults_before_widget` of its
//! own cycles, then one rotation widget gets a turn, after which the
//! default takes over again. The next rotation widget is told one default
//! cycle in advance (`pre_focus`) so it can fetch its data in time, and
//! the default is told again when it is about to come back.

use tracing::{debug, warn};

use crate::widgets::Widget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    ShowingDefault,
    /// Index into the rotation list
    ShowingRotation(usize),
}

pub struct Scheduler {
    defaults_before_widget: u32,
    default_widget: Option<Box<dyn Widget>>,
    widgets: Vec<Box<dyn Widget>>,
    current: Option<usize>,
    ticks: u32,
    state: SchedulerState,
}

impl Scheduler {
    /// `defaults_before_widget` is clamped to at least one cycle
    pub fn new(defaults_before_widget: u32) -> Self {
        Self {
            defaults_before_widget: defaults_before_widget.max(1),
            default_widget: None,
            widgets: Vec::new(),
            current: None,
            ticks: 0,
            state: SchedulerState::ShowingDefault,
        }
    }

    /// Install the default widget and let it start fetching
    pub fn set_default(&mut self, mut widget: Box<dyn Widget>) {
        widget.pre_focus();
        self.default_widget = Some(widget);
    }

    /// Append a widget to the rotation list
    pub fn schedule(&mut self, widget: Box<dyn Widget>) {
        self.widgets.push(widget);
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Name of the widget whose output is on screen
    pub fn active_name(&self) -> Option<&str> {
        if let SchedulerState::ShowingRotation(i) = self.state {
            // A rotation widget with nothing to show leaves the default visible
            if let Some(widget) = self.widgets.get(i).filter(|w| w.duration() > 0) {
                return Some(widget.name());
            }
        }
        self.default_widget.as_ref().map(|w| w.name())
    }

    fn next_rotation_index(&self) -> usize {
        match self.current {
            Some(i) => (i + 1) % self.widgets.len(),
            None => 0,
        }
    }

    pub fn tick(&mut self) {
        let Some(default_duration) = self.default_widget.as_ref().map(|w| w.duration()) else {
            warn!("Scheduler ticked without a default widget");
            return;
        };

        let d = self.defaults_before_widget;
        let default_span = d.saturating_mul(default_duration);

        if self.ticks == (d - 1).saturating_mul(default_duration) && !self.widgets.is_empty() {
            let next = self.next_rotation_index();
            debug!(widget = self.widgets[next].name(), "Pre-focusing rotation widget");
            self.widgets[next].pre_focus();
        } else if self.ticks == default_span {
            if !self.widgets.is_empty() {
                self.current = Some(self.next_rotation_index());
            }
            if let Some(default) = self.default_widget.as_mut() {
                default.pre_focus();
            }
        }

        if self.ticks < default_span {
            self.enter_default();
            if let Some(default) = self.default_widget.as_mut() {
                default.tick();
            }
            self.ticks += 1;
        } else if self.widgets.is_empty() || self.current.is_none() {
            self.enter_default();
            if let Some(default) = self.default_widget.as_mut() {
                default.tick();
            }
            self.ticks = wrap(self.ticks.saturating_add(1), default_span);
        } else {
            let index = self.current.unwrap_or(0);
            self.enter_rotation(index);

            let current = &mut self.widgets[index];
            let current_duration = current.duration();
            if current_duration > 0 {
                current.tick();
            } else if let Some(default) = self.default_widget.as_mut() {
                // Nothing to rotate in: keep the default picture moving
                default.tick();
            }
            self.ticks = wrap(
                self.ticks.saturating_add(1),
                default_span.saturating_add(current_duration),
            );
        }
    }

    fn enter_default(&mut self) {
        if let SchedulerState::ShowingRotation(i) = self.state {
            if let Some(widget) = self.widgets.get_mut(i) {
                widget.on_lose_focus();
            }
            if let Some(default) = self.default_widget.as_mut() {
                default.on_focus();
            }
            self.state = SchedulerState::ShowingDefault;
        }
    }

    fn enter_rotation(&mut self, index: usize) {
        if self.state == SchedulerState::ShowingRotation(index) {
            return;
        }
        if self.state == SchedulerState::ShowingDefault {
            if let Some(default) = self.default_widget.as_mut() {
                default.on_lose_focus();
            }
        }
        self.widgets[index].on_focus();
        self.state = SchedulerState::ShowingRotation(index);
    }
}

/// `value mod cycle`, with an empty cycle restarting at zero
fn wrap(value: u32, cycle: u32) -> u32 {
    value.checked_rem(cycle).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        duration: u32,
        log: Log,
    }

    impl Recorder {
        fn boxed(name: &'static str, duration: u32, log: &Log) -> Box<dyn Widget> {
            Box::new(Self {
                name,
                duration,
                log: Arc::clone(log),
            })
        }

        fn push(&self, what: &str) {
            self.log.lock().unwrap().push(format!("{}:{}", self.name, what));
        }
    }

    impl Widget for Recorder {
        fn name(&self) -> &str {
            self.name
        }
        fn on_focus(&mut self) {
            self.push("focus");
        }
        fn on_lose_focus(&mut self) {
            self.push("lose_focus");
        }
        fn pre_focus(&mut self) {
            self.push("pre_focus");
        }
        fn tick(&mut self) {
            self.push("tick");
        }
        fn duration(&self) -> u32 {
            self.duration
        }
    }

    fn count(log: &Log, entry: &str) -> usize {
        log.lock().unwrap().iter().filter(|e| *e == entry).count()
    }

    fn take(log: &Log) -> Vec<String> {
        std::mem::take(&mut *log.lock().unwrap())
    }

    #[test]
    fn test_rotation_widget_prefocused_once_then_shown() {
        let log = Log::default();
        let mut scheduler = Scheduler::new(2);
        scheduler.set_default(Recorder::boxed("photo", 3, &log));
        scheduler.schedule(Recorder::boxed("w0", 2, &log));
        scheduler.schedule(Recorder::boxed("w1", 2, &log));
        take(&log);

        // d*D default ticks
        for _ in 0..6 {
            scheduler.tick();
        }
        assert_eq!(count(&log, "w0:pre_focus"), 1);
        assert_eq!(count(&log, "w1:pre_focus"), 0);
        assert_eq!(count(&log, "photo:tick"), 6);
        assert_eq!(scheduler.state(), SchedulerState::ShowingDefault);
        take(&log);

        scheduler.tick();
        assert_eq!(scheduler.state(), SchedulerState::ShowingRotation(0));
        assert_eq!(scheduler.active_name(), Some("w0"));
        assert_eq!(
            take(&log),
            vec!["photo:pre_focus", "photo:lose_focus", "w0:focus", "w0:tick"]
        );

        scheduler.tick();
        assert_eq!(scheduler.ticks(), 0);

        scheduler.tick();
        assert_eq!(scheduler.state(), SchedulerState::ShowingDefault);
        assert_eq!(take(&log), vec!["w0:tick", "w0:lose_focus", "photo:focus", "photo:tick"]);
    }

    #[test]
    fn test_rotation_wraps_through_widgets() {
        let log = Log::default();
        let mut scheduler = Scheduler::new(1);
        scheduler.set_default(Recorder::boxed("photo", 2, &log));
        scheduler.schedule(Recorder::boxed("w0", 1, &log));
        scheduler.schedule(Recorder::boxed("w1", 1, &log));

        let mut shown = Vec::new();
        for _ in 0..9 {
            scheduler.tick();
            if let SchedulerState::ShowingRotation(i) = scheduler.state() {
                shown.push(i);
            }
        }
        assert_eq!(shown, vec![0, 1, 0]);
    }

    #[test]
    fn test_empty_rotation_list_keeps_default() {
        let log = Log::default();
        let mut scheduler = Scheduler::new(2);
        scheduler.set_default(Recorder::boxed("photo", 2, &log));

        for _ in 0..10 {
            scheduler.tick();
            assert_eq!(scheduler.state(), SchedulerState::ShowingDefault);
            assert!(scheduler.ticks() <= 4);
        }
        assert_eq!(count(&log, "photo:tick"), 10);
    }

    #[test]
    fn test_zero_duration_widget_ticks_default() {
        let log = Log::default();
        let mut scheduler = Scheduler::new(1);
        scheduler.set_default(Recorder::boxed("photo", 2, &log));
        scheduler.schedule(Recorder::boxed("empty", 0, &log));

        for _ in 0..3 {
            scheduler.tick();
        }
        assert_eq!(count(&log, "empty:tick"), 0);
        assert_eq!(count(&log, "photo:tick"), 3);
        assert_eq!(scheduler.state(), SchedulerState::ShowingRotation(0));
        assert_eq!(scheduler.active_name(), Some("photo"));
        // (d*D + 1) mod (d*D + 0)
        assert_eq!(scheduler.ticks(), 1);
    }

    #[test]
    fn test_zero_length_default_cycle_does_not_panic() {
        let log = Log::default();
        let mut scheduler = Scheduler::new(3);
        scheduler.set_default(Recorder::boxed("idle", 0, &log));

        for _ in 0..5 {
            scheduler.tick();
        }
        assert_eq!(scheduler.ticks(), 0);
    }

    #[test]
    fn test_tick_without_default_is_noop() {
        let mut scheduler = Scheduler::new(14);
        scheduler.tick();
        assert_eq!(scheduler.ticks(), 0);
        assert_eq!(scheduler.active_name(), None);
    }

    #[test]
    fn test_huge_default_count_does_not_overflow() {
        let log = Log::default();
        let mut scheduler = Scheduler::new(u32::MAX);
        scheduler.set_default(Recorder::boxed("photo", 20, &log));
        scheduler.schedule(Recorder::boxed("w0", 5, &log));

        for _ in 0..50 {
            scheduler.tick();
        }
        assert_eq!(scheduler.state(), SchedulerState::ShowingDefault);
        assert_eq!(scheduler.ticks(), 50);
        assert_eq!(count(&log, "w0:pre_focus"), 0);
    }
}
