use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::model::{PageTime, ScriptMap, SlideNumber};
use crate::service::task::Task;

const TICK: Duration = Duration::from_secs(1);

pub type SharedTracker = Arc<Mutex<SlideTimeTracker>>;

/// Per-slide elapsed time, advanced one second per [SlideTimeTracker::tick] while running.
///
/// The active slide's time lives in `current`; every other slide keeps its last snapshot in `recorded`.
#[derive(Debug, Clone)]
pub struct SlideTimeTracker {
    running: bool,
    total: u64,
    active: SlideNumber,
    current: u64,
    recorded: BTreeMap<SlideNumber, u64>,
}

impl SlideTimeTracker {
    pub fn new(active: SlideNumber) -> Self {
        Self {
            running: false,
            total: 0,
            active,
            current: 0,
            recorded: BTreeMap::new(),
        }
    }

    /// Seeds the tracker with the durations stored in `slides`. The total starts as their sum.
    pub fn from_durations(slides: &ScriptMap, active: SlideNumber) -> Self {
        let recorded: BTreeMap<_, _> = slides
            .iter()
            .map(|(&slide, page)| (slide, page.duration))
            .collect();

        Self {
            running: false,
            total: recorded.values().sum(),
            active,
            current: recorded.get(&active).copied().unwrap_or(0),
            recorded,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Counts one second for the active slide and the total. Does nothing while stopped.
    pub fn tick(&mut self) -> bool {
        if !self.running {
            return false;
        }

        self.total += 1;
        self.current += 1;
        true
    }

    pub fn elapsed(&self, slide: SlideNumber) -> PageTime {
        let seconds = if slide == self.active {
            self.current
        } else {
            self.recorded.get(&slide).copied().unwrap_or(0)
        };

        PageTime::from_seconds(seconds)
    }

    /// Overwrites one slide's time, keeping the total consistent.
    pub fn set_elapsed(&mut self, slide: SlideNumber, time: PageTime) {
        let seconds = time.total_seconds();
        let previous = if slide == self.active {
            std::mem::replace(&mut self.current, seconds)
        } else {
            self.recorded.insert(slide, seconds).unwrap_or(0)
        };

        self.total = self.total.saturating_sub(previous) + seconds;
    }

    /// Stores the outgoing slide's time and loads the time recorded for `slide`.
    pub fn switch_to(&mut self, slide: SlideNumber) {
        self.checkpoint();
        self.active = slide;
        self.current = self.recorded.get(&slide).copied().unwrap_or(0);
    }

    /// Records the active slide's time and returns it in seconds.
    pub fn checkpoint(&mut self) -> (SlideNumber, u64) {
        self.recorded.insert(self.active, self.current);
        (self.active, self.current)
    }

    /// Stops the timer and zeroes the total and every slide.
    pub fn reset_all(&mut self) {
        self.running = false;
        self.total = 0;
        self.current = 0;
        self.recorded.values_mut().for_each(|seconds| *seconds = 0);
    }

    /// Every known slide's time, the still-open active slide included.
    pub fn durations(&self) -> BTreeMap<SlideNumber, PageTime> {
        let mut durations: BTreeMap<_, _> = self
            .recorded
            .iter()
            .map(|(&slide, &seconds)| (slide, PageTime::from_seconds(seconds)))
            .collect();
        durations.insert(self.active, PageTime::from_seconds(self.current));

        durations
    }

    pub fn total(&self) -> PageTime {
        PageTime::from_seconds(self.total)
    }
}

/// Ticks `tracker` once per second until the returned task is stopped.
pub fn spawn_ticker(tracker: SharedTracker) -> Task {
    Task::spawn(|mut stop| async move {
        let mut interval = interval_at(Instant::now() + TICK, TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    tracker.lock().await.tick();
                }
                _ = &mut stop => break,
            }
        }
    })
}
