use crate::event::Priority;
use crate::queue::EventQueue;

pub const DEFAULT_HIGH_LOAD_THRESHOLD: f32 = 0.8;
pub const DEFAULT_LOW_PRIORITY_DEFERRAL: u64 = 50;

/// Load-adaptive due-time adjustment.
///
/// Above the threshold, Low events are pushed further out and Critical events
/// become due immediately. This is triage, not admission control: a full
/// queue still rejects new events no matter what the load is.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoadRegulator {
    threshold: f32,
    low_deferral: u64,
}

impl Default for LoadRegulator {
    fn default() -> Self {
        Self::new(DEFAULT_HIGH_LOAD_THRESHOLD, DEFAULT_LOW_PRIORITY_DEFERRAL)
    }
}

impl LoadRegulator {
    pub fn new(threshold: f32, low_deferral: u64) -> Self {
        Self {
            threshold: clamp_load(threshold),
            low_deferral,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn low_deferral(&self) -> u64 {
        self.low_deferral
    }

    /// Whether `load` (after clamping) is strictly above the threshold.
    pub fn is_overloaded(&self, load: f32) -> bool {
        clamp_load(load) > self.threshold
    }

    /// Adjusts due times for `load`, then rebuilds the heap.
    ///
    /// The rebuild runs even below the threshold.
    pub fn adapt(&self, queue: &mut EventQueue, load: f32) {
        let now = queue.now();
        let overloaded = self.is_overloaded(load);
        let store = queue.store_mut();

        if overloaded {
            for item in store.iter_mut() {
                match item.priority {
                    Priority::Low => item.due = item.due.saturating_add(self.low_deferral),
                    Priority::Critical => item.due = now,
                    Priority::Normal | Priority::High => {}
                }
            }
        }

        store.rebuild();
    }
}

/// Clamps a load sample to `[0.0, 1.0]`. NaN reads as idle.
pub fn clamp_load(load: f32) -> f32 {
    if load.is_nan() {
        0.0
    } else {
        load.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    fn loaded_queue() -> EventQueue {
        let mut q = EventQueue::new(16).unwrap();
        q.update(100);
        q.push(EventKind::AudioBuffer, &[], Priority::Low, 10).unwrap();
        q.push(EventKind::Timed, &[], Priority::Normal, 20).unwrap();
        q.push(EventKind::HBlank, &[], Priority::High, 30).unwrap();
        q.push(EventKind::VBlank, &[], Priority::Critical, 40).unwrap();
        q
    }

    fn due_of(q: &EventQueue, kind: EventKind) -> u64 {
        q.items().find(|i| i.event.kind == kind).unwrap().due
    }

    #[test]
    fn clamp_handles_out_of_range_and_nan() {
        assert_eq!(clamp_load(-1.0), 0.0);
        assert_eq!(clamp_load(3.5), 1.0);
        assert_eq!(clamp_load(f32::NAN), 0.0);
        assert_eq!(clamp_load(0.5), 0.5);
    }

    #[test]
    fn high_load_defers_low_and_expedites_critical() {
        let mut q = loaded_queue();
        LoadRegulator::default().adapt(&mut q, 0.95);

        assert_eq!(due_of(&q, EventKind::AudioBuffer), 160);
        assert_eq!(due_of(&q, EventKind::Timed), 120);
        assert_eq!(due_of(&q, EventKind::HBlank), 130);
        assert_eq!(due_of(&q, EventKind::VBlank), 100);
        assert!(q.validate());
        assert_eq!(q.pop().unwrap().kind, EventKind::VBlank);
    }

    #[test]
    fn threshold_is_strict() {
        let mut q = loaded_queue();
        LoadRegulator::default().adapt(&mut q, 0.8);
        assert_eq!(due_of(&q, EventKind::AudioBuffer), 110);
        assert_eq!(due_of(&q, EventKind::VBlank), 140);
    }

    #[test]
    fn construction_clamps_threshold() {
        let reg = LoadRegulator::new(1.5, 7);
        assert_eq!(reg.threshold(), 1.0);
        assert_eq!(reg.low_deferral(), 7);
        assert!(!reg.is_overloaded(1.0));

        let reg = LoadRegulator::default();
        assert_eq!(reg.threshold(), DEFAULT_HIGH_LOAD_THRESHOLD);
        assert_eq!(reg.low_deferral(), DEFAULT_LOW_PRIORITY_DEFERRAL);
    }

    #[test]
    fn overload_above_one_is_clamped_not_amplified() {
        let mut q = loaded_queue();
        LoadRegulator::new(0.8, 7).adapt(&mut q, 42.0);
        assert_eq!(due_of(&q, EventKind::AudioBuffer), 117);
    }
}
