//! Simulated frontend that drives a scheduler the way an emulator loop would.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info};
use vibe_sched_core::{
    EventKind, Priority, SchedError, Scheduler, SchedulerStats, Timestamp,
};

use crate::config::{DriverConfig, DriverSettings};

/// Frames between on-screen status notifications.
const NOTIFY_EVERY_FRAMES: u64 = 60;

#[derive(Debug, Default)]
pub struct Counters {
    pub frames: AtomicU64,
    pub vblanks: AtomicU64,
    pub hblanks: AtomicU64,
    pub input_polls: AtomicU64,
    pub audio_bytes: AtomicU64,
    pub notices: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub dispatched: u64,
    pub frames: u64,
    pub vblanks: u64,
    pub hblanks: u64,
    pub input_polls: u64,
    pub audio_bytes: u64,
    pub notices: u64,
    pub stats: SchedulerStats,
}

pub struct Driver {
    scheduler: Scheduler,
    settings: DriverSettings,
    counters: Arc<Counters>,
}

impl Driver {
    pub fn new(cfg: &DriverConfig) -> Result<Self, SchedError> {
        let mut scheduler = Scheduler::new(cfg.scheduler.clone())?;
        let settings = cfg.driver.clone();
        let counters = Arc::new(Counters::default());

        register_subscribers(&mut scheduler, &counters);

        let frame = settings.frame_interval;
        scheduler.schedule_periodic(EventKind::VBlank, &[], Priority::Critical, frame, 0)?;
        scheduler.schedule_periodic(EventKind::HBlank, &[], Priority::Normal, frame, 0)?;
        scheduler.schedule_periodic(
            EventKind::InputPoll,
            &[],
            Priority::High,
            settings.input_interval,
            0,
        )?;
        let samples: Vec<u8> = (0..settings.audio_buffer).map(|i| i as u8).collect();
        scheduler.schedule_periodic(
            EventKind::AudioBuffer,
            &samples,
            Priority::Low,
            settings.audio_interval,
            0,
        )?;

        Ok(Self {
            scheduler,
            settings,
            counters,
        })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn load_at(&self, tick: u64) -> f32 {
        if self.settings.ramp {
            tick as f32 / self.settings.ticks.max(1) as f32
        } else {
            self.settings.load
        }
    }

    pub fn run(&mut self) -> RunSummary {
        let step = self.settings.step.max(1);
        let report_every = self.settings.report_interval.max(1);
        let mut dispatched = 0u64;
        let mut last_report: Timestamp = 0;

        for tick in 0..self.settings.ticks {
            let now = (tick + 1).saturating_mul(step);
            self.scheduler.set_system_load(self.load_at(tick));
            dispatched += u64::from(self.scheduler.tick(now, self.settings.budget));

            if now - last_report >= report_every {
                last_report = now;
                let purged = self.scheduler.purge();
                if purged > 0 {
                    debug!("Purged {purged} canceled event(s) at {now}");
                }
                report(now, &self.scheduler.stats());
            }
        }

        let summary = self.summary(dispatched);
        info!(
            "Finished {} ticks: {} frames, {} dispatched, {} dropped",
            summary.ticks, summary.frames, summary.dispatched, summary.stats.dropped
        );
        summary
    }

    fn summary(&self, dispatched: u64) -> RunSummary {
        let c = &self.counters;
        RunSummary {
            ticks: self.settings.ticks,
            dispatched,
            frames: c.frames.load(Ordering::Relaxed),
            vblanks: c.vblanks.load(Ordering::Relaxed),
            hblanks: c.hblanks.load(Ordering::Relaxed),
            input_polls: c.input_polls.load(Ordering::Relaxed),
            audio_bytes: c.audio_bytes.load(Ordering::Relaxed),
            notices: c.notices.load(Ordering::Relaxed),
            stats: self.scheduler.stats(),
        }
    }
}

fn report(now: Timestamp, stats: &SchedulerStats) {
    info!(
        "t={now}: {} queued, {} ev/window, avg {:?}/tick, {} dropped, {} periodic",
        stats.queued,
        stats.events_per_second,
        stats.avg_processing_time,
        stats.dropped,
        stats.periodic_active
    );
}

fn register_subscribers(scheduler: &mut Scheduler, counters: &Arc<Counters>) {
    // VBlank opens the next frame; FrameStart closes it right away.
    let c = Arc::clone(counters);
    scheduler.register_callback(EventKind::VBlank, move |_, ctx| {
        c.vblanks.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = ctx.schedule(EventKind::FrameStart, &[], Priority::High, 0) {
            debug!("Frame start not queued: {e}");
        }
    });

    let c = Arc::clone(counters);
    scheduler.register_callback(EventKind::FrameStart, move |_, ctx| {
        let frame = c.frames.fetch_add(1, Ordering::Relaxed) + 1;
        if let Err(e) = ctx.schedule(EventKind::FrameEnd, &frame.to_le_bytes(), Priority::Normal, 0)
        {
            debug!("Frame {frame} end not queued: {e}");
        }
        if frame % NOTIFY_EVERY_FRAMES == 0 {
            let text = format!("frame {frame}");
            if let Err(e) = ctx.schedule(EventKind::UiNotify, text.as_bytes(), Priority::Low, 0) {
                debug!("Notice for frame {frame} not queued: {e}");
            }
        }
    });

    let c = Arc::clone(counters);
    scheduler.register_callback(EventKind::HBlank, move |_, _| {
        c.hblanks.fetch_add(1, Ordering::Relaxed);
    });

    let c = Arc::clone(counters);
    scheduler.register_callback(EventKind::InputPoll, move |_, _| {
        c.input_polls.fetch_add(1, Ordering::Relaxed);
    });

    let c = Arc::clone(counters);
    scheduler.register_callback(EventKind::AudioBuffer, move |event, _| {
        c.audio_bytes
            .fetch_add(event.data().len() as u64, Ordering::Relaxed);
    });

    let c = Arc::clone(counters);
    scheduler.register_callback(EventKind::UiNotify, move |event, ctx| {
        c.notices.fetch_add(1, Ordering::Relaxed);
        debug!(
            "[{}] {}",
            ctx.now(),
            String::from_utf8_lossy(event.data())
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(ticks: u64) -> DriverConfig {
        let mut cfg = DriverConfig::default();
        cfg.driver.ticks = ticks;
        cfg
    }

    #[test]
    fn idle_run_renders_one_frame_per_tick() {
        let mut driver = Driver::new(&config(120)).unwrap();
        let summary = driver.run();

        assert_eq!(summary.vblanks, 120);
        assert_eq!(summary.frames, 120);
        assert_eq!(summary.hblanks, 120);
        assert_eq!(summary.input_polls, 120);
        assert_eq!(summary.notices, 2);
        assert_eq!(summary.audio_bytes, 60 * 512);
        assert_eq!(summary.stats.dropped, 0);
        assert_eq!(summary.stats.periodic_active, 4);
    }

    #[test]
    fn overload_defers_audio() {
        let mut cfg = config(60);
        cfg.driver.load = 1.0;
        let mut driver = Driver::new(&cfg).unwrap();
        let summary = driver.run();

        // Video keeps pace while Low audio is pushed back every tick.
        assert_eq!(summary.vblanks, 60);
        assert_eq!(summary.audio_bytes, 0);
        assert!(summary.stats.queued > 0);
    }

    #[test]
    fn tiny_queue_reports_drops() {
        let mut cfg = config(2);
        cfg.scheduler.queue_capacity = 4;
        cfg.driver.budget = 1;
        let mut driver = Driver::new(&cfg).unwrap();
        let summary = driver.run();

        // The first tick drains only the VBlank, whose FrameStart refills the
        // queue. On the second tick the VBlank, HBlank and input firings all
        // find it full; audio is not due again until the fourth tick.
        assert_eq!(summary.vblanks, 1);
        assert_eq!(summary.dispatched, 2);
        assert_eq!(summary.stats.dropped, 3);
    }
}
