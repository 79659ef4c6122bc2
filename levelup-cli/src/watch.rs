//! Periodic tick driver: overdue sweep + Reaper check on an interval.
//!
//! Each tick takes the state lock, reloads from disk, and flushes before
//! releasing it, so one-shot commands run in another terminal interleave
//! with ticks instead of overwriting them. Ctrl-C stops the loop.

use anyhow::Result;
use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::report;
use crate::state::open_session;

/// One tick: load, roll the day, sweep, consult the Reaper, flush.
pub fn tick_once(cfg: &Config, rng: &mut StdRng) -> Result<()> {
    let now = Utc::now();
    let (mut session, mut gateway) = open_session(cfg, now)?;
    let report = session.tick(now, rng);
    report::print_tick(&report);
    session.flush(&mut gateway);
    Ok(())
}

pub async fn run(cfg: &Config) -> Result<()> {
    let period = Duration::from_secs(cfg.watch.tick_seconds.max(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut rng = StdRng::from_entropy();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    println!("Watching quests every {}s (Ctrl-C to stop)", period.as_secs());

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = tick_once(cfg, &mut rng) {
                    warn!(error = %e, "tick failed");
                }
            }
            _ = &mut shutdown => {
                info!("watch stopped");
                break;
            }
        }
    }

    Ok(())
}
