//! Debounce / aggregation / cancellation (C10, spec §4.8): one LLM turn
//! per burst of inbound messages, no lost content, at most one reply.
//!
//! Each inbound message bumps the session's cancellation epoch (`epoch`
//! module) and starts a wait loop holding that epoch value. A later
//! message bumps the epoch again, which is how an older worker notices
//! it has been superseded without any direct communication between
//! workers — the store is the only thing they share.

use crate::buffer::{BufferedMessage, InboundBuffer};
use crate::epoch::CancellationEpoch;
use flowline_domain::trace::TraceEvent;
use flowline_domain::Error;
use rand::Rng;
use std::time::Duration;

const MIN_WAIT_MS: u64 = 100;
const MAX_WAIT_MS: u64 = 120_000;

#[derive(Debug, Clone)]
pub enum DebounceOutcome {
    /// This worker lost the race; a newer message superseded it. It
    /// must produce no user-visible output.
    Superseded,
    /// This worker won: the full burst, in order, plus the epoch it
    /// must keep re-checking at the turn runner's later checkpoints.
    ProcessAggregated { messages: Vec<BufferedMessage>, held_epoch: i64, pre_reply_delay: Duration },
}

pub struct DebounceManager {
    buffer: InboundBuffer,
    epoch: CancellationEpoch,
    check_interval: Duration,
}

impl DebounceManager {
    pub fn new(buffer: InboundBuffer, epoch: CancellationEpoch, check_interval: Duration) -> Self {
        Self { buffer, epoch, check_interval }
    }

    /// Clamp a tenant-configured `wait_ms` to the protocol's bounds
    /// (spec §4.8 step 2: "bounded 100 ms … 120 s").
    pub fn clamp_wait_ms(wait_ms: u64) -> u64 {
        wait_ms.clamp(MIN_WAIT_MS, MAX_WAIT_MS)
    }

    /// Append one inbound message and run this worker's inactivity
    /// wait loop to completion. Returns `Superseded` as soon as a
    /// newer message is detected; otherwise waits the full `wait_ms`
    /// and returns the aggregated burst.
    pub async fn handle_inbound(
        &self,
        session_id: &str,
        message_id: impl Into<String>,
        content: impl Into<String>,
        wait_ms: u64,
        delay_variance_percent: u32,
    ) -> Result<DebounceOutcome, Error> {
        self.buffer.append(session_id, message_id, content).await?;
        let held_epoch = self.epoch.bump(session_id).await?;
        let wait_ms = Self::clamp_wait_ms(wait_ms);

        let mut elapsed = Duration::ZERO;
        let wait = Duration::from_millis(wait_ms);
        loop {
            if self.epoch.is_cancelled(session_id, held_epoch).await? {
                TraceEvent::BurstSuperseded {
                    session_key: session_id.to_string(),
                    worker_epoch: held_epoch.max(0) as u64,
                    current_epoch: self.epoch.current(session_id).await?.max(0) as u64,
                }
                .emit();
                return Ok(DebounceOutcome::Superseded);
            }
            if elapsed >= wait {
                break;
            }
            let tick = self.check_interval.min(wait - elapsed);
            tokio::time::sleep(tick).await;
            elapsed += tick;
        }

        if self.epoch.is_cancelled(session_id, held_epoch).await? {
            return Ok(DebounceOutcome::Superseded);
        }

        let messages = self.buffer.drain(session_id).await?;
        TraceEvent::BurstAggregated { session_key: session_id.to_string(), message_count: messages.len(), wait_ms }.emit();

        let pre_reply_delay = jittered_delay(wait_ms, delay_variance_percent);
        Ok(DebounceOutcome::ProcessAggregated { messages, held_epoch, pre_reply_delay })
    }
}

/// `final_delay = wait_ms × (1 + U(−v, +v))` where `v =
/// delay_variance_percent / 100` (spec §4.8 step 3).
fn jittered_delay(wait_ms: u64, delay_variance_percent: u32) -> Duration {
    let v = delay_variance_percent as f64 / 100.0;
    let jitter = rand::thread_rng().gen_range(-v..=v);
    let factor = (1.0 + jitter).max(0.0);
    Duration::from_millis((wait_ms as f64 * factor) as u64)
}
