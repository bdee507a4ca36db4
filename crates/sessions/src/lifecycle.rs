//! Session reset lifecycle — daily boundary + idle timeout, with
//! per-channel overrides (spec.md §4.9 supplement). Evaluated on every
//! inbound message; a stale session is reset to a fresh `FlowContext`
//! rather than patched in place.

use chrono::{DateTime, Utc};
use flowline_domain::config::LifecycleConfig;
use flowline_domain::trace::TraceEvent;

#[derive(Debug, Clone)]
pub enum ResetReason {
    DailyReset { hour: u8 },
    IdleTimeout { idle_minutes: u64 },
}

impl std::fmt::Display for ResetReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DailyReset { hour } => write!(f, "daily reset (hour={hour})"),
            Self::IdleTimeout { idle_minutes } => write!(f, "idle timeout ({idle_minutes}m)"),
        }
    }
}

pub struct LifecycleManager {
    config: LifecycleConfig,
}

impl LifecycleManager {
    pub fn new(config: LifecycleConfig) -> Self {
        Self { config }
    }

    /// Decide whether a session last touched at `updated_at` should be
    /// reset, given the channel the inbound message arrived on.
    pub fn should_reset(&self, updated_at: DateTime<Utc>, channel: &str, now: DateTime<Utc>) -> Option<ResetReason> {
        let (daily_hour, idle_minutes) = self.config.resolve_params(channel);

        if let Some(hour) = daily_hour {
            if crossed_daily_boundary(updated_at, now, hour) {
                return Some(ResetReason::DailyReset { hour });
            }
        }

        if let Some(idle) = idle_minutes {
            let elapsed = now.signed_duration_since(updated_at).num_minutes();
            if elapsed >= idle as i64 {
                return Some(ResetReason::IdleTimeout { idle_minutes: idle });
            }
        }

        None
    }

    pub fn emit_reset(&self, session_key: &str, old_session_id: &str, new_session_id: &str, reason: &ResetReason) {
        TraceEvent::SessionReset {
            session_key: session_key.to_string(),
            old_session_id: old_session_id.to_string(),
            new_session_id: new_session_id.to_string(),
            reason: reason.to_string(),
        }
        .emit();
    }
}

/// Whether the daily boundary at `hour` was crossed between
/// `last_active` and `now`.
fn crossed_daily_boundary(last_active: DateTime<Utc>, now: DateTime<Utc>, hour: u8) -> bool {
    if now.signed_duration_since(last_active).num_seconds() < 60 {
        return false;
    }

    let Some(today_boundary) = now.date_naive().and_hms_opt(hour as u32, 0, 0) else {
        return false;
    };
    let today_boundary = today_boundary.and_utc();

    let boundary = if now >= today_boundary { today_boundary } else { today_boundary - chrono::Duration::days(1) };

    last_active < boundary && now >= boundary
}
