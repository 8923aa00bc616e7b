// src/api/limits.rs — Per-caller rate limiting and monthly quota

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use chrono::{Datelike, Utc};

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    RateLimited,
    QuotaExceeded,
}

/// Counting collaborator consulted before every pipeline request.
pub trait UsageLimiter: Send + Sync {
    fn admit(&self, caller: &str) -> Admission;
}

#[derive(Debug)]
struct CallerWindow {
    window_start: Instant,
    in_window: u32,
    month: (i32, u32),
    in_month: u64,
}

/// Fixed one-minute window plus a calendar-month counter per caller.
///
/// A `requests_per_minute` of 0 disables the minute window.
#[derive(Debug)]
pub struct WindowLimiter {
    requests_per_minute: u32,
    monthly_quota: Option<u64>,
    callers: Mutex<HashMap<String, CallerWindow>>,
}

impl WindowLimiter {
    pub fn new(requests_per_minute: u32, monthly_quota: Option<u64>) -> Self {
        Self {
            requests_per_minute,
            monthly_quota,
            callers: Mutex::new(HashMap::new()),
        }
    }

    fn admit_at(&self, caller: &str, now: Instant, month: (i32, u32)) -> Admission {
        let Ok(mut callers) = self.callers.lock() else {
            tracing::error!("Limiter state poisoned; rejecting request");
            return Admission::RateLimited;
        };
        let entry = callers
            .entry(caller.to_string())
            .or_insert_with(|| CallerWindow {
                window_start: now,
                in_window: 0,
                month,
                in_month: 0,
            });

        if entry.month != month {
            entry.month = month;
            entry.in_month = 0;
        }
        if now.duration_since(entry.window_start) >= WINDOW {
            entry.window_start = now;
            entry.in_window = 0;
        }

        if let Some(quota) = self.monthly_quota {
            if entry.in_month >= quota {
                return Admission::QuotaExceeded;
            }
        }
        if self.requests_per_minute > 0 && entry.in_window >= self.requests_per_minute {
            return Admission::RateLimited;
        }

        entry.in_window += 1;
        entry.in_month += 1;
        Admission::Allowed
    }
}

impl UsageLimiter for WindowLimiter {
    fn admit(&self, caller: &str) -> Admission {
        let today = Utc::now();
        self.admit_at(caller, Instant::now(), (today.year(), today.month()))
    }
}

type LimiterKey = (u32, Option<u64>);

fn limiters() -> &'static Mutex<HashMap<LimiterKey, Arc<WindowLimiter>>> {
    static LIMITERS: OnceLock<Mutex<HashMap<LimiterKey, Arc<WindowLimiter>>>> = OnceLock::new();
    LIMITERS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Process-wide limiter for a tier, created on first use and shared afterwards.
pub fn limiter_for(requests_per_minute: u32, monthly_quota: Option<u64>) -> Arc<WindowLimiter> {
    let key = (requests_per_minute, monthly_quota);
    let mut map = match limiters().lock() {
        Ok(map) => map,
        Err(poisoned) => poisoned.into_inner(),
    };
    map.entry(key)
        .or_insert_with(|| {
            tracing::debug!(requests_per_minute, ?monthly_quota, "Limiter created");
            Arc::new(WindowLimiter::new(requests_per_minute, monthly_quota))
        })
        .clone()
}
