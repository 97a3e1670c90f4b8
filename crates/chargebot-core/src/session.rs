//! Session state machine

use chargebot_api::{HolderInfo, Phase};
use chargebot_config::Timing;
use chargebot_util::{wall_clock_after, MonotonicInstant, UserId};
use chrono::{DateTime, Local};
use std::fmt;
use std::time::Duration;

use crate::TimerHandle;

/// Identifies one session instance. Never reused within a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which scheduled step a timer belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// End of the plug-in window
    GraceEnd,
    /// Pre-expiry warning
    Warning,
    /// End of the charge window
    Expiry,
}

/// Phase with the timestamp that belongs to it.
///
/// Holding the timestamps inside the variants keeps the grace deadline and the
/// charge start from ever being set together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Grace {
        ends_at: MonotonicInstant,
    },
    Charging {
        started_at: MonotonicInstant,
        warned: bool,
    },
}

impl SessionPhase {
    pub fn kind(&self) -> Phase {
        match self {
            SessionPhase::Grace { .. } => Phase::Grace,
            SessionPhase::Charging { .. } => Phase::Charging,
        }
    }
}

/// The single active holder of the charger
#[derive(Debug)]
pub struct Session {
    holder: UserId,
    phase: SessionPhase,
    generation: Generation,
    /// The one pending timer for this generation
    timer: Option<TimerHandle>,
}

impl Session {
    /// Start a session in its grace period
    pub fn new(
        holder: UserId,
        generation: Generation,
        now: MonotonicInstant,
        grace_period: Duration,
        timer: TimerHandle,
    ) -> Self {
        Self {
            holder,
            phase: SessionPhase::Grace {
                ends_at: now + grace_period,
            },
            generation,
            timer: Some(timer),
        }
    }

    pub fn holder(&self) -> &UserId {
        &self.holder
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn grace_ends_at(&self) -> Option<MonotonicInstant> {
        match self.phase {
            SessionPhase::Grace { ends_at } => Some(ends_at),
            SessionPhase::Charging { .. } => None,
        }
    }

    pub fn charge_started_at(&self) -> Option<MonotonicInstant> {
        match self.phase {
            SessionPhase::Charging { started_at, .. } => Some(started_at),
            SessionPhase::Grace { .. } => None,
        }
    }

    /// Whether a timer for `stage` is the one this session is waiting on
    pub fn awaits(&self, stage: Stage) -> bool {
        matches!(
            (stage, self.phase),
            (Stage::GraceEnd, SessionPhase::Grace { .. })
                | (Stage::Warning, SessionPhase::Charging { warned: false, .. })
                | (Stage::Expiry, SessionPhase::Charging { warned: true, .. })
        )
    }

    /// Grace -> Charging; `timer` is the warning timer
    pub fn begin_charging(&mut self, now: MonotonicInstant, timer: TimerHandle) {
        self.phase = SessionPhase::Charging {
            started_at: now,
            warned: false,
        };
        self.timer = Some(timer);
    }

    /// Record the warning; `timer` is the expiry timer
    pub fn mark_warned(&mut self, timer: TimerHandle) {
        if let SessionPhase::Charging { warned, .. } = &mut self.phase {
            *warned = true;
        }
        self.timer = Some(timer);
    }

    /// Cancel the pending timer. Later calls do nothing.
    pub fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    /// Time left in the current phase
    pub fn remaining(&self, timing: &Timing, now: MonotonicInstant) -> Duration {
        match self.phase {
            SessionPhase::Grace { ends_at } => ends_at.saturating_duration_until(now),
            SessionPhase::Charging { started_at, .. } => {
                (started_at + timing.charge_duration()).saturating_duration_until(now)
            }
        }
    }

    /// Holder view for status readers
    pub fn to_holder_info(
        &self,
        timing: &Timing,
        now: MonotonicInstant,
        wall_now: DateTime<Local>,
    ) -> HolderInfo {
        let remaining = self.remaining(timing, now);
        HolderInfo {
            user_id: self.holder.clone(),
            phase: self.phase.kind(),
            remaining,
            phase_ends_at: wall_clock_after(wall_now, remaining),
        }
    }
}
