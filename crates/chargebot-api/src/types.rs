//! Shared types for the chargebot API

use chargebot_util::{format_remaining, UserId};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Phase of the current holder's session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Charger reserved, charge clock not started yet
    Grace,
    /// Charge clock running
    Charging,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Grace => "reserved",
            Phase::Charging => "charging",
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEndReason {
    /// Charge window ran out
    Expired,
    /// Holder released the charger
    EndedEarly,
}

/// The holder as seen by status readers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderInfo {
    pub user_id: UserId,
    pub phase: Phase,
    /// Time left in the current phase (grace or charge window)
    pub remaining: Duration,
    /// Wall-clock time the current phase ends (display only)
    pub phase_ends_at: DateTime<Local>,
}

/// Configured session timings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingInfo {
    pub grace_period: Duration,
    pub charge_duration: Duration,
    pub warning_lead: Duration,
}

/// Point-in-time view of the charger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub api_version: u32,
    pub holder: Option<HolderInfo>,
    /// Queue in promotion order
    pub waitlist: Vec<UserId>,
    pub timing: TimingInfo,
}

impl StatusSnapshot {
    pub fn is_free(&self) -> bool {
        self.holder.is_none()
    }

    /// 1-based queue position of `user_id`
    pub fn position_of(&self, user_id: &UserId) -> Option<usize> {
        self.waitlist.iter().position(|u| u == user_id).map(|i| i + 1)
    }

    /// Multi-line human summary, as shown by the status command
    pub fn summary(&self) -> String {
        let mut msg = match &self.holder {
            Some(holder) => match holder.phase {
                Phase::Grace => format!(
                    "🔌 The charger is reserved for {} (plug-in window {}).",
                    holder.user_id,
                    format_remaining(holder.remaining)
                ),
                Phase::Charging => format!(
                    "🔋 {} is currently charging. {} remaining.",
                    holder.user_id,
                    format_remaining(holder.remaining)
                ),
            },
            None => "🟢 The charger is currently available.".to_string(),
        };

        if !self.waitlist.is_empty() {
            msg.push_str("\n📋 Queue:");
            for (i, user) in self.waitlist.iter().enumerate() {
                msg.push_str(&format!("\n{}. {}", i + 1, user));
            }
        }

        msg
    }
}

/// What a requester is being told
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoticeKind {
    /// Checked in directly; the plug-in window is open
    GraceStarted { grace_period: Duration },
    /// Plug-in window is over, the charge clock is running
    ChargeStarted { charge_duration: Duration },
    /// Charge window ends soon
    Warning { minutes_left: u64 },
    /// Session is over
    SessionEnded { reason: SessionEndReason },
    /// Promoted from the queue; the plug-in window is open
    ResourceAvailable { grace_period: Duration },
}

impl NoticeKind {
    /// User-facing text
    pub fn message(&self) -> String {
        match self {
            NoticeKind::GraceStarted { grace_period } => format!(
                "🟢 You're checked in. Connect your car within {} minutes.",
                grace_period.as_secs().div_ceil(60)
            ),
            NoticeKind::ChargeStarted { charge_duration } => format!(
                "⏱️ Your {}-minute charging session has started.",
                charge_duration.as_secs().div_ceil(60)
            ),
            NoticeKind::Warning { minutes_left } => format!(
                "⏳ {} minute{} left in your charging session.",
                minutes_left,
                if *minutes_left == 1 { "" } else { "s" }
            ),
            NoticeKind::SessionEnded {
                reason: SessionEndReason::Expired,
            } => "⚠️ Your charging session has ended. Please disconnect your car.".to_string(),
            NoticeKind::SessionEnded {
                reason: SessionEndReason::EndedEarly,
            } => "👋 You ended your charging session early.".to_string(),
            NoticeKind::ResourceAvailable { grace_period } => format!(
                "🔌 The charger is now available. Please plug in within {} minutes.",
                grace_period.as_secs().div_ceil(60)
            ),
        }
    }
}

/// A message addressed to one requester
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub user_id: UserId,
    #[serde(flatten)]
    pub kind: NoticeKind,
}

impl Notice {
    pub fn new(user_id: UserId, kind: NoticeKind) -> Self {
        Self { user_id, kind }
    }
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub version: String,
    pub subscribers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::parse(id).unwrap()
    }

    fn timing() -> TimingInfo {
        TimingInfo {
            grace_period: Duration::from_secs(300),
            charge_duration: Duration::from_secs(5400),
            warning_lead: Duration::from_secs(600),
        }
    }

    #[test]
    fn notice_serialization() {
        let notice = Notice::new(user("U1"), NoticeKind::Warning { minutes_left: 10 });
        let json = serde_json::to_string(&notice).unwrap();
        assert!(json.contains("\"kind\":\"warning\""));

        let parsed: Notice = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, notice);
    }

    #[test]
    fn notice_messages() {
        let msg = NoticeKind::ResourceAvailable {
            grace_period: Duration::from_secs(300),
        }
        .message();
        assert!(msg.contains("within 5 minutes"));

        assert!(NoticeKind::Warning { minutes_left: 1 }.message().contains("1 minute left"));
        assert!(NoticeKind::ChargeStarted {
            charge_duration: Duration::from_secs(5400)
        }
        .message()
        .contains("90-minute"));
    }

    #[test]
    fn snapshot_summary() {
        let free = StatusSnapshot {
            api_version: crate::API_VERSION,
            holder: None,
            waitlist: vec![],
            timing: timing(),
        };
        assert!(free.is_free());
        assert!(free.summary().contains("available"));

        let busy = StatusSnapshot {
            api_version: crate::API_VERSION,
            holder: Some(HolderInfo {
                user_id: user("A"),
                phase: Phase::Charging,
                remaining: Duration::from_secs(125),
                phase_ends_at: Local::now(),
            }),
            waitlist: vec![user("B"), user("C")],
            timing: timing(),
        };
        let summary = busy.summary();
        assert!(summary.contains("A is currently charging. 02:05 remaining"));
        assert!(summary.contains("1. B"));
        assert!(summary.contains("2. C"));
        assert_eq!(busy.position_of(&user("C")), Some(2));
        assert_eq!(busy.position_of(&user("A")), None);
    }
}
