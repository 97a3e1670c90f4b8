//! Session manager: arbitrates the charger between requesters

use chargebot_api::{Notice, NoticeKind, SessionEndReason, StatusSnapshot, API_VERSION};
use chargebot_config::Timing;
use chargebot_util::{minutes_ceil, wall_clock_after, ChargeError, MonotonicInstant, Result, UserId};
use chrono::{DateTime, Local};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{Generation, Notifier, Session, Stage, Timer, TimerHandle, Waitlist};

/// Caller now holds the charger, in its grace period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub generation: Generation,
    pub grace_ends_at: DateTime<Local>,
}

/// Outcome of a successful `request`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The charger was free
    CheckedIn(Admission),
    /// Joined the queue at this 1-based position
    Queued { position: usize },
}

/// Everything the lock protects
#[derive(Debug, Default)]
struct State {
    session: Option<Session>,
    waitlist: Waitlist,
    last_generation: Option<Generation>,
}

impl State {
    fn next_generation(&mut self) -> Generation {
        let generation = self
            .last_generation
            .map_or(Generation::first(), Generation::next);
        self.last_generation = Some(generation);
        generation
    }

    fn holder(&self) -> Option<&UserId> {
        self.session.as_ref().map(Session::holder)
    }
}

/// Side effects collected under the lock, delivered after it is released
#[derive(Debug, Default)]
struct Outbox {
    notices: Vec<Notice>,
    changed: bool,
    snapshot: Option<StatusSnapshot>,
}

impl Outbox {
    fn notify(&mut self, user_id: UserId, kind: NoticeKind) {
        self.notices.push(Notice::new(user_id, kind));
    }

    fn mark_changed(&mut self) {
        self.changed = true;
    }
}

struct Inner {
    timing: Timing,
    timer: Timer,
    notifier: Arc<dyn Notifier>,
    state: Mutex<State>,
}

/// Owns the single session and the waitlist.
///
/// Cheap to clone; clones share state. Every operation takes the one lock,
/// returns without waiting on I/O, and hands notices to the [`Notifier`] only
/// after the lock is released.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(timing: Timing, timer: Timer, notifier: Arc<dyn Notifier>) -> Self {
        info!(
            grace_secs = timing.grace_period().as_secs(),
            charge_secs = timing.charge_duration().as_secs(),
            warning_lead_secs = timing.warning_lead().as_secs(),
            "Session manager initialized"
        );

        Self {
            inner: Arc::new(Inner {
                timing,
                timer,
                notifier,
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn timing(&self) -> &Timing {
        &self.inner.timing
    }

    /// Take the charger if it is free
    pub fn check_in(&self, user_id: &UserId) -> Result<Admission> {
        self.inner
            .transact(|inner, state, out| inner.check_in(state, user_id, out))
    }

    /// Take the charger if it is free, otherwise join the queue
    pub fn request(&self, user_id: &UserId) -> Result<RequestOutcome> {
        self.inner
            .transact(|inner, state, out| inner.request(state, user_id, out))
    }

    /// Release the charger; returns who was promoted into it, if anyone
    pub fn end_early(&self, user_id: &UserId) -> Result<Option<UserId>> {
        self.inner
            .transact(|inner, state, out| inner.end_early(state, user_id, out))
    }

    /// Leave the queue
    pub fn leave_queue(&self, user_id: &UserId) -> Result<()> {
        self.inner
            .transact(|inner, state, out| inner.leave_queue(state, user_id, out))
    }

    /// Snapshot of the holder and queue; never mutates
    pub fn status(&self) -> StatusSnapshot {
        let state = self.inner.lock_state();
        self.inner.snapshot(&state)
    }

    /// Generation of the live session, if any
    pub fn current_generation(&self) -> Option<Generation> {
        self.inner
            .lock_state()
            .session
            .as_ref()
            .map(Session::generation)
    }

    /// Cancel the pending timer so nothing fires during process exit.
    /// Holder and queue are left as they are.
    pub fn shutdown(&self) {
        let mut state = self.inner.lock_state();
        if let Some(session) = state.session.as_mut() {
            info!(
                user_id = %session.holder(),
                generation = %session.generation(),
                "Cancelling session timer for shutdown"
            );
            session.cancel_timer();
        }
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        // Each critical section leaves the state consistent before anything
        // that could panic, so a poisoned lock still guards valid data.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `op` under the lock, then deliver what it queued
    fn transact<T>(
        self: &Arc<Self>,
        op: impl FnOnce(&Arc<Self>, &mut State, &mut Outbox) -> T,
    ) -> T {
        let mut out = Outbox::default();
        let result = {
            let mut state = self.lock_state();
            let result = op(self, &mut state, &mut out);
            if out.changed {
                out.snapshot = Some(self.snapshot(&state));
            }
            result
        };
        self.deliver(out);
        result
    }

    fn deliver(&self, out: Outbox) {
        for notice in &out.notices {
            if let Err(e) = self.notifier.notify(notice) {
                warn!(
                    user_id = %notice.user_id,
                    kind = ?notice.kind,
                    error = %e,
                    "Failed to deliver notice"
                );
            }
        }

        if let Some(snapshot) = &out.snapshot {
            self.notifier.state_changed(snapshot);
        }
    }

    fn snapshot(&self, state: &State) -> StatusSnapshot {
        let now = MonotonicInstant::now();
        let wall_now = chargebot_util::now();

        StatusSnapshot {
            api_version: API_VERSION,
            holder: state
                .session
                .as_ref()
                .map(|s| s.to_holder_info(&self.timing, now, wall_now)),
            waitlist: state.waitlist.to_vec(),
            timing: self.timing.to_info(),
        }
    }

    fn check_in(
        self: &Arc<Self>,
        state: &mut State,
        user_id: &UserId,
        out: &mut Outbox,
    ) -> Result<Admission> {
        match state.holder() {
            Some(holder) if holder == user_id => {
                return Err(ChargeError::AlreadyHolder(user_id.clone()));
            }
            Some(holder) => {
                return Err(ChargeError::ResourceBusy {
                    holder: holder.clone(),
                });
            }
            None => {}
        }

        let admission = self.start_grace(state, user_id.clone(), out);
        out.notify(
            user_id.clone(),
            NoticeKind::GraceStarted {
                grace_period: self.timing.grace_period(),
            },
        );
        Ok(admission)
    }

    fn request(
        self: &Arc<Self>,
        state: &mut State,
        user_id: &UserId,
        out: &mut Outbox,
    ) -> Result<RequestOutcome> {
        if state.holder() == Some(user_id) {
            return Err(ChargeError::AlreadyHolder(user_id.clone()));
        }

        if let Some(position) = state.waitlist.position(user_id) {
            return Err(ChargeError::AlreadyQueued {
                user_id: user_id.clone(),
                position,
            });
        }

        if state.session.is_none() {
            return self
                .check_in(state, user_id, out)
                .map(RequestOutcome::CheckedIn);
        }

        let position = match state.waitlist.push(user_id.clone()) {
            Ok(position) => position,
            Err(position) => {
                return Err(ChargeError::AlreadyQueued {
                    user_id: user_id.clone(),
                    position,
                });
            }
        };
        out.mark_changed();

        info!(user_id = %user_id, position, "Joined queue");
        Ok(RequestOutcome::Queued { position })
    }

    fn end_early(
        self: &Arc<Self>,
        state: &mut State,
        user_id: &UserId,
        out: &mut Outbox,
    ) -> Result<Option<UserId>> {
        let Some(mut session) = state.session.take_if(|s| s.holder() == user_id) else {
            return Err(ChargeError::NotHolder(user_id.clone()));
        };

        session.cancel_timer();
        out.mark_changed();

        info!(
            user_id = %user_id,
            generation = %session.generation(),
            phase = ?session.phase().kind(),
            "Session ended early"
        );

        out.notify(
            user_id.clone(),
            NoticeKind::SessionEnded {
                reason: SessionEndReason::EndedEarly,
            },
        );

        Ok(self.promote(state, out))
    }

    fn leave_queue(
        self: &Arc<Self>,
        state: &mut State,
        user_id: &UserId,
        out: &mut Outbox,
    ) -> Result<()> {
        if !state.waitlist.remove(user_id) {
            return Err(ChargeError::NotQueued(user_id.clone()));
        }
        out.mark_changed();

        info!(user_id = %user_id, remaining = state.waitlist.len(), "Left queue");
        Ok(())
    }

    /// Hand a free charger to the head of the queue
    fn promote(self: &Arc<Self>, state: &mut State, out: &mut Outbox) -> Option<UserId> {
        if let Some(holder) = state.holder() {
            warn!(holder = %holder, "Promotion attempted while the charger is held");
            return None;
        }

        let next = state.waitlist.pop()?;
        self.start_grace(state, next.clone(), out);
        out.notify(
            next.clone(),
            NoticeKind::ResourceAvailable {
                grace_period: self.timing.grace_period(),
            },
        );

        info!(user_id = %next, queue_len = state.waitlist.len(), "Promoted from queue");
        Some(next)
    }

    /// None -> Grace for `holder`
    fn start_grace(
        self: &Arc<Self>,
        state: &mut State,
        holder: UserId,
        out: &mut Outbox,
    ) -> Admission {
        state.waitlist.remove(&holder);

        let generation = state.next_generation();
        let grace = self.timing.grace_period();
        let timer = self.schedule(generation, Stage::GraceEnd, grace);
        let session = Session::new(holder.clone(), generation, MonotonicInstant::now(), grace, timer);

        if let Some(mut superseded) = state.session.replace(session) {
            warn!(
                holder = %superseded.holder(),
                generation = %superseded.generation(),
                "Superseding a live session"
            );
            superseded.cancel_timer();
        }
        out.mark_changed();

        info!(
            user_id = %holder,
            generation = %generation,
            grace_secs = grace.as_secs(),
            "Grace period started"
        );

        Admission {
            generation,
            grace_ends_at: wall_clock_after(chargebot_util::now(), grace),
        }
    }

    fn schedule(self: &Arc<Self>, generation: Generation, stage: Stage, delay: Duration) -> TimerHandle {
        let inner: Weak<Inner> = Arc::downgrade(self);

        debug!(generation = %generation, stage = ?stage, delay_ms = delay.as_millis() as u64, "Timer scheduled");

        self.timer.schedule(delay, move || {
            if let Some(inner) = inner.upgrade() {
                inner.on_timer(generation, stage);
            }
        })
    }

    /// Timer entry point; acts only if `generation` is still live and waiting on `stage`
    fn on_timer(self: &Arc<Self>, generation: Generation, stage: Stage) {
        self.transact(|inner, state, out| {
            let live = state
                .session
                .as_ref()
                .map(|s| (s.generation(), s.awaits(stage)));

            if live != Some((generation, true)) {
                warn!(
                    generation = %generation,
                    stage = ?stage,
                    live_generation = ?live.map(|(g, _)| g.as_u64()),
                    "Ignoring stale timer"
                );
                return;
            }

            match stage {
                Stage::GraceEnd => inner.begin_charging(state, out),
                Stage::Warning => inner.issue_warning(state, out),
                Stage::Expiry => inner.expire(state, out),
            }
        });
    }

    /// Grace -> Charging, chaining the warning timer
    fn begin_charging(self: &Arc<Self>, state: &mut State, out: &mut Outbox) {
        let Some(session) = state.session.as_mut() else {
            return;
        };

        let timer = self.schedule(session.generation(), Stage::Warning, self.timing.warning_after());
        session.begin_charging(MonotonicInstant::now(), timer);
        out.mark_changed();

        info!(
            user_id = %session.holder(),
            generation = %session.generation(),
            charge_secs = self.timing.charge_duration().as_secs(),
            "Charging started"
        );

        out.notify(
            session.holder().clone(),
            NoticeKind::ChargeStarted {
                charge_duration: self.timing.charge_duration(),
            },
        );
    }

    /// Pre-expiry warning, chaining the expiry timer
    fn issue_warning(self: &Arc<Self>, state: &mut State, out: &mut Outbox) {
        let Some(session) = state.session.as_mut() else {
            return;
        };

        let remaining = session.remaining(&self.timing, MonotonicInstant::now());
        let timer = self.schedule(session.generation(), Stage::Expiry, remaining);
        session.mark_warned(timer);

        info!(
            user_id = %session.holder(),
            generation = %session.generation(),
            remaining_secs = remaining.as_secs(),
            "Warning issued"
        );

        out.notify(
            session.holder().clone(),
            NoticeKind::Warning {
                minutes_left: minutes_ceil(remaining),
            },
        );
    }

    /// Charging -> None, then promote
    fn expire(self: &Arc<Self>, state: &mut State, out: &mut Outbox) {
        let Some(session) = state.session.take() else {
            return;
        };
        out.mark_changed();

        info!(
            user_id = %session.holder(),
            generation = %session.generation(),
            "Session expired"
        );

        out.notify(
            session.holder().clone(),
            NoticeKind::SessionEnded {
                reason: SessionEndReason::Expired,
            },
        );

        self.promote(state, out);
    }
}
