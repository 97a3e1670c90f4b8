//! FIFO queue of requesters waiting for the charger

use chargebot_util::UserId;
use std::collections::VecDeque;

/// Ordered, duplicate-free queue of waiting requesters.
#[derive(Debug, Default, Clone)]
pub struct Waitlist {
    queue: VecDeque<UserId>,
}

impl Waitlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `user_id`, returning its 1-based position.
    ///
    /// Returns `Err` with the existing position if already queued.
    pub fn push(&mut self, user_id: UserId) -> Result<usize, usize> {
        if let Some(position) = self.position(&user_id) {
            return Err(position);
        }
        self.queue.push_back(user_id);
        Ok(self.queue.len())
    }

    /// Remove and return the head of the queue
    pub fn pop(&mut self) -> Option<UserId> {
        self.queue.pop_front()
    }

    /// Remove `user_id` wherever it is; `false` if it was not queued
    pub fn remove(&mut self, user_id: &UserId) -> bool {
        match self.queue.iter().position(|u| u == user_id) {
            Some(index) => {
                self.queue.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.queue.contains(user_id)
    }

    /// 1-based position of `user_id`
    pub fn position(&self, user_id: &UserId) -> Option<usize> {
        self.queue.iter().position(|u| u == user_id).map(|i| i + 1)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Owned copy in queue order
    pub fn to_vec(&self) -> Vec<UserId> {
        self.queue.iter().cloned().collect()
    }
}
