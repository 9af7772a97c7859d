// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-chat rolling conversation buffer.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parley_core::{ChatId, ConversationTurn};

use crate::prompt::RosterMember;

/// Bounded, time-stamped conversation state for one chat.
///
/// Holds at most `capacity` turns; pushing onto a full buffer evicts the
/// oldest turn. The system prompt is cached here after each render but is
/// never part of the buffer.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    chat_id: ChatId,
    capacity: usize,
    turns: VecDeque<ConversationTurn>,
    created_at: DateTime<Utc>,
    last_updated_at: DateTime<Utc>,
    system_prompt: Option<String>,
    roster: Vec<RosterMember>,
}

impl ConversationContext {
    /// Creates an empty context. A zero capacity is raised to one.
    pub fn new(chat_id: ChatId, capacity: usize, now: DateTime<Utc>) -> Self {
        let capacity = capacity.max(1);
        Self {
            chat_id,
            capacity,
            turns: VecDeque::with_capacity(capacity),
            created_at: now,
            last_updated_at: now,
            system_prompt: None,
            roster: Vec::new(),
        }
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn turns(&self) -> impl ExactSizeIterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_updated_at(&self) -> DateTime<Utc> {
        self.last_updated_at
    }

    /// The prompt produced by the most recent render, if any.
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn roster(&self) -> &[RosterMember] {
        &self.roster
    }

    /// Appends a turn, evicting the oldest when full, and bumps `last_updated_at`.
    ///
    /// A `now` earlier than the current timestamp leaves the timestamp unchanged.
    pub fn push(&mut self, turn: ConversationTurn, now: DateTime<Utc>) {
        if self.turns.len() == self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
        self.last_updated_at = self.last_updated_at.max(now);
    }

    /// True when the context has been idle for at least `timeout`.
    pub fn is_stale(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        let timeout = TimeDelta::from_std(timeout).unwrap_or(TimeDelta::MAX);
        now - self.last_updated_at >= timeout
    }

    /// Records a member unless the same (username, name) pair is already known.
    ///
    /// Returns whether the roster grew.
    pub fn observe_member(&mut self, member: RosterMember) -> bool {
        if self.roster.contains(&member) {
            return false;
        }
        self.roster.push(member);
        true
    }

    pub(crate) fn set_system_prompt(&mut self, prompt: String) {
        self.system_prompt = Some(prompt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::ContentBlock;
    use proptest::prelude::*;

    fn epoch() -> DateTime<Utc> {
        DateTime::UNIX_EPOCH
    }

    fn user(text: &str) -> ConversationTurn {
        ConversationTurn::user(vec![ContentBlock::text(text)])
    }

    #[test]
    fn overflow_evicts_oldest_first() {
        let mut ctx = ConversationContext::new(ChatId(1), 2, epoch());
        ctx.push(user("U1"), epoch());
        ctx.push(ConversationTurn::assistant("A1"), epoch());
        ctx.push(user("U2"), epoch());

        let texts: Vec<String> = ctx.turns().map(ConversationTurn::text).collect();
        assert_eq!(texts, vec!["A1", "U2"]);
    }

    #[test]
    fn staleness_boundary_is_inclusive() {
        let ctx = ConversationContext::new(ChatId(1), 5, epoch());
        let timeout = Duration::from_secs(600);
        assert!(!ctx.is_stale(epoch() + TimeDelta::seconds(599), timeout));
        assert!(ctx.is_stale(epoch() + TimeDelta::seconds(600), timeout));
    }

    #[test]
    fn timestamp_never_moves_backwards() {
        let later = epoch() + TimeDelta::seconds(10);
        let mut ctx = ConversationContext::new(ChatId(1), 5, later);
        ctx.push(user("x"), epoch());
        assert_eq!(ctx.last_updated_at(), later);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut ctx = ConversationContext::new(ChatId(1), 0, epoch());
        ctx.push(user("a"), epoch());
        ctx.push(user("b"), epoch());
        assert_eq!(ctx.len(), 1);
    }

    proptest! {
        #[test]
        fn keeps_exactly_the_last_capacity_turns(capacity in 1usize..8, n in 0usize..40) {
            let mut ctx = ConversationContext::new(ChatId(7), capacity, epoch());
            for i in 0..n {
                ctx.push(user(&i.to_string()), epoch());
                prop_assert!(ctx.len() <= capacity);
            }
            let kept: Vec<String> = ctx.turns().map(ConversationTurn::text).collect();
            let expected: Vec<String> =
                (n.saturating_sub(capacity)..n).map(|i| i.to_string()).collect();
            prop_assert_eq!(kept, expected);
        }

        #[test]
        fn roster_accumulation_is_idempotent(
            members in proptest::collection::vec(
                (proptest::option::of("[a-c]"), proptest::option::of("[A-C]")),
                0..20,
            )
        ) {
            let mut once = ConversationContext::new(ChatId(7), 3, epoch());
            let mut twice = ConversationContext::new(ChatId(7), 3, epoch());
            for (username, display_name) in &members {
                let member = RosterMember {
                    username: username.clone(),
                    display_name: display_name.clone(),
                };
                once.observe_member(member.clone());
                twice.observe_member(member.clone());
                twice.observe_member(member);
            }
            prop_assert_eq!(once.roster(), twice.roster());
            let unique: std::collections::HashSet<_> = once.roster().iter().collect();
            prop_assert_eq!(unique.len(), once.roster().len());
        }
    }
}
