//! Bounded look-back window of discrete signal events.

use crate::domain::signal::SignalEvent;
use std::collections::VecDeque;

/// The last `W` events for one (instrument, indicator) pair.
///
/// Oldest events are evicted first once the window is full. Also keeps
/// whole-run BUY/SELL tallies for end-of-run reporting; those are not
/// affected by eviction.
#[derive(Debug, Clone)]
pub struct SignalWindow {
    events: VecDeque<SignalEvent>,
    capacity: usize,
    buy_count: usize,
    sell_count: usize,
}

impl SignalWindow {
    /// A `capacity` of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            buy_count: 0,
            sell_count: 0,
        }
    }

    pub fn push(&mut self, event: SignalEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
        match event {
            SignalEvent::Buy => self.buy_count += 1,
            SignalEvent::Sell => self.sell_count += 1,
            SignalEvent::None => {}
        }
    }

    /// Most recent non-NONE event in the window, or NONE.
    pub fn latest_directional(&self) -> SignalEvent {
        self.events
            .iter()
            .rev()
            .copied()
            .find(|e| e.is_directional())
            .unwrap_or(SignalEvent::None)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &SignalEvent> {
        self.events.iter()
    }

    pub fn buy_count(&self) -> usize {
        self.buy_count
    }

    pub fn sell_count(&self) -> usize {
        self.sell_count
    }
}
