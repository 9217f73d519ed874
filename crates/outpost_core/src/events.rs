//! In-process publish/subscribe for structure lifecycle events.
//!
//! Handlers run synchronously inside [`EventBus::publish`], in subscription
//! order. Every published event is also appended to a log that the
//! simulation drains once per tick, so callers that prefer polling never
//! need to subscribe.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::damage::DamageSource;
use crate::services::AgentId;
use crate::structure::{PlayerId, StructureId};

/// Something that happened in the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A structure was fixed in place.
    StructurePlaced {
        /// New structure.
        structure: StructureId,
        /// Owner.
        owner: PlayerId,
    },
    /// A structure reached full construction.
    ConstructionCompleted {
        /// Completed structure.
        structure: StructureId,
    },
    /// A structure lost health.
    StructureDamaged {
        /// Damaged structure.
        structure: StructureId,
        /// Health removed.
        amount: u32,
        /// Where the damage came from.
        source: DamageSource,
    },
    /// A structure reached zero health and was removed.
    StructureDestroyed {
        /// Removed structure.
        structure: StructureId,
        /// Owner at the time of destruction.
        owner: PlayerId,
    },
    /// An external agent (unit) was destroyed.
    AgentDestroyed {
        /// The agent.
        agent: AgentId,
    },
}

/// Discriminant used to subscribe to one kind of [`GameEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// [`GameEvent::StructurePlaced`]
    StructurePlaced,
    /// [`GameEvent::ConstructionCompleted`]
    ConstructionCompleted,
    /// [`GameEvent::StructureDamaged`]
    StructureDamaged,
    /// [`GameEvent::StructureDestroyed`]
    StructureDestroyed,
    /// [`GameEvent::AgentDestroyed`]
    AgentDestroyed,
}

impl GameEvent {
    /// The kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::StructurePlaced { .. } => EventKind::StructurePlaced,
            Self::ConstructionCompleted { .. } => EventKind::ConstructionCompleted,
            Self::StructureDamaged { .. } => EventKind::StructureDamaged,
            Self::StructureDestroyed { .. } => EventKind::StructureDestroyed,
            Self::AgentDestroyed { .. } => EventKind::AgentDestroyed,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Event handler callback.
pub type Handler = Box<dyn FnMut(&GameEvent)>;

struct Subscription {
    kind: EventKind,
    handler: Handler,
}

/// Synchronous event bus.
#[derive(Default)]
pub struct EventBus {
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    next_id: u64,
    published: Vec<GameEvent>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind.
    pub fn subscribe(&mut self, kind: EventKind, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.insert(id, Subscription { kind, handler });
        id
    }

    /// Remove a handler. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Deliver an event to every matching handler and record it.
    pub fn publish(&mut self, event: GameEvent) {
        tracing::trace!(?event, "publish");
        let kind = event.kind();
        for subscription in self.subscriptions.values_mut() {
            if subscription.kind == kind {
                (subscription.handler)(&event);
            }
        }
        self.published.push(event);
    }

    /// Events published since the last call, oldest first.
    pub fn take_published(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.published)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.len())
            .field("pending", &self.published.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_handlers_receive_matching_kind_only() {
        let mut bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        bus.subscribe(
            EventKind::AgentDestroyed,
            Box::new(move |event| sink.borrow_mut().push(event.clone())),
        );

        bus.publish(GameEvent::ConstructionCompleted {
            structure: StructureId(1),
        });
        bus.publish(GameEvent::AgentDestroyed { agent: 7 });

        assert_eq!(*seen.borrow(), vec![GameEvent::AgentDestroyed { agent: 7 }]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut bus = EventBus::new();
        let count = Rc::new(RefCell::new(0));

        let counter = Rc::clone(&count);
        let id = bus.subscribe(
            EventKind::StructureDestroyed,
            Box::new(move |_| *counter.borrow_mut() += 1),
        );
        let destroyed = GameEvent::StructureDestroyed {
            structure: StructureId(3),
            owner: PlayerId(0),
        };

        bus.publish(destroyed.clone());
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(destroyed);

        assert_eq!(*count.borrow(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_take_published_drains_log() {
        let mut bus = EventBus::new();
        bus.publish(GameEvent::AgentDestroyed { agent: 1 });
        bus.publish(GameEvent::AgentDestroyed { agent: 2 });

        assert_eq!(bus.take_published().len(), 2);
        assert!(bus.take_published().is_empty());
    }
}
