use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::constant::{EventType, SessionKind};

/// Payload handed to subscribers. `session_start` identifies the session a
/// lifecycle event refers to, so a rendering collaborator can delete
/// everything it previously drew for that session.
#[derive(Debug, Clone, Default)]
pub struct EventPayload {
    pub session_start: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

pub type Subscriber = Arc<dyn Fn(SessionKind, EventType, &EventPayload) + Send + Sync>;

#[derive(Default)]
pub struct Observable {
    subscribers: HashMap<EventType, Vec<Subscriber>>,
    all_subscribers: Vec<Subscriber>,
}

impl Observable {
    pub fn subscribe(&mut self, event_type: Option<EventType>, subscriber: Subscriber) {
        if let Some(event_type) = event_type {
            self.subscribers
                .entry(event_type)
                .or_default()
                .push(subscriber);
        } else {
            self.all_subscribers.push(subscriber);
        }
    }

    pub fn notify(&self, kind: SessionKind, event_type: EventType, payload: EventPayload) {
        if let Some(subscribers) = self.subscribers.get(&event_type) {
            for subscriber in subscribers {
                subscriber(kind, event_type, &payload);
            }
        }

        for subscriber in &self.all_subscribers {
            subscriber(kind, event_type, &payload);
        }
    }
}
