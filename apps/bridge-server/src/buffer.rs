// [[CRAFTLINK]]/apps/bridge-server/src/buffer.rs
// Purpose: Categorized bounded event buffer. Single entry point for observed bot events.
// Architecture: Domain Logic Layer
// Dependencies: DashMap, Chrono, tokio broadcast

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::events::{CategoryTable, Event, EventCategory};
use crate::observability::BridgeMetrics;
use crate::reactions::ReactionDispatcher;

pub const DEFAULT_QUERY_LIMIT: usize = 10;
const LIVE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct EventQuery {
    /// Category name; an unknown name matches nothing.
    pub category: Option<String>,
    /// Only events strictly newer than this (epoch ms).
    pub since: i64,
    pub limit: usize,
    pub types: Option<Vec<String>>,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            category: None,
            since: 0,
            limit: DEFAULT_QUERY_LIMIT,
            types: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub queue_size: usize,
    pub max_size: usize,
    pub oldest_event: Option<i64>,
    pub newest_event: Option<i64>,
    pub event_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferStats {
    pub total_events: u64,
    pub categories: BTreeMap<EventCategory, CategoryStats>,
}

pub struct EventBuffer {
    table: CategoryTable,
    queues: DashMap<EventCategory, VecDeque<Event>>,
    last_id: AtomicU64,
    last_timestamp: AtomicI64,
    dispatcher: Option<ReactionDispatcher>,
    live: broadcast::Sender<Event>,
    metrics: Arc<BridgeMetrics>,
}

impl EventBuffer {
    pub fn new(table: CategoryTable, metrics: Arc<BridgeMetrics>) -> Self {
        let queues = DashMap::new();
        for category in EventCategory::ALL {
            queues.insert(category, VecDeque::with_capacity(table.capacity(category)));
        }
        let (live, _) = broadcast::channel(LIVE_CHANNEL_CAPACITY);

        Self {
            table,
            queues,
            last_id: AtomicU64::new(0),
            last_timestamp: AtomicI64::new(0),
            dispatcher: None,
            live,
            metrics,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: ReactionDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Stores a new event and runs its reaction, if any. Never fails; the
    /// payload is kept exactly as received.
    pub fn admit(&self, event_type: &str, payload: Value) -> Event {
        let category = self.table.category_of(event_type);
        let capacity = self.table.capacity(category);

        // id and append happen under the category lock so each queue stays in id order
        let event = {
            let mut queue = self.queues.entry(category).or_default();
            let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
            let now = Utc::now().timestamp_millis();
            let timestamp = self.last_timestamp.fetch_max(now, Ordering::SeqCst).max(now);
            let event = Event::new(id, event_type, timestamp, payload);

            queue.push_back(event.clone());
            while queue.len() > capacity {
                queue.pop_front();
            }
            event
        };

        self.metrics.event_admitted();
        tracing::trace!("Admitted event #{} ({}) into {}", event.id, event.event_type, category);

        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.dispatch(&event);
        }

        // no subscribers is fine
        let _ = self.live.send(event.clone());
        event
    }

    /// Most recent `limit` matching events in ascending id order. Read-only.
    pub fn query(&self, query: &EventQuery) -> Vec<Event> {
        let categories = match &query.category {
            Some(name) => match name.parse::<EventCategory>() {
                Ok(category) => vec![category],
                Err(_) => {
                    tracing::debug!("Query for unknown category '{}' returns no events", name);
                    return Vec::new();
                }
            },
            None => EventCategory::ALL.to_vec(),
        };

        let wanted = |event: &Event| {
            event.timestamp > query.since
                && query
                    .types
                    .as_ref()
                    .map_or(true, |types| types.iter().any(|t| t == &event.event_type))
        };

        let mut matched: Vec<Event> = Vec::new();
        for category in categories {
            if let Some(queue) = self.queues.get(&category) {
                matched.extend(queue.iter().filter(|e| wanted(*e)).cloned());
            }
        }

        matched.sort_by_key(|e| e.id);
        let skip = matched.len().saturating_sub(query.limit);
        matched.split_off(skip)
    }

    pub fn stats(&self) -> BufferStats {
        let categories = EventCategory::ALL
            .into_iter()
            .map(|category| {
                let max_size = self.table.capacity(category);
                let stats = match self.queues.get(&category) {
                    Some(queue) => {
                        let mut event_types: Vec<String> = Vec::new();
                        for event in queue.iter() {
                            if !event_types.contains(&event.event_type) {
                                event_types.push(event.event_type.clone());
                            }
                        }
                        CategoryStats {
                            queue_size: queue.len(),
                            max_size,
                            oldest_event: queue.front().map(|e| e.timestamp),
                            newest_event: queue.back().map(|e| e.timestamp),
                            event_types,
                        }
                    }
                    None => CategoryStats {
                        queue_size: 0,
                        max_size,
                        oldest_event: None,
                        newest_event: None,
                        event_types: Vec::new(),
                    },
                };
                (category, stats)
            })
            .collect();

        BufferStats {
            total_events: self.total_admitted(),
            categories,
        }
    }

    pub fn total_admitted(&self) -> u64 {
        self.last_id.load(Ordering::SeqCst)
    }

    /// Live stream of admitted events. Slow receivers lag; admission never waits.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.live.subscribe()
    }
}
