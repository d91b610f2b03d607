//! The slice of application state the realtime client writes to.

use std::sync::{PoisonError, RwLock};

use super::types::{AnalyticsSnapshot, RealtimeOrder};
use crate::types::Map;
use crate::ws::connection::ConnectionState;

/// Newest orders kept by [`InMemoryStore`].
const DEFAULT_ORDER_CAPACITY: usize = 500;

/// State mutations performed by the realtime client.
///
/// These are the only writes the client makes; everything else in the application's
/// state belongs to the UI. Implementations are called from the connection task and
/// should not block.
pub trait AnalyticsStore: Send + Sync + 'static {
    /// Replace metrics, top products, sales by category and monthly trends wholesale.
    fn replace_analytics(&self, snapshot: AnalyticsSnapshot);

    /// Append an order to the real-time feed.
    fn push_realtime_order(&self, order: RealtimeOrder);

    /// Merge keys into the real-time metrics, overwriting existing keys.
    fn merge_realtime_metrics(&self, metrics: Map);

    fn set_connected(&self, connected: bool);

    /// Richer connection state for diagnostics.
    fn set_connection_state(&self, state: ConnectionState) {
        _ = state;
    }
}

/// Contents of an [`InMemoryStore`].
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub analytics: AnalyticsSnapshot,
    pub realtime_orders: Vec<RealtimeOrder>,
    pub realtime_metrics: Map,
    pub connected: bool,
    pub connection_state: ConnectionState,
}

/// Ready-made [`AnalyticsStore`] backed by a lock.
///
/// Keeps the newest orders only; older entries are dropped once the capacity is reached.
#[derive(Debug)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
    order_capacity: usize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::with_order_capacity(DEFAULT_ORDER_CAPACITY)
    }
}

// `StoreState` is replaced field by field, so a poisoned lock never exposes a torn value.
impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_order_capacity(order_capacity: usize) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            order_capacity,
        }
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> StoreState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn analytics(&self) -> AnalyticsSnapshot {
        self.read(|state| state.analytics.clone())
    }

    #[must_use]
    pub fn realtime_orders(&self) -> Vec<RealtimeOrder> {
        self.read(|state| state.realtime_orders.clone())
    }

    #[must_use]
    pub fn realtime_metrics(&self) -> Map {
        self.read(|state| state.realtime_metrics.clone())
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.read(|state| state.connected)
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.read(|state| state.connection_state)
    }

    fn read<T, F: FnOnce(&StoreState) -> T>(&self, f: F) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<F: FnOnce(&mut StoreState)>(&self, f: F) {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner));
    }
}

impl AnalyticsStore for InMemoryStore {
    fn replace_analytics(&self, snapshot: AnalyticsSnapshot) {
        self.write(|state| state.analytics = snapshot);
    }

    fn push_realtime_order(&self, order: RealtimeOrder) {
        let capacity = self.order_capacity;
        self.write(|state| {
            state.realtime_orders.push(order);
            let excess = state.realtime_orders.len().saturating_sub(capacity);
            if excess > 0 {
                state.realtime_orders.drain(..excess);
            }
        });
    }

    fn merge_realtime_metrics(&self, metrics: Map) {
        self.write(|state| state.realtime_metrics.extend(metrics));
    }

    fn set_connected(&self, connected: bool) {
        self.write(|state| state.connected = connected);
    }

    fn set_connection_state(&self, connection_state: ConnectionState) {
        self.write(|state| state.connection_state = connection_state);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;
    use crate::analytics::types::NewOrder;

    fn order(amount: u32) -> RealtimeOrder {
        let new_order: NewOrder =
            serde_json::from_value(json!({ "total_amount": amount, "category": "hogar" })).unwrap();
        RealtimeOrder::from_new_order(new_order, Utc::now())
    }

    fn map(value: serde_json::Value) -> Map {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn merge_overwrites_and_keeps_other_keys() {
        let store = InMemoryStore::new();
        store.merge_realtime_metrics(map(json!({ "active_users": 10, "orders_today": 3 })));
        store.merge_realtime_metrics(map(json!({ "orders_today": 4 })));

        let metrics = store.realtime_metrics();
        assert_eq!(metrics["active_users"], 10);
        assert_eq!(metrics["orders_today"], 4);
    }

    #[test]
    fn replace_analytics_is_wholesale() {
        let store = InMemoryStore::new();
        store.replace_analytics(
            serde_json::from_value(json!({ "top_products": [{ "id": 1 }] })).unwrap(),
        );
        store.replace_analytics(
            serde_json::from_value(json!({ "monthly_trends": [{ "month": "2026-01" }] }))
                .unwrap(),
        );

        let analytics = store.analytics();
        assert!(analytics.top_products.is_empty());
        assert_eq!(analytics.monthly_trends.len(), 1);
    }

    #[test]
    fn orders_keep_newest_within_capacity() {
        let store = InMemoryStore::with_order_capacity(2);
        store.push_realtime_order(order(1));
        store.push_realtime_order(order(2));
        store.push_realtime_order(order(3));

        let amounts: Vec<_> = store.realtime_orders().iter().map(|o| o.amount).collect();
        assert_eq!(amounts, vec![dec!(2), dec!(3)]);
    }

    #[test]
    fn connection_flags() {
        let store = InMemoryStore::new();
        assert!(!store.is_connected());
        assert_eq!(store.connection_state(), ConnectionState::Idle);

        store.set_connected(true);
        store.set_connection_state(ConnectionState::Open);
        assert!(store.is_connected());
        assert_eq!(store.connection_state(), ConnectionState::Open);
    }
}
