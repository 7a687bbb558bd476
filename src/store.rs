use alloc::{sync::Arc, vec::Vec};
use parking_lot::Mutex;
use tracing::debug;

use crate::{
    config::Config,
    instantiator::{Datum, Producer},
    Registry, Value,
};

pub(crate) type StoreRef = Arc<Store>;

/// Resolution record of one registration.
///
/// The state lock is held while a singleton is produced, so the producer runs at most once
/// even under concurrent first access. Sub-entries are locked separately and never while producing.
pub(crate) struct Store {
    state: Mutex<StoreState>,
    sub_entries: Mutex<Vec<SubEntry>>,
}

/// A store linked as its own sub-entry is marked instead of referenced, so it doesn't own itself.
#[derive(Clone)]
enum SubEntry {
    Shared(StoreRef),
    Itself,
}

struct StoreState {
    initialized: bool,
    value: Option<Value>,
    producer: Producer,
    config: Config,
}

impl Store {
    #[must_use]
    pub(crate) fn new(datum: Datum, config: Config) -> StoreRef {
        Arc::new(Self {
            state: Mutex::new(StoreState {
                initialized: false,
                value: None,
                producer: Producer::new(datum, &config),
                config,
            }),
            sub_entries: Mutex::new(Vec::new()),
        })
    }

    #[inline]
    #[must_use]
    pub(crate) fn config(&self) -> Config {
        self.state.lock().config
    }

    /// Singletons memoize exactly once, transients never do.
    pub(crate) fn resolve(&self, registry: &Registry) -> Value {
        let mut state = self.state.lock();
        if !state.config.singleton {
            let producer = state.producer.clone();
            drop(state);

            debug!("Transient, producing");
            return producer.produce(registry);
        }

        if state.initialized {
            if let Some(value) = &state.value {
                debug!("Found in cache");
                return value.clone();
            }
        }
        debug!("Not found in cache");

        let value = state.producer.produce(registry);
        state.value = Some(value.clone());
        state.initialized = true;

        debug!("Cached");
        value
    }

    /// Rebuilds the producer and forgets the cached value. Links into this store are kept.
    pub(crate) fn replace(&self, datum: Datum, config: Option<Config>) {
        let mut state = self.state.lock();
        let config = config.unwrap_or(state.config);

        state.producer = Producer::new(datum, &config);
        state.config = config;
        state.initialized = false;
        state.value = None;
    }

    pub(crate) fn push_sub_entry(self: &Arc<Self>, store: StoreRef) {
        let entry = if Arc::ptr_eq(self, &store) {
            SubEntry::Itself
        } else {
            SubEntry::Shared(store)
        };
        self.sub_entries.lock().push(entry);
    }

    /// Resolves the sub-entries in link order.
    #[must_use]
    pub(crate) fn resolve_sub_entries(&self, registry: &Registry) -> Vec<Value> {
        let entries = self.sub_entries.lock().clone();
        entries
            .iter()
            .map(|entry| match entry {
                SubEntry::Shared(store) => store.resolve(registry),
                SubEntry::Itself => self.resolve(registry),
            })
            .collect()
    }
}
