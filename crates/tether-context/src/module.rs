//! Wiring for hosts that assemble services at startup.

use std::hash::Hash;

use tether_runtime::Scheduler;
use tether_settings::PropagationSettings;
use tracing::debug;

use crate::facade::AsyncContext;
use crate::store::ContextStore;

/// Options for [`ContextModule::for_root`].
pub struct ModuleOptions<K, V> {
    /// Call [`ContextStore::start`] while building the module.
    pub auto_start: bool,
    /// Threshold for the leak warning of a freshly built store.
    pub max_live_continuations: usize,
    /// Reuse this store instead of building one. Modules given the same
    /// store share every context.
    pub store: Option<ContextStore<K, V>>,
}

impl<K, V> Default for ModuleOptions<K, V> {
    fn default() -> Self {
        Self::from_settings(&PropagationSettings::default())
    }
}

impl<K, V> ModuleOptions<K, V> {
    /// Options taken from loaded configuration, with no shared store.
    #[must_use]
    pub fn from_settings(settings: &PropagationSettings) -> Self {
        Self {
            auto_start: settings.auto_start,
            max_live_continuations: settings.max_live_continuations,
            store: None,
        }
    }

    /// Reuse `store`.
    #[must_use]
    pub fn with_store(mut self, store: ContextStore<K, V>) -> Self {
        self.store = Some(store);
        self
    }
}

impl<K, V> std::fmt::Debug for ModuleOptions<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleOptions")
            .field("auto_start", &self.auto_start)
            .field("max_live_continuations", &self.max_live_continuations)
            .field("shared_store", &self.store.is_some())
            .finish()
    }
}

/// Builds the [`AsyncContext`] a host hands to its request handlers.
#[derive(Debug)]
pub struct ContextModule<K, V> {
    context: AsyncContext<K, V>,
}

impl<K, V> ContextModule<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Build the module on `scheduler`.
    ///
    /// A supplied store keeps the scheduler it was built with.
    #[must_use]
    pub fn for_root(scheduler: &Scheduler, options: ModuleOptions<K, V>) -> Self {
        let shared = options.store.is_some();
        let store = options.store.unwrap_or_else(|| {
            let settings = PropagationSettings {
                auto_start: options.auto_start,
                max_live_continuations: options.max_live_continuations,
            };
            ContextStore::with_settings(scheduler.clone(), &settings)
        });
        if options.auto_start {
            store.start();
        }
        debug!(shared, started = store.is_started(), "context module built");
        Self {
            context: AsyncContext::new(store),
        }
    }

    /// The facade to hand out.
    #[must_use]
    pub fn context(&self) -> &AsyncContext<K, V> {
        &self.context
    }

    /// Consume the module, keeping the facade.
    #[must_use]
    pub fn into_context(self) -> AsyncContext<K, V> {
        self.context
    }
}
