//! The key/value facade over the context reachable from the current
//! continuation.

use std::borrow::Borrow;
use std::future::Future;
use std::hash::Hash;
use std::iter::FusedIterator;

use tether_runtime::{Scheduler, Tracked};

use crate::errors::Result;
use crate::store::ContextStore;

/// Request-scoped key/value storage.
///
/// Every accessor resolves the context of the current continuation first and
/// fails with [`ContextError::Unregistered`](crate::ContextError::Unregistered)
/// when there is none. Contexts are shared by reference across a continuation
/// subtree: a write from any continuation in the tree is visible to all of
/// them.
pub struct AsyncContext<K, V> {
    store: ContextStore<K, V>,
}

impl<K, V> Clone for AsyncContext<K, V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<K, V> AsyncContext<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// A facade over an existing store.
    #[must_use]
    pub fn new(store: ContextStore<K, V>) -> Self {
        Self { store }
    }

    /// A facade over a fresh, started store driven by `scheduler`.
    #[must_use]
    pub fn started(scheduler: Scheduler) -> Self {
        let store = ContextStore::new(scheduler);
        store.start();
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &ContextStore<K, V> {
        &self.store
    }

    /// Bind a fresh, empty context to the current continuation.
    ///
    /// Ignored inside tokio tasks the scheduler does not track; see
    /// [`ContextStore::register_root`].
    pub fn register(&self) {
        self.store.register_root();
    }

    /// Run `body` in a nested continuation with a fresh context.
    pub fn run<R>(&self, body: impl FnOnce() -> R) -> R {
        self.store.run(body)
    }

    /// Wrap `future` as a continuation with a fresh context.
    pub fn scope<F: Future>(
        &self,
        future: F,
    ) -> Tracked<impl Future<Output = F::Output> + use<K, V, F>> {
        self.store.scope(future)
    }

    /// Detach the current continuation from its context.
    pub fn unregister(&self) {
        self.store.unregister();
    }

    /// A clone of the value stored under `key`.
    pub fn get<Q>(&self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let context = self.store.resolve()?;
        let value = context.read().get(key).cloned();
        Ok(value)
    }

    /// Store `value` under `key`, returning the previous value.
    ///
    /// Replacing a key keeps its original position in iteration order.
    pub fn set(&self, key: K, value: V) -> Result<Option<V>> {
        let context = self.store.resolve()?;
        let previous = context.write().insert(key, value);
        Ok(previous)
    }

    /// Whether `key` is present.
    pub fn has<Q>(&self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let context = self.store.resolve()?;
        let present = context.read().contains_key(key);
        Ok(present)
    }

    /// Remove `key`. Returns whether it was present.
    pub fn delete<Q>(&self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let context = self.store.resolve()?;
        let removed = context.write().shift_remove(key).is_some();
        Ok(removed)
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<()> {
        self.store.resolve()?.write().clear();
        Ok(())
    }

    /// Number of entries.
    pub fn size(&self) -> Result<usize> {
        let context = self.store.resolve()?;
        let len = context.read().len();
        Ok(len)
    }

    /// Call `f` for every entry, in insertion order.
    ///
    /// Runs over a snapshot, so `f` may itself use the facade.
    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) -> Result<()>
    where
        K: Clone,
        V: Clone,
    {
        for (key, value) in self.entries()? {
            f(&key, &value);
        }
        Ok(())
    }

    /// The keys, in insertion order, as of this call.
    pub fn keys(&self) -> Result<Keys<K>>
    where
        K: Clone,
    {
        let context = self.store.resolve()?;
        let keys: Vec<K> = context.read().keys().cloned().collect();
        Ok(Keys {
            inner: keys.into_iter(),
        })
    }

    /// The values, in insertion order, as of this call.
    pub fn values(&self) -> Result<Values<V>>
    where
        V: Clone,
    {
        let context = self.store.resolve()?;
        let values: Vec<V> = context.read().values().cloned().collect();
        Ok(Values {
            inner: values.into_iter(),
        })
    }

    /// The entries, in insertion order, as of this call.
    pub fn entries(&self) -> Result<Entries<K, V>>
    where
        K: Clone,
        V: Clone,
    {
        let context = self.store.resolve()?;
        let entries: Vec<(K, V)> = context
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(Entries {
            inner: entries.into_iter(),
        })
    }

    /// Same as [`entries`](Self::entries).
    pub fn iter(&self) -> Result<Entries<K, V>>
    where
        K: Clone,
        V: Clone,
    {
        self.entries()
    }
}

impl<K, V> std::fmt::Debug for AsyncContext<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncContext")
            .field("store", &self.store)
            .finish()
    }
}

macro_rules! snapshot_iter {
    ($(#[$meta:meta])* $name:ident<$($param:ident),+> => $item:ty) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name<$($param),+> {
            inner: std::vec::IntoIter<$item>,
        }

        impl<$($param),+> Iterator for $name<$($param),+> {
            type Item = $item;

            fn next(&mut self) -> Option<Self::Item> {
                self.inner.next()
            }

            fn size_hint(&self) -> (usize, Option<usize>) {
                self.inner.size_hint()
            }
        }

        impl<$($param),+> ExactSizeIterator for $name<$($param),+> {}

        impl<$($param),+> FusedIterator for $name<$($param),+> {}
    };
}

snapshot_iter! {
    /// Keys of a context snapshot. Created by [`AsyncContext::keys`].
    Keys<K> => K
}

snapshot_iter! {
    /// Values of a context snapshot. Created by [`AsyncContext::values`].
    Values<V> => V
}

snapshot_iter! {
    /// Entries of a context snapshot. Created by [`AsyncContext::entries`].
    Entries<K, V> => (K, V)
}
