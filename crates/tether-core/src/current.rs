//! The active continuation pointer.
//!
//! Each OS thread is a scheduling context: at any instant it executes at most
//! one continuation. The runtime enters a continuation around every poll or
//! callback invocation; everything else only reads [`current()`].
//!
//! When nothing is entered, a thread reports its *thread root*, an identifier
//! assigned lazily the first time the thread asks. Code running outside any
//! tracked continuation (a `main` function, a plain `#[test]`) therefore still
//! has a stable continuation to register a context against. The thread root
//! completes when its thread exits; [`on_thread_root_exit`] hooks into that.

use std::cell::{Cell, RefCell};
use std::marker::PhantomData;

use crate::ids::ContinuationId;

type ExitHook = Box<dyn FnOnce(ContinuationId)>;

struct ThreadRoot {
    id: ContinuationId,
    exit_hooks: RefCell<Vec<(u64, ExitHook)>>,
}

impl Drop for ThreadRoot {
    fn drop(&mut self) {
        let id = self.id;
        for (_, hook) in self.exit_hooks.get_mut().drain(..) {
            hook(id);
        }
    }
}

thread_local! {
    static CURRENT: Cell<Option<ContinuationId>> = const { Cell::new(None) };
    static THREAD_ROOT: ThreadRoot = ThreadRoot {
        id: ContinuationId::next(),
        exit_hooks: RefCell::new(Vec::new()),
    };
}

/// The continuation executing on this thread, or the thread root.
#[must_use]
pub fn current() -> ContinuationId {
    CURRENT
        .with(Cell::get)
        .unwrap_or_else(|| THREAD_ROOT.with(|root| root.id))
}

/// Whether a tracked continuation (rather than the thread root) is executing.
#[must_use]
pub fn is_entered() -> bool {
    CURRENT.with(Cell::get).is_some()
}

/// Run `hook` with this thread's root identifier when the thread exits.
///
/// At most one hook is kept per `key`; returns `false` if `key` already has
/// one or the thread is already shutting down. Hooks run during thread-local
/// destruction and must not rely on other thread-locals.
pub fn on_thread_root_exit(key: u64, hook: impl FnOnce(ContinuationId) + 'static) -> bool {
    THREAD_ROOT
        .try_with(|root| {
            let mut hooks = root.exit_hooks.borrow_mut();
            if hooks.iter().any(|(existing, _)| *existing == key) {
                return false;
            }
            hooks.push((key, Box::new(hook)));
            true
        })
        .unwrap_or(false)
}

/// Make `id` the current continuation until the guard is dropped.
pub fn enter(id: ContinuationId) -> EnterGuard {
    let prev = CURRENT.with(|slot| slot.replace(Some(id)));
    EnterGuard {
        prev,
        _not_send: PhantomData,
    }
}

/// Restores the previously current continuation on drop.
///
/// Not `Send`: it must be dropped on the thread whose pointer it changed.
#[must_use = "the continuation is exited as soon as the guard is dropped"]
pub struct EnterGuard {
    prev: Option<ContinuationId>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        CURRENT.with(|slot| slot.set(self.prev));
    }
}

impl std::fmt::Debug for EnterGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnterGuard").field("prev", &self.prev).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_root_is_stable() {
        assert!(!is_entered());
        assert_eq!(current(), current());
    }

    #[test]
    fn threads_have_distinct_roots() {
        let here = current();
        let there = std::thread::spawn(current).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn enter_and_restore() {
        let root = current();
        let id = ContinuationId::next();
        {
            let _guard = enter(id);
            assert!(is_entered());
            assert_eq!(current(), id);
        }
        assert!(!is_entered());
        assert_eq!(current(), root);
    }

    #[test]
    fn nested_enter_restores_outer() {
        let outer = ContinuationId::next();
        let inner = ContinuationId::next();
        let _outer = enter(outer);
        {
            let _inner = enter(inner);
            assert_eq!(current(), inner);
        }
        assert_eq!(current(), outer);
    }

    #[test]
    fn exit_hooks_run_once_per_key_with_the_thread_root() {
        let (tx, rx) = std::sync::mpsc::channel();
        let root = std::thread::spawn(move || {
            let first = tx.clone();
            assert!(on_thread_root_exit(7, move |id| first.send((7, id)).unwrap()));
            let dup = tx.clone();
            assert!(!on_thread_root_exit(7, move |id| dup.send((7, id)).unwrap()));
            assert!(on_thread_root_exit(8, move |id| tx.send((8, id)).unwrap()));
            current()
        })
        .join()
        .unwrap();

        let fired: Vec<_> = rx.iter().collect();
        assert_eq!(fired, vec![(7, root), (8, root)]);
    }

    #[test]
    fn restored_on_unwind() {
        let root = current();
        let result = std::panic::catch_unwind(|| {
            let _guard = enter(ContinuationId::next());
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(current(), root);
    }
}
