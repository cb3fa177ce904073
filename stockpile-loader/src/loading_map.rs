use stockpile_base::hashing::HashSet;
use stockpile_base::{LoadError, LoadResult};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

/// A path being loaded by a specific thread
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadingKey {
    pub path: String,
    pub thread: ThreadId,
}

/// Tracks which (path, thread) pairs have a load outstanding. A thread that tries to load a path
/// it is already loading is in a dependency cycle. Different threads may load the same path
/// concurrently, the cache sorts out which result survives.
#[derive(Default)]
pub struct LoadingMap {
    loading: Mutex<HashSet<LoadingKey>>,
}

impl LoadingMap {
    pub fn new() -> Arc<Self> {
        Arc::new(LoadingMap::default())
    }

    /// Registers the current thread as loading `path`. The returned ticket unregisters it when
    /// dropped.
    pub fn try_acquire(
        self: &Arc<Self>,
        path: &str,
    ) -> LoadResult<LoadingTicket> {
        let key = LoadingKey {
            path: path.to_string(),
            thread: std::thread::current().id(),
        };

        let inserted = self.loading.lock().unwrap().insert(key.clone());
        if !inserted {
            return Err(LoadError::AlreadyInProgress(path.to_string()));
        }

        Ok(LoadingTicket {
            loading_map: self.clone(),
            key,
            _not_send: PhantomData,
        })
    }

    /// Removes the entry for (path, thread). Returns false if there was none.
    pub fn release_for(
        &self,
        path: &str,
        thread: ThreadId,
    ) -> bool {
        self.loading.lock().unwrap().remove(&LoadingKey {
            path: path.to_string(),
            thread,
        })
    }

    pub fn is_loading(
        &self,
        path: &str,
        thread: ThreadId,
    ) -> bool {
        self.loading.lock().unwrap().contains(&LoadingKey {
            path: path.to_string(),
            thread,
        })
    }

    /// Snapshot of every outstanding load
    pub fn pending(&self) -> Vec<LoadingKey> {
        self.loading.lock().unwrap().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.loading.lock().unwrap().clear();
    }
}

/// Proof that the current thread registered a path in the `LoadingMap`. Dropping it releases the
/// registration, including during unwinding. Tickets can't leave the thread that created them.
pub struct LoadingTicket {
    loading_map: Arc<LoadingMap>,
    key: LoadingKey,
    _not_send: PhantomData<*const ()>,
}

impl LoadingTicket {
    pub fn path(&self) -> &str {
        &self.key.path
    }

    pub fn thread(&self) -> ThreadId {
        self.key.thread
    }
}

impl Drop for LoadingTicket {
    fn drop(&mut self) {
        log::trace!("Releasing loading ticket for {}", self.key.path);
        self.loading_map
            .release_for(&self.key.path, self.key.thread);
    }
}

impl std::fmt::Debug for LoadingTicket {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("LoadingTicket").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockpile_base::ErrorKind;

    #[test]
    fn same_thread_is_rejected_until_released() {
        let loading_map = LoadingMap::new();
        let ticket = loading_map.try_acquire("res://x.scn").unwrap();
        let error = loading_map.try_acquire("res://x.scn").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::AlreadyInProgress);

        // Other paths are unaffected
        let _other = loading_map.try_acquire("res://y.scn").unwrap();

        drop(ticket);
        assert!(!loading_map.is_loading("res://x.scn", std::thread::current().id()));
        let _again = loading_map.try_acquire("res://x.scn").unwrap();
    }

    #[test]
    fn other_threads_pass_the_gate() {
        let loading_map = LoadingMap::new();
        let _ticket = loading_map.try_acquire("res://x.scn").unwrap();

        let other = loading_map.clone();
        let acquired = std::thread::spawn(move || other.try_acquire("res://x.scn").is_ok())
            .join()
            .unwrap();
        assert!(acquired);
        // The other thread's ticket was dropped with its thread
        assert_eq!(loading_map.pending().len(), 1);
    }

    #[test]
    fn ticket_released_on_panic() {
        let loading_map = LoadingMap::new();
        let inner = loading_map.clone();
        let result = std::panic::catch_unwind(move || {
            let _ticket = inner.try_acquire("res://boom.scn").unwrap();
            panic!("handler failed");
        });
        assert!(result.is_err());
        assert!(loading_map.pending().is_empty());
    }

    #[test]
    fn release_for_specific_thread() {
        let loading_map = LoadingMap::new();
        let ticket = loading_map.try_acquire("res://x.scn").unwrap();
        let thread = ticket.thread();
        std::mem::forget(ticket);
        assert!(loading_map.is_loading("res://x.scn", thread));
        assert!(loading_map.release_for("res://x.scn", thread));
        assert!(!loading_map.release_for("res://x.scn", thread));
    }
}
