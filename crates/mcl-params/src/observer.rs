//! Observer dispatch for streamed parameters.
//!
//! Each registration owns a channel and a dispatch thread. The decoder pushes
//! every new value into each channel and returns immediately; the dispatch
//! thread calls the callback in arrival order. A slow callback only delays
//! its own queue.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace};

use crate::error::{ParamError, Result};
use crate::key::ParamKey;
use crate::value::Value;

/// Opaque caller data handed back to the callback on every notification.
pub type Context = Arc<dyn Any + Send + Sync>;

/// Callback invoked with the parameter key, its new value, and the context
/// supplied at registration. Identity is the `Arc` allocation.
pub type Callback = Arc<dyn Fn(ParamKey, &Value, &Context) + Send + Sync>;

struct Subscription {
    callback: Callback,
    tx: Sender<Value>,
    active: Arc<AtomicBool>,
}

/// Wrap a closure as a [`Callback`].
pub fn callback<F>(f: F) -> Callback
where
    F: Fn(ParamKey, &Value, &Context) + Send + Sync + 'static,
{
    Arc::new(f)
}

fn same_callback(a: &Callback, b: &Callback) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Registered callbacks of one parameter.
pub struct Observers {
    key: ParamKey,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl Observers {
    pub fn new(key: ParamKey) -> Self {
        Self {
            key,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn register(&self, callback: Callback, context: Context) -> Result<()> {
        let mut subs = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if subs.iter().any(|s| same_callback(&s.callback, &callback)) {
            return Err(ParamError::DuplicateObserver(self.key));
        }

        let (tx, rx) = mpsc::channel::<Value>();
        let active = Arc::new(AtomicBool::new(true));
        let key = self.key;
        let thread_callback = Arc::clone(&callback);
        let thread_active = Arc::clone(&active);

        std::thread::Builder::new()
            .name(format!("mcl-observer-{}-{}", key.category, key.index))
            .spawn(move || {
                for value in rx {
                    if !thread_active.load(Ordering::Acquire) {
                        break;
                    }
                    thread_callback(key, &value, &context);
                }
                trace!(%key, "observer dispatch stopped");
            })
            .map_err(ParamError::Spawn)?;

        subs.push(Subscription {
            callback,
            tx,
            active,
        });
        debug!(key = %self.key, observers = subs.len(), "observer registered");
        Ok(())
    }

    /// Remove a callback. Notifications already queued for it are dropped.
    pub fn unregister(&self, callback: &Callback) -> Result<()> {
        let mut subs = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let pos = subs
            .iter()
            .position(|s| same_callback(&s.callback, callback))
            .ok_or(ParamError::UnknownObserver(self.key))?;

        let sub = subs.remove(pos);
        sub.active.store(false, Ordering::Release);
        drop(sub.tx);
        debug!(key = %self.key, observers = subs.len(), "observer unregistered");
        Ok(())
    }

    /// Queue `value` for every registered callback.
    pub fn notify(&self, value: &Value) {
        let subs = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for sub in subs.iter() {
            // A closed channel means the dispatch thread is gone; unregister cleans it up.
            let _ = sub.tx.send(value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for Observers {
    fn drop(&mut self) {
        let subs = self
            .subscriptions
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for sub in subs.drain(..) {
            sub.active.store(false, Ordering::Release);
        }
    }
}
