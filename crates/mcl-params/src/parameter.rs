use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::BytesMut;
use mcl_frame::WriteQueue;
use tracing::{debug, trace};

use crate::catalog::Descriptor;
use crate::error::{ParamError, Result};
use crate::field::{FieldValue, Record};
use crate::key::{Access, ParamKey};
use crate::observer::{Callback, Context, Observers};
use crate::value::{Codec, Value};

/// One protocol parameter: its descriptor, current value, and for writable
/// parameters a handle to the outbound queue.
///
/// The value lives behind a per-parameter mutex. Updates are read-modify-write
/// under that lock and install a freshly built value, so concurrent readers
/// see either the old or the new value, never a mix.
pub struct Parameter {
    key: ParamKey,
    name: String,
    access: Access,
    codec: Codec,
    value: Mutex<Value>,
    queue: Option<WriteQueue>,
    observers: Option<Observers>,
}

impl Parameter {
    pub fn new(descriptor: Descriptor, queue: &WriteQueue) -> Self {
        let Descriptor {
            key,
            name,
            access,
            codec,
        } = descriptor;
        Self {
            key,
            name,
            access,
            codec,
            value: Mutex::new(codec.default_value()),
            queue: access.is_writable().then(|| queue.clone()),
            observers: key.is_streaming().then(|| Observers::new(key)),
        }
    }

    pub fn key(&self) -> ParamKey {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn is_streaming(&self) -> bool {
        self.observers.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Value> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current value.
    pub fn value(&self) -> Value {
        self.lock().clone()
    }

    /// Current record of a fixed-layout parameter.
    pub fn record(&self) -> Result<Record> {
        match &*self.lock() {
            Value::Record(record) => Ok(record.clone()),
            other => Err(ParamError::Shape {
                key: self.key,
                expected: "record",
                found: other.shape_name(),
            }),
        }
    }

    /// Decode an incoming payload and install it as the current value.
    ///
    /// Streamed parameters then notify their observers. On a decode error
    /// the previous value is kept.
    pub fn receive(&self, payload: &[u8]) -> Result<()> {
        let value = self.codec.decode(self.key, payload)?;
        trace!(key = %self.key, name = %self.name, len = payload.len(), "parameter updated");

        match &self.observers {
            Some(observers) => {
                *self.lock() = value.clone();
                observers.notify(&value);
            }
            None => *self.lock() = value,
        }
        Ok(())
    }

    /// Replace the whole value and send it.
    ///
    /// Record fields that differ from the current value go through the same
    /// domain checks as [`Parameter::set_fields`]; on error nothing is sent.
    pub fn replace(&self, value: Value) -> Result<()> {
        let queue = self.writable()?;
        if !self.codec.accepts(&value) {
            return Err(ParamError::Shape {
                key: self.key,
                expected: self.codec.shape_name(),
                found: value.shape_name(),
            });
        }

        let mut current = self.lock();
        if let (Value::Record(next), Value::Record(prev)) = (&value, &*current) {
            next.check_changes(self.key, prev)?;
        }
        self.send_value(queue, &value)?;
        *current = value;
        Ok(())
    }

    /// Change one or more fields of a fixed-layout parameter as a single
    /// mutation: all changes are validated first, then exactly one frame is
    /// queued.
    pub fn set_fields(&self, changes: &[(&str, FieldValue)]) -> Result<()> {
        let queue = self.writable()?;
        let mut current = self.lock();
        let next = match &*current {
            Value::Record(record) => record.with_fields(self.key, changes)?,
            other => {
                return Err(ParamError::Shape {
                    key: self.key,
                    expected: "record",
                    found: other.shape_name(),
                })
            }
        };

        let next = Value::Record(next);
        self.send_value(queue, &next)?;
        *current = next;
        Ok(())
    }

    pub fn set_field(&self, name: &str, value: FieldValue) -> Result<()> {
        self.set_fields(&[(name, value)])
    }

    /// Queue the current value for the write channel.
    pub fn send(&self) -> Result<()> {
        let queue = self.writable()?;
        let current = self.lock();
        self.send_value(queue, &current)
    }

    pub fn register_observer(&self, callback: Callback, context: Context) -> Result<()> {
        self.observers()?.register(callback, context)
    }

    pub fn unregister_observer(&self, callback: &Callback) -> Result<()> {
        self.observers()?.unregister(callback)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.as_ref().map_or(0, Observers::len)
    }

    fn observers(&self) -> Result<&Observers> {
        self.observers
            .as_ref()
            .ok_or(ParamError::NotStreaming(self.key))
    }

    fn writable(&self) -> Result<&WriteQueue> {
        self.queue.as_ref().ok_or(ParamError::ReadOnly(self.key))
    }

    fn send_value(&self, queue: &WriteQueue, value: &Value) -> Result<()> {
        let mut payload = BytesMut::new();
        value.encode(&mut payload);
        queue.enqueue(self.key.category, self.key.index, payload.freeze())?;
        debug!(key = %self.key, name = %self.name, "parameter sent");
        Ok(())
    }
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("access", &self.access)
            .finish()
    }
}
