//! Runtime routing of buffer operations to backends.
//!
//! A [`Dispatcher`] maps a `(device, dtype)` key to the [`Backend`] that serves it. Every
//! [`Tensor`] holds a handle to the dispatcher it was created through and resolves its backend
//! on each operation, so registering a backend re-routes existing buffers too.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::{
    backend::{Backend, CpuBackend},
    device::Device,
    dtype::DataType,
    tensor::{Tensor, TensorError},
};

/// The key a backend is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    /// The device half of the key.
    pub device: Device,
    /// The dtype half of the key.
    pub dtype: DataType,
}

impl DispatchKey {
    /// Creates a dispatch key.
    pub const fn new(device: Device, dtype: DataType) -> Self {
        Self { device, dtype }
    }
}

/// A thread-safe table of backends keyed by `(device, dtype)`.
///
/// Lookups take a read lock and clone the backend handle, so operations never hold the lock
/// while they run.
#[derive(Default)]
pub struct Dispatcher {
    backends: RwLock<HashMap<DispatchKey, Arc<dyn Backend>>>,
}

impl Dispatcher {
    /// Creates a dispatcher with no backends registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher with a [`CpuBackend`] registered for every [`DataType`].
    pub fn with_defaults() -> Self {
        let dispatcher = Self::new();
        dispatcher.register_backend(Arc::new(CpuBackend::new()));
        dispatcher
    }

    /// Registers `backend` for `key`, returning the backend it replaces, if any.
    pub fn register(
        &self,
        key: DispatchKey,
        backend: Arc<dyn Backend>,
    ) -> Option<Arc<dyn Backend>> {
        let name = backend.name().to_string();
        let previous = self.backends.write().insert(key, backend);
        match &previous {
            Some(old) => log::warn!(
                "dispatcher: backend {} for ({}, {}) replaced by {name}",
                old.name(),
                key.device,
                key.dtype
            ),
            None => log::debug!(
                "dispatcher: registered backend {name} for ({}, {})",
                key.device,
                key.dtype
            ),
        }
        previous
    }

    /// Registers `backend` for its own device and every [`DataType`].
    pub fn register_backend(&self, backend: Arc<dyn Backend>) {
        let device = backend.device();
        for dtype in DataType::ALL {
            self.register(DispatchKey::new(device, dtype), Arc::clone(&backend));
        }
    }

    /// Removes the backend registered for `key`.
    pub fn unregister(&self, key: DispatchKey) -> Option<Arc<dyn Backend>> {
        self.backends.write().remove(&key)
    }

    /// Returns true if a backend is registered for `key`.
    pub fn contains(&self, key: DispatchKey) -> bool {
        self.backends.read().contains_key(&key)
    }

    /// Returns the backend serving `(device, dtype)`.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::NoBackend`] if nothing is registered for the key.
    pub fn resolve(&self, device: Device, dtype: DataType) -> Result<Arc<dyn Backend>, TensorError> {
        let backends = self.backends.read();
        match backends.get(&DispatchKey::new(device, dtype)) {
            Some(backend) => {
                log::trace!("dispatcher: ({device}, {dtype}) -> {}", backend.name());
                Ok(Arc::clone(backend))
            }
            None => Err(TensorError::NoBackend { device, dtype }),
        }
    }

    /// Creates an empty buffer on `device` routed through this dispatcher.
    ///
    /// # Errors
    ///
    /// Returns an error if no backend serves `(device, dtype)` or the backend cannot produce
    /// the initial storage.
    pub fn tensor(self: &Arc<Self>, device: Device, dtype: DataType) -> Result<Tensor, TensorError> {
        let storage = self.resolve(device, dtype)?.create(dtype)?;
        Ok(Tensor::from_parts(Arc::clone(self), device, dtype, storage))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backends = self.backends.read();
        let mut keys: Vec<_> = backends.keys().collect();
        keys.sort_by_key(|key| (key.device.to_string(), key.dtype));
        f.debug_struct("Dispatcher")
            .field("keys", &keys)
            .finish()
    }
}

/// Global dispatcher instance, with the CPU backend registered.
static DEFAULT_DISPATCHER: Lazy<Arc<Dispatcher>> = Lazy::new(|| Arc::new(Dispatcher::with_defaults()));

/// Returns the global dispatcher used by [`Tensor::new`].
///
/// Backends registered here are visible to every buffer created through it.
pub fn dispatcher() -> Arc<Dispatcher> {
    Arc::clone(&DEFAULT_DISPATCHER)
}
