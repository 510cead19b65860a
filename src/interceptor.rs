use std::future::Future;
use std::sync::{Arc, Mutex};

use futures_core::future::BoxFuture;

use crate::EchoResult;
use crate::config::EchoConfig;
use crate::error::EchoError;
use crate::response::EchoResponse;
use crate::util::lock_unpoisoned;

type FulfilledHook<T> = Arc<dyn Fn(T) -> BoxFuture<'static, EchoResult<T>> + Send + Sync>;
type RejectedHook<T> =
    Arc<dyn Fn(EchoError) -> BoxFuture<'static, EchoResult<Recovery<T>>> + Send + Sync>;

/// The outcome of a rejection hook.
///
/// `Recovered` halts the traversal of the rejection chain immediately (the
/// first recovery wins) and its value resolves the phase. `Passthrough`
/// hands the failure on to the next hook (normally unchanged). A hook that
/// returns `Err` instead aborts the whole chain with that error.
pub enum Recovery<T> {
    Recovered(T),
    Passthrough(EchoError),
}

/// A named pair of optional hooks for one phase. Hooks are plain async
/// closures; an absent hook is skipped during traversal.
pub struct Interceptor<T: 'static> {
    on_fulfilled: Option<FulfilledHook<T>>,
    on_rejected: Option<RejectedHook<T>>,
}

impl<T: 'static> Clone for Interceptor<T> {
    fn clone(&self) -> Self {
        Self {
            on_fulfilled: self.on_fulfilled.clone(),
            on_rejected: self.on_rejected.clone(),
        }
    }
}

impl<T: 'static> Default for Interceptor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Interceptor<T> {
    pub fn new() -> Self {
        Self {
            on_fulfilled: None,
            on_rejected: None,
        }
    }

    /// Sets the hook invoked on the successful-so-far value of the phase;
    /// its result becomes the value seen by the next hook.
    pub fn on_fulfilled<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EchoResult<T>> + Send + 'static,
    {
        self.on_fulfilled = Some(Arc::new(move |value| {
            let future: BoxFuture<'static, EchoResult<T>> = Box::pin(hook(value));
            future
        }));
        self
    }

    /// Sets the hook invoked with the current failure of the phase; see
    /// [`Recovery`] for its outcomes.
    pub fn on_rejected<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(EchoError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EchoResult<Recovery<T>>> + Send + 'static,
    {
        self.on_rejected = Some(Arc::new(move |error| {
            let future: BoxFuture<'static, EchoResult<Recovery<T>>> = Box::pin(hook(error));
            future
        }));
        self
    }
}

/// An insertion-ordered, keyed collection of interceptors for one phase.
///
/// Registration order defines execution order for both traversals.
/// Re-registering an existing key replaces the entry in place, keeping its
/// position. Traversals run over a snapshot, so registration calls during a
/// traversal never corrupt it.
pub struct InterceptorSet<T: 'static> {
    entries: Mutex<Vec<(String, Interceptor<T>)>>,
}

impl<T: 'static> InterceptorSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Upserts the interceptor stored under `key`. The prior entry, if any,
    /// is fully superseded, never chained.
    pub fn use_interceptor(&self, key: impl Into<String>, interceptor: Interceptor<T>) {
        let key = key.into();
        let mut entries = lock_unpoisoned(&self.entries);
        match entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = interceptor,
            None => entries.push((key, interceptor)),
        }
    }

    /// Removes the entry under `key`; a missing key is a no-op.
    pub fn eject(&self, key: &str) {
        lock_unpoisoned(&self.entries).retain(|(existing, _)| existing != key);
    }

    pub fn clear(&self) {
        lock_unpoisoned(&self.entries).clear();
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock_unpoisoned(&self.entries).is_empty()
    }

    fn snapshot(&self) -> Vec<Interceptor<T>> {
        lock_unpoisoned(&self.entries)
            .iter()
            .map(|(_, interceptor)| interceptor.clone())
            .collect()
    }

    /// Threads `value` through every fulfilled hook in insertion order; the
    /// first hook error aborts the pass.
    pub(crate) async fn run_fulfilled(&self, mut value: T) -> EchoResult<T> {
        for interceptor in self.snapshot() {
            if let Some(hook) = &interceptor.on_fulfilled {
                value = hook(value).await?;
            }
        }
        Ok(value)
    }

    /// Threads `error` through every rejected hook in insertion order. The
    /// first `Recovered` outcome wins and resolves the phase; exhausting the
    /// chain re-raises the error that reached the end of it.
    pub(crate) async fn run_rejected(&self, mut error: EchoError) -> EchoResult<T> {
        for interceptor in self.snapshot() {
            let Some(hook) = &interceptor.on_rejected else {
                continue;
            };
            match hook(error).await? {
                Recovery::Recovered(value) => return Ok(value),
                Recovery::Passthrough(next) => error = next,
            }
        }
        Err(error)
    }
}

/// The two independent per-client hook collections: one for the request
/// phase, one for the response phase. Clients never share these.
pub struct Interceptors {
    request: InterceptorSet<EchoConfig>,
    response: InterceptorSet<EchoResponse>,
}

impl Interceptors {
    pub(crate) fn new() -> Self {
        Self {
            request: InterceptorSet::new(),
            response: InterceptorSet::new(),
        }
    }

    pub fn request(&self) -> &InterceptorSet<EchoConfig> {
        &self.request
    }

    pub fn response(&self) -> &InterceptorSet<EchoResponse> {
        &self.response
    }
}
