//! Generic Resource Pool
//!
//! Pools any resource a [`Factory`] can create and destroy. Connections are
//! the main client, see `manager.rs`.
//!
//! - `idle + in_use + pending` never exceeds `max_pool_size`
//! - waiters are served FIFO as resources come back; a waiter that goes
//!   away after being served hands its grant back
//! - `drain` returns once every resource, checked out or idle, is destroyed
//! - a background sweep evicts idle or expired resources, then tops the
//!   pool back up to `min_pool_size`
//! - lifecycle events go out on a broadcast channel, see [`PoolEvent`]

use crate::config::PoolConfig;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Notify, broadcast, oneshot};
use tokio::time::Instant;

const EVENT_CAPACITY: usize = 64;

/// Creates, validates and destroys pooled resources.
#[async_trait]
pub trait Factory: Send + Sync + 'static {
    type Resource: Send + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    async fn create(&self) -> Result<Self::Resource, Self::Error>;

    async fn destroy(&self, resource: Self::Resource) -> Result<(), Self::Error>;

    /// Checked on release; `false` destroys the resource.
    fn validate(&self, _resource: &Self::Resource) -> bool {
        true
    }
}

/// Extra release-time check supplied by the pool's owner.
pub type Validator<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Timed out after {0:?} waiting for a pooled resource")]
    AcquireTimeout(Duration),

    #[error("Too many waiting clients (limit {0})")]
    TooManyWaiters(usize),

    #[error("Pool is draining")]
    Draining,

    #[error("Resource creation failed: {0}")]
    Create(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Pool lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    CreateSuccess,
    CreateError(String),
    Acquire,
    Release,
    Destroy,
    DestroyError(String),
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    pub in_use: usize,
    /// Creations in flight.
    pub pending: usize,
    pub waiting: usize,
    pub max_size: usize,
    pub total_created: usize,
}

struct Record<T> {
    resource: T,
    created_at: Instant,
    last_used: Instant,
}

impl<T> Record<T> {
    fn new(resource: T) -> Self {
        let now = Instant::now();
        Self {
            resource,
            created_at: now,
            last_used: now,
        }
    }
}

/// What a waiter is handed: a resource, or permission to create one.
enum Grant<T> {
    Resource(Record<T>),
    Slot,
}

struct Waiter<T> {
    id: u64,
    tx: oneshot::Sender<Grant<T>>,
}

struct State<T> {
    idle: VecDeque<Record<T>>,
    in_use: usize,
    pending: usize,
    /// Destroys scheduled but not yet finished.
    destroying: usize,
    waiters: VecDeque<Waiter<T>>,
    next_waiter: u64,
    draining: bool,
    total_created: usize,
}

impl<T> State<T> {
    fn total(&self) -> usize {
        self.idle.len() + self.in_use + self.pending
    }

    /// Resources a drain still has to wait for.
    fn outstanding(&self) -> usize {
        self.in_use + self.pending + self.destroying
    }

    fn remove_waiter(&mut self, id: u64) -> bool {
        match self.waiters.iter().position(|w| w.id == id) {
            Some(pos) => self.waiters.remove(pos).is_some(),
            None => false,
        }
    }

    /// Hand a grant to the oldest waiter still listening.
    fn hand_off(&mut self, mut grant: Grant<T>) -> Option<Grant<T>> {
        while let Some(waiter) = self.waiters.pop_front() {
            match waiter.tx.send(grant) {
                Ok(()) => return None,
                Err(returned) => grant = returned,
            }
        }
        Some(grant)
    }

    /// Give a resource to a waiter, or park it idle.
    fn offer(&mut self, mut record: Record<T>) {
        record.last_used = Instant::now();
        match self.hand_off(Grant::Resource(record)) {
            None => self.in_use += 1,
            Some(Grant::Resource(record)) => self.idle.push_back(record),
            Some(Grant::Slot) => {}
        }
    }

    /// Capacity freed up; let a waiter create.
    fn offer_slot(&mut self) {
        if !self.draining && self.hand_off(Grant::Slot).is_none() {
            self.pending += 1;
        }
    }
}

struct Inner<F: Factory> {
    factory: F,
    config: PoolConfig,
    validator: Option<Validator<F::Resource>>,
    state: Mutex<State<F::Resource>>,
    events: broadcast::Sender<PoolEvent>,
    drained: Notify,
}

impl<F: Factory> Inner<F> {
    fn lock(&self) -> MutexGuard<'_, State<F::Resource>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: PoolEvent) {
        let _ = self.events.send(event);
    }

    fn is_valid(&self, resource: &F::Resource) -> bool {
        self.factory.validate(resource) && self.validator.as_ref().is_none_or(|check| check(resource))
    }

    /// Wake `drain` once nothing is outstanding.
    fn settle(&self, state: &State<F::Resource>) {
        if state.draining && state.outstanding() == 0 {
            self.drained.notify_waiters();
        }
    }

    /// Return an in-use resource.
    fn release(self: &Arc<Self>, record: Record<F::Resource>) {
        self.emit(PoolEvent::Release);
        let valid = self.is_valid(&record.resource);
        if !valid {
            tracing::debug!("pooled resource failed validation");
        }
        self.put_back(record, valid);
    }

    /// Move an in-use record back to idle, or destroy it.
    fn put_back(self: &Arc<Self>, record: Record<F::Resource>, keep: bool) {
        let mut state = self.lock();
        state.in_use -= 1;
        if state.draining || !keep {
            state.destroying += 1;
            state.offer_slot();
            drop(state);
            self.spawn_destroy(record.resource);
            return;
        }
        state.offer(record);
    }

    /// Undo a grant whose waiter went away before taking it.
    fn reclaim(self: &Arc<Self>, grant: Grant<F::Resource>) {
        match grant {
            Grant::Resource(record) => self.put_back(record, true),
            Grant::Slot => self.release_slot(),
        }
    }

    /// Take an in-use resource out of the pool's accounting.
    fn forget(&self, destroying: bool) {
        let mut state = self.lock();
        state.in_use -= 1;
        if destroying {
            state.destroying += 1;
        }
        state.offer_slot();
        self.settle(&state);
    }

    /// Give back a creation slot that was not used.
    fn release_slot(&self) {
        let mut state = self.lock();
        state.pending -= 1;
        state.offer_slot();
        self.settle(&state);
    }

    async fn destroy(&self, resource: F::Resource) {
        match self.factory.destroy(resource).await {
            Ok(()) => self.emit(PoolEvent::Destroy),
            Err(e) => {
                tracing::warn!(error = %e, "failed to destroy pooled resource");
                self.emit(PoolEvent::DestroyError(e.to_string()));
            }
        }
    }

    /// Destroy a resource already counted in `destroying`.
    async fn destroy_counted(&self, resource: F::Resource) {
        self.destroy(resource).await;
        self.finish_destroy();
    }

    fn finish_destroy(&self) {
        let mut state = self.lock();
        state.destroying -= 1;
        self.settle(&state);
    }

    fn spawn_destroy(self: &Arc<Self>, resource: F::Resource) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(self);
                handle.spawn(async move { inner.destroy_counted(resource).await });
            }
            Err(_) => {
                tracing::debug!("no runtime available, dropping resource without destroy");
                self.finish_destroy();
            }
        }
    }

    /// Create on behalf of a caller that already holds a pending slot.
    async fn create_reserved(self: &Arc<Self>) -> Result<Pooled<F>, PoolError> {
        let mut reservation = Reservation {
            inner: self,
            armed: true,
        };
        let result = self.factory.create().await;
        reservation.armed = false;

        match result {
            Ok(resource) => {
                let draining = {
                    let mut state = self.lock();
                    state.pending -= 1;
                    state.total_created += 1;
                    if state.draining {
                        state.destroying += 1;
                    } else {
                        state.in_use += 1;
                    }
                    state.draining
                };
                self.emit(PoolEvent::CreateSuccess);
                if draining {
                    self.destroy_counted(resource).await;
                    return Err(PoolError::Draining);
                }
                self.emit(PoolEvent::Acquire);
                Ok(Pooled::new(Arc::clone(self), Record::new(resource)))
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to create pooled resource");
                self.emit(PoolEvent::CreateError(e.to_string()));
                self.release_slot();
                Err(PoolError::Create(Box::new(e)))
            }
        }
    }

    /// Create idle resources until `min_pool_size` is covered.
    async fn fill(self: &Arc<Self>) -> usize {
        let mut created = 0;
        loop {
            {
                let mut state = self.lock();
                if state.draining
                    || state.idle.len() + state.pending >= self.config.min_pool_size
                    || state.total() >= self.config.max_pool_size
                {
                    break;
                }
                state.pending += 1;
            }

            match self.factory.create().await {
                Ok(resource) => {
                    self.emit(PoolEvent::CreateSuccess);
                    let leftover = {
                        let mut state = self.lock();
                        state.pending -= 1;
                        state.total_created += 1;
                        if state.draining {
                            state.destroying += 1;
                            Some(resource)
                        } else {
                            state.offer(Record::new(resource));
                            None
                        }
                    };
                    if let Some(resource) = leftover {
                        self.destroy_counted(resource).await;
                        break;
                    }
                    created += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to create pooled resource");
                    self.emit(PoolEvent::CreateError(e.to_string()));
                    self.release_slot();
                    break;
                }
            }
        }
        created
    }

    /// Destroy idle resources past their idle timeout or max lifetime.
    async fn evict(&self) -> usize {
        let idle_timeout = self.config.idle_timeout_duration();
        let max_lifetime = self.config.max_lifetime_duration();
        let expired: Vec<_> = {
            let mut state = self.lock();
            let (expired, keep): (VecDeque<_>, VecDeque<_>) =
                state.idle.drain(..).partition(|record| {
                    record.last_used.elapsed() >= idle_timeout
                        || max_lifetime.is_some_and(|max| record.created_at.elapsed() >= max)
                });
            state.idle = keep;
            state.destroying += expired.len();
            expired.into_iter().collect()
        };
        let count = expired.len();
        if count > 0 {
            tracing::debug!(count, "evicting idle resources");
        }
        for record in expired {
            self.destroy_counted(record.resource).await;
        }
        count
    }
}

/// Returns an unused pending slot if the creating future is dropped.
struct Reservation<'a, F: Factory> {
    inner: &'a Inner<F>,
    armed: bool,
}

impl<F: Factory> Drop for Reservation<'_, F> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.release_slot();
        }
    }
}

/// A place in the waiter queue. Dropped before its grant is taken, it
/// leaves the queue and returns whatever it was already handed.
struct Ticket<F: Factory> {
    inner: Arc<Inner<F>>,
    id: u64,
    rx: oneshot::Receiver<Grant<F::Resource>>,
    settled: bool,
}

impl<F: Factory> Ticket<F> {
    /// Leave the queue; returns a grant delivered before we got out.
    fn withdraw(&mut self) -> Option<Grant<F::Resource>> {
        self.settled = true;
        if self.inner.lock().remove_waiter(self.id) {
            return None;
        }
        // hand_off sends under the lock, so a delivered grant is visible now
        self.rx.close();
        self.rx.try_recv().ok()
    }
}

impl<F: Factory> Drop for Ticket<F> {
    fn drop(&mut self) {
        if !self.settled
            && let Some(grant) = self.withdraw()
        {
            self.inner.reclaim(grant);
        }
    }
}

/// Outcome of the locked part of `acquire`.
enum Step<F: Factory> {
    Ready(Pooled<F>),
    Create,
    Wait(Ticket<F>),
}

/// A resource checked out of the pool; returned on drop.
pub struct Pooled<F: Factory> {
    record: Option<Record<F::Resource>>,
    pool: Arc<Inner<F>>,
}

impl<F: Factory> Pooled<F> {
    fn new(pool: Arc<Inner<F>>, record: Record<F::Resource>) -> Self {
        Self {
            record: Some(record),
            pool,
        }
    }

    /// Destroy the resource instead of returning it.
    pub fn discard(mut self) {
        if let Some(record) = self.record.take() {
            self.pool.forget(true);
            self.pool.spawn_destroy(record.resource);
        }
    }

    /// Take the resource out of the pool for good.
    pub fn detach(mut self) -> Option<F::Resource> {
        let record = self.record.take()?;
        self.pool.forget(false);
        Some(record.resource)
    }

    /// Time since the resource was created.
    pub fn age(&self) -> Duration {
        self.record
            .as_ref()
            .map(|r| r.created_at.elapsed())
            .unwrap_or_default()
    }
}

impl<F: Factory> Drop for Pooled<F> {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            self.pool.release(record);
        }
    }
}

impl<F: Factory> std::ops::Deref for Pooled<F> {
    type Target = F::Resource;

    fn deref(&self) -> &Self::Target {
        &self
            .record
            .as_ref()
            .expect("Resource should always be present")
            .resource
    }
}

impl<F: Factory> std::ops::DerefMut for Pooled<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self
            .record
            .as_mut()
            .expect("Resource should always be present")
            .resource
    }
}

impl<F: Factory> std::fmt::Debug for Pooled<F>
where
    F::Resource: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Pooled")
            .field(&self.record.as_ref().map(|r| &r.resource))
            .finish()
    }
}

/// # Example
/// ```ignore
/// let pool = ResourcePool::start(factory, PoolConfig::new(2, 10)).await;
/// let mut conn = pool.acquire().await?;
/// conn.query("SELECT 1 FROM SYSIBM.SYSDUMMY1", &[]).await?;
/// drop(conn); // back to the pool
/// pool.drain().await;
/// ```
pub struct ResourcePool<F: Factory> {
    inner: Arc<Inner<F>>,
}

impl<F: Factory> Clone for ResourcePool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: Factory> ResourcePool<F> {
    /// Create an empty pool. Inside a tokio runtime this also starts the
    /// idle sweep, which first runs one `idle_check_interval` from now.
    pub fn new(factory: F, config: PoolConfig) -> Self {
        Self::build(factory, config, None)
    }

    /// Create the pool and open `min_pool_size` resources before returning.
    pub async fn start(factory: F, config: PoolConfig) -> Self {
        let pool = Self::new(factory, config);
        pool.fill().await;
        pool
    }

    pub fn with_validator(
        factory: F,
        config: PoolConfig,
        validator: impl Fn(&F::Resource) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::build(factory, config, Some(Arc::new(validator)))
    }

    fn build(factory: F, config: PoolConfig, validator: Option<Validator<F::Resource>>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let inner = Arc::new(Inner {
            factory,
            config,
            validator,
            state: Mutex::new(State {
                idle: VecDeque::new(),
                in_use: 0,
                pending: 0,
                destroying: 0,
                waiters: VecDeque::new(),
                next_waiter: 0,
                draining: false,
                total_created: 0,
            }),
            events,
            drained: Notify::new(),
        });
        spawn_sweeper(&inner);
        Self { inner }
    }

    /// Acquire a resource: idle first, then a new one while under
    /// `max_pool_size`, else wait in line up to `acquire_timeout`.
    pub async fn acquire(&self) -> Result<Pooled<F>, PoolError> {
        let mut ticket = match self.next_step()? {
            Step::Ready(pooled) => {
                self.inner.emit(PoolEvent::Acquire);
                return Ok(pooled);
            }
            Step::Create => return self.inner.create_reserved().await,
            Step::Wait(ticket) => ticket,
        };

        let timeout = self.inner.config.acquire_timeout_duration();
        let grant = match tokio::time::timeout(timeout, &mut ticket.rx).await {
            Ok(Ok(grant)) => {
                ticket.settled = true;
                grant
            }
            Ok(Err(_)) => {
                ticket.settled = true;
                return Err(PoolError::Draining);
            }
            Err(_) => match ticket.withdraw() {
                // Served between the deadline and the lock.
                Some(grant) => grant,
                None => return Err(PoolError::AcquireTimeout(timeout)),
            },
        };

        match grant {
            Grant::Resource(record) => {
                self.inner.emit(PoolEvent::Acquire);
                Ok(Pooled::new(Arc::clone(&self.inner), record))
            }
            Grant::Slot => self.inner.create_reserved().await,
        }
    }

    fn next_step(&self) -> Result<Step<F>, PoolError> {
        let mut state = self.inner.lock();
        if state.draining {
            return Err(PoolError::Draining);
        }
        if let Some(record) = state.idle.pop_back() {
            state.in_use += 1;
            return Ok(Step::Ready(Pooled::new(Arc::clone(&self.inner), record)));
        }
        if state.total() < self.inner.config.max_pool_size {
            state.pending += 1;
            return Ok(Step::Create);
        }
        if let Some(limit) = self.inner.config.max_waiting_clients
            && state.waiters.len() >= limit
        {
            return Err(PoolError::TooManyWaiters(limit));
        }
        let (tx, rx) = oneshot::channel();
        let id = state.next_waiter;
        state.next_waiter += 1;
        state.waiters.push_back(Waiter { id, tx });
        Ok(Step::Wait(Ticket {
            inner: Arc::clone(&self.inner),
            id,
            rx,
            settled: false,
        }))
    }

    /// Top up to `min_pool_size`; returns how many were created.
    /// Creation failures are reported as events.
    pub async fn fill(&self) -> usize {
        self.inner.fill().await
    }

    /// Run one eviction pass now; returns how many were evicted.
    pub async fn evict_idle(&self) -> usize {
        self.inner.evict().await
    }

    /// Stop serving: queued and future `acquire()` calls fail, idle
    /// resources are destroyed now. Returns once every checked-out
    /// resource has been released and destroyed too.
    pub async fn drain(&self) {
        let idle: Vec<_> = {
            let mut state = self.inner.lock();
            state.draining = true;
            state.waiters.clear();
            state.destroying += state.idle.len();
            state.idle.drain(..).collect()
        };
        tracing::debug!(idle = idle.len(), "draining pool");
        for record in idle {
            self.inner.destroy_counted(record.resource).await;
        }

        loop {
            let notified = self.inner.drained.notified();
            let outstanding = self.inner.lock().outstanding();
            if outstanding == 0 {
                break;
            }
            tracing::debug!(outstanding, "waiting for checked-out resources");
            notified.await;
        }
    }

    /// [`drain`](Self::drain) with an upper bound; `false` if resources
    /// were still out when it expired. The pool keeps draining either way.
    pub async fn drain_timeout(&self, limit: Duration) -> bool {
        tokio::time::timeout(limit, self.drain()).await.is_ok()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.lock().draining
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.inner.events.subscribe()
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.lock();
        PoolStats {
            idle: state.idle.len(),
            in_use: state.in_use,
            pending: state.pending,
            waiting: state.waiters.iter().filter(|w| !w.tx.is_closed()).count(),
            max_size: self.inner.config.max_pool_size,
            total_created: state.total_created,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn factory(&self) -> &F {
        &self.inner.factory
    }
}

fn spawn_sweeper<F: Factory>(inner: &Arc<Inner<F>>) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        tracing::debug!("no runtime available, idle sweep disabled");
        return;
    };
    let weak: Weak<Inner<F>> = Arc::downgrade(inner);
    let period = inner.config.idle_check_interval_duration();
    handle.spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            let Some(inner) = weak.upgrade() else { break };
            if inner.lock().draining {
                break;
            }
            inner.evict().await;
            inner.fill().await;
        }
    });
}
