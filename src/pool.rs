// ABOUTME: Bounded, memory-budgeted pool of private decoders with scoped checkout.
// ABOUTME: Decoders return to the pool when their PooledDecoder guard is dropped.

use crate::context::Database;
use crate::decoder::{Decoder, DecoderConfig};
use crate::types::limits;
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::num::NonZeroUsize;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Configuration options for a decoder pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Configuration of every decoder the pool creates
    pub decoder: DecoderConfig,
    /// Byte budget for idle decoders (see [`DecoderConfig::instance_cost`])
    pub max_memory: usize,
    /// Ceiling on decoders in existence at once; `None` means unbounded
    pub max_instances: Option<NonZeroUsize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            decoder: DecoderConfig::default(),
            max_memory: limits::POOL_MEMORY,
            max_instances: None,
        }
    }
}

impl PoolConfig {
    /// How many idle decoders fit in the memory budget.
    #[must_use]
    pub fn max_idle(&self) -> usize {
        self.max_memory / self.decoder.instance_cost()
    }
}

/// A point-in-time view of pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Decoders created over the pool's lifetime
    pub created: u64,
    /// Decoders dropped on release because the idle budget was full
    pub evicted: u64,
    /// Decoders currently in existence, idle or checked out
    pub live: usize,
    /// Decoders waiting in the pool
    pub idle: usize,
}

struct PoolState {
    idle: Vec<Decoder>,
    live: usize,
    created: u64,
    evicted: u64,
}

type CreateHook = Box<dyn Fn() + Send + Sync>;

/// A thread-safe pool of private decoders.
///
/// A new decoder is created whenever the idle set is empty and the instance
/// ceiling allows it; otherwise `acquire` waits for a release. With no
/// ceiling, `acquire` never waits.
pub struct DecoderPool {
    name: String,
    config: PoolConfig,
    state: Mutex<PoolState>,
    available: Condvar,
    on_create: Option<CreateHook>,
}

static GLOBAL: OnceLock<DecoderPool> = OnceLock::new();

impl DecoderPool {
    /// Create a pool with the given configuration.
    #[must_use]
    pub fn new(name: impl Into<String>, config: PoolConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                live: 0,
                created: 0,
                evicted: 0,
            }),
            available: Condvar::new(),
            on_create: None,
        }
    }

    /// The process-wide pool with default configuration.
    pub fn global() -> &'static DecoderPool {
        GLOBAL.get_or_init(|| DecoderPool::new("decoders", PoolConfig::default()))
    }

    /// Register a hook that fires whenever the pool has to create a decoder.
    #[must_use]
    pub fn on_create(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_create = Some(Box::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Snapshot the pool counters.
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            created: state.created,
            evicted: state.evicted,
            live: state.live,
            idle: state.idle.len(),
        }
    }

    /// Check out a rewound decoder bound to `database`, waiting if the
    /// instance ceiling has been reached.
    pub fn acquire(&self, database: Option<Arc<dyn Database>>) -> PooledDecoder<'_> {
        let reused = {
            let mut state = self.state.lock();
            loop {
                if let Some(slot) = self.take_slot(&mut state) {
                    break slot;
                }
                self.available.wait(&mut state);
            }
        };
        self.checkout(reused, database)
    }

    /// Check out a decoder without waiting; `None` when the ceiling is reached.
    pub fn try_acquire(&self, database: Option<Arc<dyn Database>>) -> Option<PooledDecoder<'_>> {
        let reused = {
            let mut state = self.state.lock();
            self.take_slot(&mut state)?
        };
        Some(self.checkout(reused, database))
    }

    /// Pop an idle decoder, or reserve room for a new one.
    ///
    /// `Some(None)` means a new decoder may be created; `None` means neither
    /// is possible right now.
    fn take_slot(&self, state: &mut PoolState) -> Option<Option<Decoder>> {
        if let Some(decoder) = state.idle.pop() {
            return Some(Some(decoder));
        }
        let has_room = self
            .config
            .max_instances
            .map_or(true, |max| state.live < max.get());
        if !has_room {
            return None;
        }
        state.live += 1;
        state.created += 1;
        Some(None)
    }

    fn checkout(
        &self,
        reused: Option<Decoder>,
        database: Option<Arc<dyn Database>>,
    ) -> PooledDecoder<'_> {
        let mut decoder = match reused {
            Some(decoder) => decoder,
            None => {
                let reservation = Reservation { pool: self };
                let decoder = self.create();
                std::mem::forget(reservation);
                decoder
            }
        };
        decoder.reset();
        decoder.set_database(database);
        PooledDecoder {
            pool: self,
            decoder: Some(decoder),
        }
    }

    fn create(&self) -> Decoder {
        debug!(pool = %self.name, "creating new decoder");
        if let Some(hook) = &self.on_create {
            hook();
        }
        Decoder::new_private(self.config.decoder.clone())
    }

    fn release(&self, mut decoder: Decoder) {
        decoder.set_database(None);

        let evicted = {
            let mut state = self.state.lock();
            if state.idle.len() < self.config.max_idle() {
                state.idle.push(decoder);
                None
            } else {
                state.live -= 1;
                state.evicted += 1;
                Some(decoder)
            }
        };
        if evicted.is_some() {
            debug!(pool = %self.name, "idle budget full, dropping decoder");
        }
        drop(evicted);
        self.available.notify_one();
    }
}

/// A slot reserved by `take_slot` for a decoder that is still being created.
///
/// Dropped only if creation unwinds, in which case the slot is handed back.
struct Reservation<'a> {
    pool: &'a DecoderPool,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.pool.state.lock();
            state.live -= 1;
            state.created -= 1;
        }
        self.pool.available.notify_one();
    }
}

impl std::fmt::Debug for DecoderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderPool")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// A decoder checked out of a [`DecoderPool`].
///
/// Dropping the guard returns the decoder to the pool, including when a
/// decode fails part way.
pub struct PooledDecoder<'a> {
    pool: &'a DecoderPool,
    decoder: Option<Decoder>,
}

impl PooledDecoder<'_> {
    pub fn pool(&self) -> &DecoderPool {
        self.pool
    }
}

impl Deref for PooledDecoder<'_> {
    type Target = Decoder;

    fn deref(&self) -> &Decoder {
        self.decoder.as_ref().expect("decoder present until drop")
    }
}

impl DerefMut for PooledDecoder<'_> {
    fn deref_mut(&mut self) -> &mut Decoder {
        self.decoder.as_mut().expect("decoder present until drop")
    }
}

impl Drop for PooledDecoder<'_> {
    fn drop(&mut self) {
        if let Some(decoder) = self.decoder.take() {
            self.pool.release(decoder);
        }
    }
}

impl std::fmt::Debug for PooledDecoder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PooledDecoder").field(&self.decoder).finish()
    }
}
