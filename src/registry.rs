//! Hot-reloadable holder for the active locator
//!
//! Readers never lock: [`LocatorRegistry::lookup`] loads the current
//! `Arc<Locator>` through an [`ArcSwapOption`] and keeps it alive for the
//! duration of the call, so a lookup racing a reload is answered by whichever
//! generation it loaded, and that generation cannot be freed underneath it.
//!
//! Writers (`initialize`, `reload`) are serialized by one mutex held across
//! decode and install. The registry also retains the generation it replaced
//! until the following reload, so generation G is released no earlier than
//! the install of G+2 (and only once no reader holds a snapshot of it).
//!
//! # Examples
//!
//! ```no_run
//! use iploc::LocatorRegistry;
//!
//! let registry = LocatorRegistry::builder()
//!     .on_reload(|event| {
//!         if !event.success {
//!             eprintln!("reload failed: {}", event.error.unwrap_or_default());
//!         }
//!     })
//!     .build();
//!
//! registry.initialize("17monipdb.dat")?;
//! let record = registry.lookup("1.2.3.4")?;
//!
//! // Later, from a refresh task:
//! registry.reload("17monipdb.dat")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::{InitError, LookupError, ReloadError};
use crate::locator::{parse_address, Locator, LocatorOptions};
use crate::record::LocationRecord;
use crate::source::DatabaseSource;
use arc_swap::ArcSwapOption;
use std::error::Error;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Event fired after every reload attempt
#[derive(Debug, Clone)]
pub struct ReloadEvent {
    /// Description of the source that was loaded
    pub source: String,
    /// Whether reload succeeded
    pub success: bool,
    /// Error message if reload failed (None on success)
    pub error: Option<String>,
    /// Generation counter after the attempt
    pub generation: u64,
}

/// Callback type for reload notifications
pub type ReloadCallback = Arc<dyn Fn(ReloadEvent) + Send + Sync>;

/// Writer-side bookkeeping, guarded by the registry mutex
#[derive(Default)]
struct Generations {
    /// Generation replaced by the most recent reload
    previous: Option<Arc<Locator>>,
    /// Number of successful installs so far
    generation: u64,
}

/// Builder for a [`LocatorRegistry`]
#[derive(Default)]
pub struct RegistryBuilder {
    options: LocatorOptions,
    on_reload: Option<ReloadCallback>,
}

impl RegistryBuilder {
    /// Options used for every generation the registry loads
    pub fn options(mut self, options: LocatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Set callback for reload notifications
    ///
    /// Runs on the reloading thread after the registry lock is released.
    pub fn on_reload<F>(mut self, callback: F) -> Self
    where
        F: Fn(ReloadEvent) + Send + Sync + 'static,
    {
        self.on_reload = Some(Arc::new(callback));
        self
    }

    /// Create the (empty) registry
    pub fn build(self) -> LocatorRegistry {
        LocatorRegistry {
            current: ArcSwapOption::empty(),
            state: Mutex::new(Generations::default()),
            options: self.options,
            on_reload: self.on_reload,
        }
    }
}

/// Holder of the active locator generation
pub struct LocatorRegistry {
    current: ArcSwapOption<Locator>,
    state: Mutex<Generations>,
    options: LocatorOptions,
    on_reload: Option<ReloadCallback>,
}

impl Default for LocatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LocatorRegistry {
    /// Empty registry with default options
    pub fn new() -> Self {
        RegistryBuilder::default().build()
    }

    /// Configure a registry
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Install the first generation
    ///
    /// Does nothing if a generation is already installed, even if `source`
    /// would not decode.
    pub fn initialize(&self, source: impl Into<DatabaseSource>) -> Result<(), InitError> {
        let mut state = self.lock_state();
        if self.current.load().is_some() {
            log::debug!("locator already initialized at generation {}", state.generation);
            return Ok(());
        }

        let source = source.into();
        let description = source.to_string();
        let locator = Arc::new(Locator::load(source, &self.options)?);
        let stats = locator.stats();
        self.current.store(Some(locator));
        state.generation += 1;
        log::info!(
            "locator initialized from {}: {} ranges, {} text bytes (generation {})",
            description,
            stats.ranges,
            stats.text_bytes,
            state.generation
        );
        Ok(())
    }

    /// Build a new generation and make it active
    ///
    /// On failure the active generation keeps serving. Returns the new
    /// generation number.
    pub fn reload(&self, source: impl Into<DatabaseSource>) -> Result<u64, ReloadError> {
        let source = source.into();
        let description = source.to_string();

        let mut state = self.lock_state();
        let outcome = match Locator::load(source, &self.options) {
            Ok(locator) => {
                let locator = Arc::new(locator);
                let stats = locator.stats();
                let outgoing = self.current.swap(Some(locator));
                let evicted = std::mem::replace(&mut state.previous, outgoing);
                state.generation += 1;
                if evicted.is_some() {
                    log::debug!(
                        "released registry hold on generation {}",
                        state.generation.saturating_sub(2)
                    );
                }
                log::info!(
                    "locator reloaded from {}: {} ranges, {} text bytes (generation {})",
                    description,
                    stats.ranges,
                    stats.text_bytes,
                    state.generation
                );
                Ok(state.generation)
            }
            Err(e) => {
                log::warn!(
                    "reload from {} failed, keeping generation {}: {}",
                    description,
                    state.generation,
                    error_chain(&e)
                );
                Err(ReloadError(e))
            }
        };
        let generation = state.generation;
        drop(state);

        if let Some(callback) = &self.on_reload {
            callback(ReloadEvent {
                source: description,
                success: outcome.is_ok(),
                error: outcome.as_ref().err().map(|e| error_chain(&e.0)),
                generation,
            });
        }
        outcome
    }

    /// Look up an address given as text against the active generation
    pub fn lookup(&self, addr: &str) -> Result<LocationRecord, LookupError> {
        let addr = parse_address(addr)?;
        self.lookup_u32(addr)
    }

    /// Look up an IPv4 address against the active generation
    pub fn lookup_ipv4(&self, addr: Ipv4Addr) -> Result<LocationRecord, LookupError> {
        self.lookup_u32(u32::from(addr))
    }

    /// Look up a host-order address against the active generation
    pub fn lookup_u32(&self, addr: u32) -> Result<LocationRecord, LookupError> {
        let current = self.current.load();
        match &*current {
            Some(locator) => locator.find_by_u32(addr),
            None => Err(LookupError::NotInitialized),
        }
    }

    /// Pin the active generation
    ///
    /// Useful when several lookups must be answered by the same data.
    pub fn snapshot(&self) -> Option<Arc<Locator>> {
        self.current.load_full()
    }

    /// True once a generation has been installed
    pub fn is_initialized(&self) -> bool {
        self.current.load().is_some()
    }

    /// Number of successful installs (0 before initialization)
    pub fn generation(&self) -> u64 {
        self.lock_state().generation
    }

    /// Generations the registry itself keeps alive (0, 1 or 2)
    pub fn retained_generations(&self) -> usize {
        let state = self.lock_state();
        usize::from(self.current.load().is_some()) + usize::from(state.previous.is_some())
    }

    /// Options applied to every generation
    pub fn options(&self) -> &LocatorOptions {
        &self.options
    }

    fn lock_state(&self) -> MutexGuard<'_, Generations> {
        // Every update leaves the bookkeeping consistent, so a panic while
        // holding the lock cannot corrupt it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An error followed by each of its sources, colon-separated
fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl fmt::Debug for LocatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocatorRegistry")
            .field("generation", &self.generation())
            .field("current", &self.snapshot())
            .field("options", &self.options)
            .finish()
    }
}
