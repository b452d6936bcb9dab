//! The pool-of-one sharing a single engine connection.

use crate::engine::{Engine, EngineConfig};
use relcache_core::{Error, Result};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
struct PoolState {
    engine: Option<Rc<Engine>>,
    refs: usize,
}

/// An owned pool holding at most one live engine connection.
///
/// Wrapper instances share the connection by explicit reference counting:
/// the first `open` performs the native open, later `open`/`attach` calls
/// hand out clones of the same handle, and `release` closes the native
/// connection once the count reaches zero. The pool is an ordinary owned
/// object, not process-wide state.
pub struct EnginePool {
    state: RefCell<PoolState>,
}

impl EnginePool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            state: RefCell::new(PoolState::default()),
        }
    }

    /// Open the shared connection, or attach to it if it is already open
    /// (the path of a later open is ignored).
    pub fn open(&self, config: &EngineConfig) -> Result<Rc<Engine>> {
        let mut state = self.state.borrow_mut();
        state.check_consistent()?;
        if let Some(engine) = &state.engine {
            let engine = Rc::clone(engine);
            state.refs += 1;
            tracing::debug!(refs = state.refs, "attached to shared connection");
            return Ok(engine);
        }
        let engine = Rc::new(Engine::open(config)?);
        state.engine = Some(Rc::clone(&engine));
        state.refs = 1;
        Ok(engine)
    }

    /// Attach to the already-open shared connection.
    pub fn attach(&self) -> Result<Rc<Engine>> {
        let mut state = self.state.borrow_mut();
        state.check_consistent()?;
        let Some(engine) = &state.engine else {
            return Err(Error::NoConnection);
        };
        let engine = Rc::clone(engine);
        state.refs += 1;
        tracing::debug!(refs = state.refs, "attached to shared connection");
        Ok(engine)
    }

    /// Drop one reference; the native connection closes when the count
    /// reaches zero. A close that stays busy (statements still open)
    /// surfaces as an error and leaves the final reference in place so the
    /// caller can finalize its cursors and release again.
    pub fn release(&self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.check_consistent()?;
        if state.refs == 0 {
            return Err(Error::invariant("release without a matching open"));
        }
        state.refs -= 1;
        if state.refs > 0 {
            return Ok(());
        }
        let Some(engine) = state.engine.take() else {
            return Err(Error::invariant("reference count held no engine handle"));
        };
        if let Err(err) = engine.close() {
            state.engine = Some(engine);
            state.refs = 1;
            return Err(err);
        }
        Ok(())
    }

    /// Number of live references to the shared connection.
    pub fn references(&self) -> usize {
        self.state.borrow().refs
    }

    /// Whether the shared connection is open.
    pub fn is_open(&self) -> bool {
        self.state.borrow().engine.is_some()
    }
}

impl Default for EnginePool {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolState {
    fn check_consistent(&self) -> Result<()> {
        if self.engine.is_some() != (self.refs > 0) {
            return Err(Error::invariant(format!(
                "connection state mismatch: {} references, handle {}",
                self.refs,
                if self.engine.is_some() { "open" } else { "absent" }
            )));
        }
        Ok(())
    }
}
