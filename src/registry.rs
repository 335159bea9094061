// Active bridge registry
//
// The native boundary has no bridge handle of its own: every exported call
// resolves the single active bridge through this registry. A bridge is
// installed explicitly after construction and removed explicitly at
// teardown; a second install while one is active is refused.

use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::Lazy;
use tracing::{debug, info};

use crate::bridge::EngineServices;
use crate::error::BridgeError;

static ACTIVE: Lazy<Mutex<Option<Arc<EngineServices>>>> = Lazy::new(|| Mutex::new(None));

fn slot() -> MutexGuard<'static, Option<Arc<EngineServices>>> {
    match ACTIVE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Register `services` as the target of native calls
pub fn install(services: Arc<EngineServices>) -> Result<(), BridgeError> {
    let mut active = slot();
    if active.is_some() {
        return Err(BridgeError::AlreadyActive);
    }
    *active = Some(services);
    info!("bridge registered");
    Ok(())
}

/// Remove the active bridge and hand it back
pub fn uninstall() -> Result<Arc<EngineServices>, BridgeError> {
    let services = slot().take().ok_or(BridgeError::NotActive)?;
    info!("bridge unregistered");
    Ok(services)
}

/// Remove `services` only if it is the active bridge
pub fn release(services: &Arc<EngineServices>) -> bool {
    let mut active = slot();
    match active.as_ref() {
        Some(current) if Arc::ptr_eq(current, services) => {
            *active = None;
            info!("bridge unregistered");
            true
        }
        _ => {
            debug!("bridge was not registered");
            false
        }
    }
}

pub fn is_active() -> bool {
    slot().is_some()
}

/// The active bridge
///
/// The registry lock is held only for the clone, so a call that blocks
/// (a paused `fillBuffer`) never holds it.
pub fn active() -> Result<Arc<EngineServices>, BridgeError> {
    slot().clone().ok_or(BridgeError::NotActive)
}

/// Serializes tests that touch the process-wide registry
#[cfg(test)]
pub(crate) static TEST_GUARD: Mutex<()> = Mutex::new(());
