//! Handle bridge.
//!
//! Native code never holds host values directly; it holds [`Handle`]s into a
//! reference-counted table. `undefined`, `null`, `true` and `false` have fixed
//! handles that are never allocated or freed. A host object maps to at most
//! one live handle at a time, so converting the same object twice yields the
//! same handle with its count bumped.
//!
//! The table is the only mutable state shared between the host side and the
//! scheduler. Its borrow is never held while host code runs: values leaving
//! the table are cloned or moved out first, and values being freed are
//! dropped after the borrow ends.

use crate::error::BridgeError;
use core_types::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

const RESERVED: u32 = 4;

/// Opaque reference to a host value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    /// Handle of `undefined`.
    pub const UNDEFINED: Handle = Handle(0);
    /// Handle of `null`.
    pub const NULL: Handle = Handle(1);
    /// Handle of `true`.
    pub const TRUE: Handle = Handle(2);
    /// Handle of `false`.
    pub const FALSE: Handle = Handle(3);

    /// Rebuilds a handle from its raw number, as received over the boundary.
    pub fn from_raw(raw: u32) -> Self {
        Handle(raw)
    }

    /// Raw handle number.
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns true for the four fixed handles.
    pub fn is_reserved(&self) -> bool {
        self.0 < RESERVED
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct Slot {
    value: Value,
    refs: u32,
}

#[derive(Debug, Default)]
struct HandleTable {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    by_identity: HashMap<usize, Handle>,
    live: usize,
}

impl HandleTable {
    fn slot_mut(&mut self, handle: Handle) -> Result<&mut Slot, BridgeError> {
        let index = (handle.0 - RESERVED) as usize;
        self.slots
            .get_mut(index)
            .and_then(Option::as_mut)
            .ok_or(BridgeError::InvalidHandle(handle))
    }

    fn insert(&mut self, value: Value) -> Handle {
        let slot = Some(Slot { value, refs: 1 });
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = slot;
                index
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };
        self.live += 1;
        Handle(index as u32 + RESERVED)
    }
}

/// Bidirectional mapping between host values and handles.
///
/// Clones share one table.
///
/// # Examples
///
/// ```
/// use coro_bridge::{Handle, HandleBridge};
/// use core_types::Value;
///
/// let bridge = HandleBridge::new();
/// assert_eq!(bridge.to_handle(Value::Undefined), Handle::UNDEFINED);
///
/// let h = bridge.to_handle(Value::Smi(42));
/// assert_eq!(bridge.to_value(h).unwrap(), Value::Smi(42));
/// bridge.release(h).unwrap();
/// assert!(bridge.to_value(h).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct HandleBridge {
    table: Rc<RefCell<HandleTable>>,
}

impl HandleBridge {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle for `value`, owning one reference.
    pub fn to_handle(&self, value: Value) -> Handle {
        match &value {
            Value::Undefined => return Handle::UNDEFINED,
            Value::Null => return Handle::NULL,
            Value::Boolean(true) => return Handle::TRUE,
            Value::Boolean(false) => return Handle::FALSE,
            _ => {}
        }

        let mut table = self.table.borrow_mut();
        let identity = value.as_object().map(|obj| obj.identity());
        if let Some(identity) = identity {
            if let Some(&handle) = table.by_identity.get(&identity) {
                if let Ok(slot) = table.slot_mut(handle) {
                    slot.refs += 1;
                    return handle;
                }
            }
        }
        let handle = table.insert(value);
        if let Some(identity) = identity {
            table.by_identity.insert(identity, handle);
        }
        handle
    }

    /// Returns the value behind `handle` without touching its count.
    pub fn to_value(&self, handle: Handle) -> Result<Value, BridgeError> {
        match handle {
            Handle::UNDEFINED => Ok(Value::Undefined),
            Handle::NULL => Ok(Value::Null),
            Handle::TRUE => Ok(Value::Boolean(true)),
            Handle::FALSE => Ok(Value::Boolean(false)),
            _ => Ok(self.table.borrow_mut().slot_mut(handle)?.value.clone()),
        }
    }

    /// Adds a reference to `handle`.
    pub fn retain(&self, handle: Handle) -> Result<(), BridgeError> {
        if handle.is_reserved() {
            return Ok(());
        }
        self.table.borrow_mut().slot_mut(handle)?.refs += 1;
        Ok(())
    }

    /// Drops one reference to `handle`, freeing the slot on the last one.
    ///
    /// Releasing a fixed handle is a no-op.
    pub fn release(&self, handle: Handle) -> Result<(), BridgeError> {
        if handle.is_reserved() {
            return Ok(());
        }
        let freed = {
            let mut table = self.table.borrow_mut();
            let slot = table.slot_mut(handle)?;
            slot.refs -= 1;
            if slot.refs > 0 {
                return Ok(());
            }
            let index = (handle.0 - RESERVED) as usize;
            let freed = table.slots[index].take();
            table.free.push(index);
            table.live -= 1;
            let identity = freed
                .as_ref()
                .and_then(|s| s.value.as_object())
                .map(|obj| obj.identity());
            if let Some(identity) = identity {
                table.by_identity.remove(&identity);
            }
            freed
        };
        // Dropped outside the borrow: the value may own host objects whose
        // destructors call back into the bridge.
        drop(freed);
        Ok(())
    }

    /// Reads the value behind `handle` and releases the handle.
    pub fn take(&self, handle: Handle) -> Result<Value, BridgeError> {
        let value = self.to_value(handle)?;
        self.release(handle)?;
        Ok(value)
    }

    /// Returns true if `handle` can currently be resolved.
    pub fn is_live(&self, handle: Handle) -> bool {
        self.to_value(handle).is_ok()
    }

    /// Number of allocated (non-fixed) handles.
    pub fn len(&self) -> usize {
        self.table.borrow().live
    }

    /// Returns true if no handle is allocated.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frees every allocated handle regardless of its count.
    pub fn clear(&self) {
        let table = std::mem::take(&mut *self.table.borrow_mut());
        drop(table);
    }
}
