//! Host object references.
//!
//! Host objects (promises, timers, abort controllers, task thenables) live
//! behind an [`ObjectRef`]. Two references are the same object exactly when
//! they share an allocation, which is what the handle bridge keys on.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Upcasting helpers, implemented for every sized `'static` type.
pub trait AsAny: Any {
    /// Borrows `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// Converts a shared pointer into `Rc<dyn Any>` without reallocating.
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// A kind of object owned by the host environment.
pub trait HostObject: AsAny + fmt::Debug {
    /// Short class name used in diagnostics.
    fn class_name(&self) -> &'static str;

    /// The object to subscribe to when this object is awaited.
    ///
    /// Objects that merely carry a promise (such as a timer) return it here;
    /// promises themselves and plain objects return `None`.
    fn thenable(&self) -> Option<ObjectRef> {
        None
    }
}

/// Shared reference to a host object.
///
/// # Examples
///
/// ```
/// use core_types::{HostObject, ObjectRef};
///
/// #[derive(Debug)]
/// struct Marker(u8);
///
/// impl HostObject for Marker {
///     fn class_name(&self) -> &'static str {
///         "Marker"
///     }
/// }
///
/// let a = ObjectRef::new(Marker(7));
/// let b = a.clone();
/// assert!(a.ptr_eq(&b));
/// assert_eq!(a.downcast_ref::<Marker>().map(|m| m.0), Some(7));
/// ```
#[derive(Clone)]
pub struct ObjectRef(Rc<dyn HostObject>);

impl ObjectRef {
    /// Allocates a new host object.
    pub fn new<T: HostObject>(object: T) -> Self {
        Self(Rc::new(object))
    }

    /// Wraps an existing allocation, keeping its identity.
    pub fn from_rc<T: HostObject>(object: Rc<T>) -> Self {
        Self(object)
    }

    /// Address-based identity of the referenced object.
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Returns true if both references point at the same object.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        self.identity() == other.identity()
    }

    /// Short class name of the referenced object.
    pub fn class_name(&self) -> &'static str {
        self.0.class_name()
    }

    /// See [`HostObject::thenable`].
    pub fn thenable(&self) -> Option<ObjectRef> {
        self.0.thenable()
    }

    /// Borrows the object as a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        AsAny::as_any(&*self.0).downcast_ref::<T>()
    }

    /// Recovers the shared allocation as a concrete type.
    pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
        AsAny::into_any(Rc::clone(&self.0)).downcast::<T>().ok()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#x}", self.class_name(), self.identity())
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}
