//! Data pointers and their owning container.
//!
//! A [`HasData`] container indexes every data pointer of its owner by
//! `(key, index)`. Pointers register themselves on construction and
//! unregister on drop, so the container always reflects the pointers that are
//! alive.
//!
//! ```text
//!   HasData ──(key, index)──► PtrSlot { binding, access, optional, ... }
//!      ▲                          ▲
//!      │ register / unregister    │ shared state
//!   Ptr<T, A>, PtrVector<T, A>, Property<T>
//! ```
//!
//! Output pointers own their object (`Arc`), input and inout pointers observe
//! it (`Weak`) and report "expired" once the last owner released it.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::DataError;

use super::object::{DataKind, Object};

// =============================================================================
// Access
// =============================================================================

/// Access mode of a data pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    In,
    InOut,
    Out,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::In => write!(f, "input"),
            Access::InOut => write!(f, "inout"),
            Access::Out => write!(f, "output"),
        }
    }
}

/// Compile-time access markers for [`Ptr`].
pub mod access {
    use super::Access;

    pub trait AccessMode: Send + Sync + 'static {
        const ACCESS: Access;
    }

    /// Marker for modes that allow writing the payload.
    pub trait Writable: AccessMode {}

    #[derive(Debug)]
    pub struct In;
    #[derive(Debug)]
    pub struct InOut;
    #[derive(Debug)]
    pub struct Out;

    impl AccessMode for In {
        const ACCESS: Access = Access::In;
    }
    impl AccessMode for InOut {
        const ACCESS: Access = Access::InOut;
    }
    impl AccessMode for Out {
        const ACCESS: Access = Access::Out;
    }

    impl Writable for InOut {}
    impl Writable for Out {}
}

use access::{AccessMode, Writable};

/// Flattened registry key of a pointer: `key` or `key#index` for groups.
pub fn group_key(key: &str, index: Option<usize>) -> String {
    match index {
        Some(index) => format!("{key}#{index}"),
        None => key.to_string(),
    }
}

// =============================================================================
// Pointer slot (shared state)
// =============================================================================

enum Binding {
    Empty,
    Weak(Weak<Object>),
    Strong(Arc<Object>),
}

struct SlotState {
    binding: Binding,
    optional: bool,
    auto_connect: bool,
    deferred_id: Option<String>,
}

struct PtrSlot {
    key: String,
    index: Option<usize>,
    access: Access,
    kind: &'static str,
    accepts: fn(&Object) -> bool,
    state: RwLock<SlotState>,
}

impl PtrSlot {
    fn get(&self) -> Option<Arc<Object>> {
        match &self.state.read().unwrap_or_else(PoisonError::into_inner).binding {
            Binding::Empty => None,
            Binding::Weak(weak) => weak.upgrade(),
            Binding::Strong(strong) => Some(Arc::clone(strong)),
        }
    }

    fn expired(&self) -> bool {
        match &self.state.read().unwrap_or_else(PoisonError::into_inner).binding {
            Binding::Weak(weak) => weak.strong_count() == 0,
            _ => false,
        }
    }

    fn bind(
        &self,
        object: Option<Arc<Object>>,
        auto_connect: Option<bool>,
        optional: Option<bool>,
    ) -> Result<(), DataError> {
        if let Some(object) = &object {
            if !(self.accepts)(object) {
                return Err(DataError::TypeMismatch {
                    expected: self.kind,
                    actual: object.kind(),
                });
            }
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.binding = match object {
            None => Binding::Empty,
            Some(object) if self.access == Access::Out => Binding::Strong(object),
            Some(object) => Binding::Weak(Arc::downgrade(&object)),
        };
        if let Some(auto_connect) = auto_connect {
            state.auto_connect = auto_connect;
        }
        if let Some(optional) = optional {
            state.optional = optional;
        }
        Ok(())
    }

    fn info(&self) -> BindingInfo {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        BindingInfo {
            key: self.key.clone(),
            index: self.index,
            access: self.access,
            kind: self.kind,
            optional: state.optional,
            auto_connect: state.auto_connect,
            deferred_id: state.deferred_id.clone(),
            object: match &state.binding {
                Binding::Empty => None,
                Binding::Weak(weak) => weak.upgrade(),
                Binding::Strong(strong) => Some(Arc::clone(strong)),
            },
        }
    }
}

/// Snapshot of one registered pointer.
#[derive(Debug, Clone)]
pub struct BindingInfo {
    pub key: String,
    pub index: Option<usize>,
    pub access: Access,
    pub kind: &'static str,
    pub optional: bool,
    pub auto_connect: bool,
    pub deferred_id: Option<String>,
    pub object: Option<Arc<Object>>,
}

impl BindingInfo {
    /// Flattened key (`key` or `key#index`).
    pub fn flat_key(&self) -> String {
        group_key(&self.key, self.index)
    }
}

// =============================================================================
// HasData
// =============================================================================

/// Receives output publications of a [`HasData`] container.
pub trait OutputSink: Send + Sync {
    fn output_set(&self, key: &str, object: &Arc<Object>);
    fn output_reset(&self, key: &str);
}

type PtrKey = (String, Option<usize>);

#[derive(Default)]
struct HasDataInner {
    ptrs: RwLock<BTreeMap<PtrKey, Arc<PtrSlot>>>,
    sink: RwLock<Option<Arc<dyn OutputSink>>>,
}

/// Container of the data pointers of one owner. Cloning shares the container.
#[derive(Clone, Default)]
pub struct HasData {
    inner: Arc<HasDataInner>,
}

impl HasData {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, slot: Arc<PtrSlot>) {
        let key = (slot.key.clone(), slot.index);
        let mut ptrs = self
            .inner
            .ptrs
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        assert!(
            !ptrs.contains_key(&key),
            "data pointer '{}' is registered twice",
            group_key(&key.0, key.1)
        );
        trace!(key = %group_key(&key.0, key.1), access = %slot.access, "data pointer registered");
        ptrs.insert(key, slot);
    }

    fn unregister(&self, slot: &Arc<PtrSlot>) {
        let key = (slot.key.clone(), slot.index);
        let mut ptrs = self
            .inner
            .ptrs
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if ptrs.get(&key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            ptrs.remove(&key);
        }
    }

    fn slot(&self, key: &str, index: Option<usize>) -> Result<Arc<PtrSlot>, DataError> {
        self.inner
            .ptrs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(key.to_string(), index))
            .cloned()
            .ok_or_else(|| DataError::UnknownKey(group_key(key, index)))
    }

    fn checked_slot(
        &self,
        key: &str,
        index: Option<usize>,
        requested: Access,
    ) -> Result<Arc<PtrSlot>, DataError> {
        let slot = self.slot(key, index)?;
        if slot.access != requested {
            return Err(DataError::AccessMismatch {
                key: group_key(key, index),
                declared: slot.access,
                requested,
            });
        }
        Ok(slot)
    }

    pub fn contains(&self, key: &str, index: Option<usize>) -> bool {
        self.inner
            .ptrs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&(key.to_string(), index))
    }

    /// Registered `(key, index)` pairs, sorted.
    pub fn keys(&self) -> Vec<(String, Option<usize>)> {
        self.inner
            .ptrs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .ptrs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Declared access mode of a pointer.
    pub fn access(&self, key: &str, index: Option<usize>) -> Option<Access> {
        self.slot(key, index).ok().map(|slot| slot.access)
    }

    /// Object currently bound to a pointer, if alive.
    pub fn get(&self, key: &str, index: Option<usize>) -> Option<Arc<Object>> {
        self.slot(key, index).ok().and_then(|slot| slot.get())
    }

    /// Bind an input pointer.
    pub fn set_input(
        &self,
        key: &str,
        index: Option<usize>,
        object: Option<Arc<Object>>,
    ) -> Result<(), DataError> {
        self.checked_slot(key, index, Access::In)?
            .bind(object, None, None)
    }

    /// Bind an inout pointer.
    pub fn set_inout(
        &self,
        key: &str,
        index: Option<usize>,
        object: Option<Arc<Object>>,
    ) -> Result<(), DataError> {
        self.checked_slot(key, index, Access::InOut)?
            .bind(object, None, None)
    }

    /// Bind an output pointer and publish it to the output sink.
    pub fn set_output(
        &self,
        key: &str,
        index: Option<usize>,
        object: Option<Arc<Object>>,
    ) -> Result<(), DataError> {
        let slot = self.checked_slot(key, index, Access::Out)?;
        slot.bind(object.clone(), None, None)?;
        self.publish(&group_key(key, index), object.as_ref());
        Ok(())
    }

    /// Apply the binding flags of a configuration entry.
    pub fn set_flags(
        &self,
        key: &str,
        index: Option<usize>,
        auto_connect: bool,
        optional: bool,
    ) -> Result<(), DataError> {
        let slot = self.slot(key, index)?;
        let mut state = slot.state.write().unwrap_or_else(PoisonError::into_inner);
        state.auto_connect = auto_connect;
        state.optional = optional;
        Ok(())
    }

    /// Declare the id under which an output will be published.
    pub fn set_deferred_id(
        &self,
        key: &str,
        index: Option<usize>,
        id: impl Into<String>,
    ) -> Result<(), DataError> {
        let slot = self.slot(key, index)?;
        slot.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .deferred_id = Some(id.into());
        Ok(())
    }

    pub fn deferred_id(&self, key: &str, index: Option<usize>) -> Option<String> {
        self.slot(key, index).ok().and_then(|slot| {
            slot.state
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .deferred_id
                .clone()
        })
    }

    /// Deferred id for a flattened key (`key` or `key#index`).
    pub fn deferred_id_for(&self, flat_key: &str) -> Option<String> {
        self.bindings()
            .into_iter()
            .find(|info| info.flat_key() == flat_key)
            .and_then(|info| info.deferred_id)
    }

    /// First non-optional input or inout pointer that is not bound to a live
    /// object.
    pub fn missing_required(&self) -> Option<String> {
        self.bindings()
            .into_iter()
            .find(|info| info.access != Access::Out && !info.optional && info.object.is_none())
            .map(|info| info.flat_key())
    }

    /// Whether every non-optional input and inout pointer is bound.
    pub fn has_all_required(&self) -> bool {
        self.missing_required().is_none()
    }

    /// Number of indexed pointers registered under `key`.
    pub fn group_size(&self, key: &str) -> usize {
        self.inner
            .ptrs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|(k, index)| k == key && index.is_some())
            .count()
    }

    /// Snapshot of every registered pointer, sorted by key.
    pub fn bindings(&self) -> Vec<BindingInfo> {
        self.inner
            .ptrs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|slot| slot.info())
            .collect()
    }

    /// Number of pointers of this container holding `object` strongly.
    pub fn strong_holds(&self, object: &Arc<Object>) -> usize {
        self.inner
            .ptrs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| {
                matches!(
                    &slot.state.read().unwrap_or_else(PoisonError::into_inner).binding,
                    Binding::Strong(held) if Arc::ptr_eq(held, object)
                )
            })
            .count()
    }

    /// Install or remove the receiver of output publications.
    pub fn set_output_sink(&self, sink: Option<Arc<dyn OutputSink>>) {
        *self
            .inner
            .sink
            .write()
            .unwrap_or_else(PoisonError::into_inner) = sink;
    }

    fn publish(&self, flat_key: &str, object: Option<&Arc<Object>>) {
        let sink = self
            .inner
            .sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(sink) = sink {
            match object {
                Some(object) => sink.output_set(flat_key, object),
                None => sink.output_reset(flat_key),
            }
        }
    }
}

impl fmt::Debug for HasData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.keys().iter().map(|(k, i)| group_key(k, *i)))
            .finish()
    }
}

// =============================================================================
// Ptr
// =============================================================================

/// Typed data pointer of kind `T` and access mode `A`.
///
/// Registered in its owner on construction, unregistered on drop.
pub struct Ptr<T: DataKind, A: AccessMode> {
    owner: HasData,
    slot: Arc<PtrSlot>,
    _marker: PhantomData<fn() -> (T, A)>,
}

impl<T: DataKind, A: AccessMode> Ptr<T, A> {
    /// Register a single pointer under `key`.
    ///
    /// # Panics
    /// If `owner` already holds a pointer with the same key.
    pub fn new(owner: &HasData, key: impl Into<String>, optional: bool) -> Self {
        Self::register(owner, key.into(), None, optional)
    }

    /// Register the pointer `index` of the group `key`.
    ///
    /// # Panics
    /// If `owner` already holds a pointer with the same key and index.
    pub fn in_group(owner: &HasData, key: impl Into<String>, index: usize, optional: bool) -> Self {
        Self::register(owner, key.into(), Some(index), optional)
    }

    fn register(owner: &HasData, key: String, index: Option<usize>, optional: bool) -> Self {
        let slot = Arc::new(PtrSlot {
            key,
            index,
            access: A::ACCESS,
            kind: T::NAME,
            accepts: |object| object.is::<T>(),
            state: RwLock::new(SlotState {
                binding: Binding::Empty,
                optional,
                auto_connect: false,
                deferred_id: None,
            }),
        });
        owner.register(Arc::clone(&slot));
        Self {
            owner: owner.clone(),
            slot,
            _marker: PhantomData,
        }
    }

    /// Bind `object` (or reset with `None`).
    ///
    /// For output pointers and `signal == true`, the owner's output sink is
    /// told to register or unregister the object.
    pub fn set(
        &self,
        object: Option<Arc<Object>>,
        auto_connect: bool,
        optional: bool,
        signal: bool,
    ) -> Result<(), DataError> {
        self.slot
            .bind(object.clone(), Some(auto_connect), Some(optional))?;
        if A::ACCESS == Access::Out && signal {
            self.owner
                .publish(&group_key(&self.slot.key, self.slot.index), object.as_ref());
        }
        Ok(())
    }

    /// Release the binding without notifying anyone.
    pub fn reset(&self) {
        // Binding `None` never fails the type check.
        let _ = self.slot.bind(None, None, None);
    }

    pub fn get(&self) -> Option<Arc<Object>> {
        self.slot.get()
    }

    /// Whether the pointer observed an object that has since been released.
    pub fn expired(&self) -> bool {
        self.slot.expired()
    }

    /// Run `f` on the bound payload.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, DataError> {
        self.get()
            .ok_or_else(|| DataError::Expired(self.flat_key()))?
            .read::<T, R>(f)
    }

    pub fn key(&self) -> &str {
        &self.slot.key
    }

    pub fn index(&self) -> Option<usize> {
        self.slot.index
    }

    pub fn access(&self) -> Access {
        A::ACCESS
    }

    pub fn flat_key(&self) -> String {
        group_key(&self.slot.key, self.slot.index)
    }

    pub fn is_optional(&self) -> bool {
        self.slot
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .optional
    }

    pub fn auto_connect(&self) -> bool {
        self.slot
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .auto_connect
    }

    pub fn deferred_id(&self) -> Option<String> {
        self.slot
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .deferred_id
            .clone()
    }
}

impl<T: DataKind, A: Writable> Ptr<T, A> {
    /// Run `f` on the bound payload with write access.
    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, DataError> {
        self.get()
            .ok_or_else(|| DataError::Expired(self.flat_key()))?
            .write::<T, R>(f)
    }
}

impl<T: DataKind, A: AccessMode> Drop for Ptr<T, A> {
    fn drop(&mut self) {
        self.owner.unregister(&self.slot);
    }
}

impl<T: DataKind, A: AccessMode> fmt::Debug for Ptr<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ptr")
            .field("key", &self.flat_key())
            .field("kind", &T::NAME)
            .field("access", &A::ACCESS)
            .finish()
    }
}

// =============================================================================
// PtrVector
// =============================================================================

/// Group of pointers sharing one key, addressed by index.
pub struct PtrVector<T: DataKind, A: AccessMode> {
    owner: HasData,
    key: String,
    min: usize,
    max: usize,
    children: BTreeMap<usize, Ptr<T, A>>,
}

impl<T: DataKind, A: AccessMode> PtrVector<T, A> {
    /// Declare a group of `min..=max` pointers; the first `min` are
    /// registered immediately.
    pub fn new(owner: &HasData, key: impl Into<String>, min: usize, max: usize) -> Self {
        let key = key.into();
        let children = (0..min)
            .map(|index| (index, Ptr::in_group(owner, key.clone(), index, false)))
            .collect();
        Self {
            owner: owner.clone(),
            key,
            min,
            max,
            children,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Pointer at `index`, created on first access.
    ///
    /// # Panics
    /// For non-output groups when the pointer does not exist, or when `index`
    /// exceeds the group maximum.
    pub fn slot(&mut self, index: usize) -> &Ptr<T, A> {
        if !self.children.contains_key(&index) {
            assert!(
                A::ACCESS == Access::Out,
                "only output groups create pointers on access ('{}#{index}')",
                self.key
            );
            assert!(index < self.max, "index {index} exceeds group '{}'", self.key);
        }
        let owner = &self.owner;
        let key = &self.key;
        self.children
            .entry(index)
            .or_insert_with(|| Ptr::in_group(owner, key.clone(), index, true))
    }

    /// Create, update or erase (`None`) the pointer at `index`.
    pub fn set(
        &mut self,
        index: usize,
        object: Option<Arc<Object>>,
        signal: bool,
    ) -> Result<(), DataError> {
        match object {
            None => {
                if let Some(child) = self.children.remove(&index) {
                    if A::ACCESS == Access::Out && signal {
                        child.set(None, false, true, true)?;
                    }
                }
                Ok(())
            }
            Some(object) => {
                let owner = &self.owner;
                let key = &self.key;
                let child = self
                    .children
                    .entry(index)
                    .or_insert_with(|| Ptr::in_group(owner, key.clone(), index, true));
                let auto_connect = child.auto_connect();
                let optional = child.is_optional();
                child.set(Some(object), auto_connect, optional, signal)
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<&Ptr<T, A>> {
        self.children.get(&index)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Ptr<T, A>)> {
        self.children.iter().map(|(index, ptr)| (*index, ptr))
    }
}

impl<T: DataKind, A: AccessMode> fmt::Debug for PtrVector<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PtrVector")
            .field("key", &self.key)
            .field("len", &self.children.len())
            .finish()
    }
}

// =============================================================================
// Property
// =============================================================================

/// Inout pointer with a default payload.
pub struct Property<T: DataKind + Clone> {
    ptr: Ptr<T, access::InOut>,
    default: T,
    default_object: Mutex<Option<Arc<Object>>>,
}

impl<T: DataKind + Clone> Property<T> {
    pub fn new(owner: &HasData, key: impl Into<String>, default: T) -> Self {
        Self {
            ptr: Ptr::new(owner, key, true),
            default,
            default_object: Mutex::new(None),
        }
    }

    /// Install the default object if nothing is bound.
    ///
    /// # Returns
    /// The bound object, default or not.
    pub fn make_default(&self) -> Result<Arc<Object>, DataError> {
        if let Some(object) = self.ptr.get() {
            return Ok(object);
        }
        let mut held = self
            .default_object
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let object = held
            .get_or_insert_with(|| Object::new(self.default.clone()))
            .clone();
        self.ptr.set(Some(Arc::clone(&object)), false, true, false)?;
        Ok(object)
    }

    /// Current value, the default payload if nothing is bound.
    pub fn value(&self) -> T {
        self.ptr
            .read(T::clone)
            .unwrap_or_else(|_| self.default.clone())
    }

    pub fn ptr(&self) -> &Ptr<T, access::InOut> {
        &self.ptr
    }
}
