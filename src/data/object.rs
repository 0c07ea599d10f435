//! Shared data objects.
//!
//! An [`Object`] is a reference-counted entity with a process-unique id, one
//! payload from a closed set of kinds and a `modified` signal. Access to the
//! payload goes through [`Object::read`] / [`Object::write`], which take the
//! object's lock for the duration of the closure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::warn;

use crate::com::{Signal, Signals};
use crate::error::DataError;

use super::medical::{
    Boolean, Composite, Float, Image, Integer, Matrix4, Series, SeriesSet, StringValue, Vector,
};

/// Key of the `modified` signal in every object's signal holder.
pub const MODIFIED_SIGNAL: &str = "modified";

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// Payload
// =============================================================================

/// Payload of an object.
#[derive(Debug, Clone)]
pub enum ObjectData {
    Image(Image),
    Series(Series),
    SeriesSet(SeriesSet),
    Matrix(Matrix4),
    Vector(Vector),
    Composite(Composite),
    String(StringValue),
    Integer(Integer),
    Float(Float),
    Boolean(Boolean),
}

impl ObjectData {
    /// Kind name, as used in object ids and error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ObjectData::Image(_) => Image::NAME,
            ObjectData::Series(_) => Series::NAME,
            ObjectData::SeriesSet(_) => SeriesSet::NAME,
            ObjectData::Matrix(_) => Matrix4::NAME,
            ObjectData::Vector(_) => Vector::NAME,
            ObjectData::Composite(_) => Composite::NAME,
            ObjectData::String(_) => StringValue::NAME,
            ObjectData::Integer(_) => Integer::NAME,
            ObjectData::Float(_) => Float::NAME,
            ObjectData::Boolean(_) => Boolean::NAME,
        }
    }
}

/// Typed view on one [`ObjectData`] variant.
pub trait DataKind: Send + Sync + Sized + 'static {
    const NAME: &'static str;

    fn from_data(data: &ObjectData) -> Option<&Self>;
    fn from_data_mut(data: &mut ObjectData) -> Option<&mut Self>;
    fn into_data(self) -> ObjectData;
}

macro_rules! data_kind {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl DataKind for $ty {
            const NAME: &'static str = $name;

            fn from_data(data: &ObjectData) -> Option<&Self> {
                match data {
                    ObjectData::$variant(value) => Some(value),
                    _ => None,
                }
            }

            fn from_data_mut(data: &mut ObjectData) -> Option<&mut Self> {
                match data {
                    ObjectData::$variant(value) => Some(value),
                    _ => None,
                }
            }

            fn into_data(self) -> ObjectData {
                ObjectData::$variant(self)
            }
        }
    };
}

data_kind!(Image, Image, "Image");
data_kind!(Series, Series, "Series");
data_kind!(SeriesSet, SeriesSet, "SeriesSet");
data_kind!(Matrix4, Matrix, "Matrix4");
data_kind!(Vector, Vector, "Vector");
data_kind!(Composite, Composite, "Composite");
data_kind!(StringValue, String, "String");
data_kind!(Integer, Integer, "Integer");
data_kind!(Float, Float, "Float");
data_kind!(Boolean, Boolean, "Boolean");

// =============================================================================
// Object
// =============================================================================

/// A shared domain entity.
pub struct Object {
    id: String,
    payload: RwLock<ObjectData>,
    signals: Signals,
    modified: Arc<Signal<()>>,
}

impl Object {
    /// Create an object with a generated id `"<Kind>-<n>"`.
    pub fn new<T: DataKind>(value: T) -> Arc<Self> {
        let n = NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed);
        Self::with_id(format!("{}-{}", T::NAME, n), value)
    }

    /// Create an object with a caller-chosen id.
    pub fn with_id<T: DataKind>(id: impl Into<String>, value: T) -> Arc<Self> {
        let id = id.into();
        let signals = Signals::new();
        let modified = Signal::<()>::new(MODIFIED_SIGNAL);
        // A fresh holder cannot already contain the key.
        if let Err(e) = signals.insert(MODIFIED_SIGNAL, Arc::clone(&modified)) {
            warn!(object = %id, error = %e, "could not register modified signal");
        }

        Arc::new(Self {
            id,
            payload: RwLock::new(value.into_data()),
            signals,
            modified,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Kind name of the payload.
    pub fn kind(&self) -> &'static str {
        self.payload
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .kind_name()
    }

    /// Whether the payload is a `T`.
    pub fn is<T: DataKind>(&self) -> bool {
        T::from_data(&self.payload.read().unwrap_or_else(PoisonError::into_inner)).is_some()
    }

    /// Run `f` on the payload under the read lock.
    pub fn read<T: DataKind, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, DataError> {
        let guard = self.payload.read().unwrap_or_else(PoisonError::into_inner);
        let value = T::from_data(&guard).ok_or(DataError::TypeMismatch {
            expected: T::NAME,
            actual: guard.kind_name(),
        })?;
        Ok(f(value))
    }

    /// Run `f` on the payload under the write lock.
    pub fn write<T: DataKind, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, DataError> {
        let mut guard = self.payload.write().unwrap_or_else(PoisonError::into_inner);
        let actual = guard.kind_name();
        let value = T::from_data_mut(&mut guard).ok_or(DataError::TypeMismatch {
            expected: T::NAME,
            actual,
        })?;
        Ok(f(value))
    }

    /// Clone of the whole payload.
    pub fn snapshot(&self) -> ObjectData {
        self.payload
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    pub fn modified_signal(&self) -> &Arc<Signal<()>> {
        &self.modified
    }

    /// Asynchronously emit the `modified` signal.
    pub fn notify_modified(&self) {
        self.modified.async_emit(());
    }
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::com::Slot;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = Object::new(Integer(1));
        let b = Object::new(Integer(2));
        assert!(a.id().starts_with("Integer-"));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_with_id() {
        let obj = Object::with_id("seriesSet", SeriesSet::new());
        assert_eq!(obj.id(), "seriesSet");
        assert_eq!(obj.kind(), "SeriesSet");
    }

    #[test]
    fn test_type_dispatch() {
        let obj = Object::new(Float(1.5));
        assert!(obj.is::<Float>());
        assert!(!obj.is::<Integer>());

        let value = obj.read::<Float, _>(|f| f.0).unwrap();
        assert_eq!(value, 1.5);

        let err = obj.read::<Image, _>(|_| ()).unwrap_err();
        assert!(matches!(
            err,
            DataError::TypeMismatch { expected: "Image", actual: "Float" }
        ));
    }

    #[test]
    fn test_write_updates_payload() {
        let obj = Object::new(StringValue("before".into()));
        obj.write::<StringValue, _>(|s| s.0 = "after".into()).unwrap();
        assert_eq!(
            obj.read::<StringValue, _>(|s| s.0.clone()).unwrap(),
            "after"
        );
        assert!(obj.write::<Boolean, _>(|b| b.0 = true).is_err());
    }

    #[test]
    fn test_modified_signal_by_name() {
        let obj = Object::new(Boolean(false));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let slot = Slot::new("count", move |()| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        obj.signals()
            .get::<()>(MODIFIED_SIGNAL)
            .unwrap()
            .connect(&slot);
        obj.notify_modified();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
