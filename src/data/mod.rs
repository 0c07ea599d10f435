//! Data objects and data pointers.

mod medical;
mod object;
mod ptr;

pub use medical::{
    Boolean, Composite, Equipment, Float, Image, Integer, Matrix4, Patient, Series, SeriesSet,
    StringValue, Study, Vector,
};
pub use object::{DataKind, Object, ObjectData, MODIFIED_SIGNAL};
pub use ptr::{
    access, group_key, Access, BindingInfo, HasData, OutputSink, Property, Ptr, PtrVector,
};
