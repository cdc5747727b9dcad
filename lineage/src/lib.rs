//! Lineage: class-style inheritance for composed values
//!
//! Types that embed [`Object`] (directly or through other such types) get a
//! per-instance method table at construction, which gives them virtual
//! overriding, `Super` calls to the next more-base implementation, and
//! `Inherited` calls that jump to the most-derived override.

pub mod class;
pub mod contract;
pub mod error;
pub mod factory;
pub mod locate;
pub mod object;
pub mod runtime;
pub mod table;
pub mod value;

pub use class::{Call, Class, ClassDef, ClassId, Frame, PARENT_TAG};
pub use contract::Contract;
pub use error::{ClassError, Result};
pub use factory::{create, extends, new, try_create, try_extends, try_new, Options};
pub use object::{Object, SuperCall};
pub use runtime::initialize;
pub use table::{MethodChain, MethodTable};
pub use value::{Kind, Signature, Value};
