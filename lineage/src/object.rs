//! The root base type and the dispatch primitives
//!
//! Every instance embeds exactly one [`Object`]. Once a factory has
//! initialized it, the object knows the outermost value it lives in and
//! holds that value's method table, which is what `Inherited` and `Super`
//! consult.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{OnceLock, Weak};

use tracing::trace;

use crate::class::{Class, ClassDef, ClassId, Frame};
use crate::error::{ClassError, Result};
use crate::table::{MethodDescriptor, MethodTable};
use crate::value::Value;

/// State written once by the object runtime
pub(crate) struct Binding {
    pub(crate) anchor: Weak<dyn Any + Send + Sync>,
    pub(crate) class: &'static ClassDef,
    pub(crate) table: MethodTable,
    /// Exported methods of the concrete type that are not in `table`
    pub(crate) direct: HashMap<&'static str, MethodDescriptor>,
}

impl Binding {
    fn dispatch(&self, entry: &MethodDescriptor, args: &[Value], forwarded: bool) -> Result<Value> {
        let root = self.anchor.upgrade().ok_or(ClassError::Detached)?;
        entry.call(&*root, args, forwarded)
    }
}

/// Root base type of every hierarchy
#[derive(Default)]
pub struct Object {
    binding: Option<Binding>,
}

impl Object {
    pub const fn new() -> Self {
        Object { binding: None }
    }

    /// A shared uninitialized object, for `Class::object` on a type whose
    /// nullable parent link is still empty
    pub fn unbound() -> &'static Object {
        static UNBOUND: Object = Object::new();
        &UNBOUND
    }

    pub fn is_initialized(&self) -> bool {
        self.binding.is_some()
    }

    /// Concrete class of the instance this object belongs to
    pub fn class(&self) -> Option<ClassId> {
        self.binding.as_ref().map(|b| b.class.id())
    }

    pub fn table(&self) -> Option<&MethodTable> {
        self.binding.as_ref().map(|b| &b.table)
    }

    pub(crate) fn bind(&mut self, binding: Binding) {
        self.binding = Some(binding);
    }

    fn binding(&self) -> Result<&Binding> {
        self.binding.as_ref().ok_or(ClassError::NotInitialized)
    }

    /// Forward the caller's method to the most-derived implementation.
    ///
    /// `Ok(None)` means not handled: the name is not virtual, the caller is
    /// the most-derived implementation itself, or the caller was reached by
    /// forwarding already. The caller then runs its own body.
    pub fn inherited(&self, frame: Frame, args: &[Value]) -> Result<Option<Value>> {
        let Some(binding) = &self.binding else {
            return Ok(None);
        };
        if frame.is_forwarded() {
            trace!(method = frame.method(), caller = %frame.class(), "inherited: forwarded frame");
            return Ok(None);
        }
        let Some(chain) = binding.table.get(frame.method()) else {
            trace!(method = frame.method(), "inherited: not virtual");
            return Ok(None);
        };
        let head = chain.head();
        if head.owner() == frame.class() {
            trace!(method = frame.method(), caller = %frame.class(), "inherited: caller is most derived");
            return Ok(None);
        }
        trace!(method = frame.method(), caller = %frame.class(), target = %head.owner(), "inherited");
        binding.dispatch(head, args, true).map(Some)
    }

    /// The next more-base implementation of the caller's method
    pub fn super_call(&self, frame: Frame) -> SuperCall<'_> {
        SuperCall {
            object: self,
            caller: frame.class(),
            method: frame.method(),
        }
    }

    /// Like [`Object::super_call`] for another method name
    pub fn super_named<'a>(&'a self, frame: Frame, method: &'a str) -> SuperCall<'a> {
        SuperCall {
            object: self,
            caller: frame.class(),
            method,
        }
    }

    /// Virtual call by name.
    ///
    /// Runs entry 0 of the method's chain; an exported name that is not
    /// virtual runs the concrete type's own method. Unexported methods are
    /// reachable only through the table.
    pub fn invoke(&self, method: &str, args: &[Value]) -> Result<Value> {
        let binding = self.binding()?;
        if let Some(chain) = binding.table.get(method) {
            return binding.dispatch(chain.head(), args, false);
        }
        let entry = binding
            .direct
            .get(method)
            .ok_or_else(|| ClassError::unknown_method(binding.class.name(), method))?;
        binding.dispatch(entry, args, false)
    }

    /// Call the implementation of `method` declared by `class`
    pub fn invoke_as(&self, class: ClassId, method: &str, args: &[Value]) -> Result<Value> {
        let binding = self.binding()?;
        let entry = binding
            .table
            .get(method)
            .and_then(|chain| chain.position(class).and_then(|i| chain.get(i)))
            .ok_or_else(|| ClassError::unknown_method(class.name(), method))?;
        binding.dispatch(entry, args, false)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.binding {
            Some(b) => f
                .debug_struct("Object")
                .field("class", &b.class.id())
                .field("methods", &b.table.names())
                .finish(),
            None => f.write_str("Object(uninitialized)"),
        }
    }
}

impl Class for Object {
    fn class_def() -> &'static ClassDef {
        static DEF: OnceLock<ClassDef> = OnceLock::new();
        DEF.get_or_init(|| ClassDef::builder::<Object>().build())
    }

    fn object(&self) -> &Object {
        self
    }

    fn object_mut(&mut self) -> &mut Object {
        self
    }
}

/// A pending call to the next more-base implementation
///
/// Captures who asked when it is created; [`SuperCall::call`] forwards later.
#[derive(Debug, Clone, Copy)]
pub struct SuperCall<'a> {
    object: &'a Object,
    caller: ClassId,
    method: &'a str,
}

impl SuperCall<'_> {
    pub fn method(&self) -> &str {
        self.method
    }

    /// `Ok(None)` when the method is not virtual, the caller is not in its
    /// chain, or the caller is already the most-base entry.
    pub fn call(&self, args: &[Value]) -> Result<Option<Value>> {
        let Some(binding) = &self.object.binding else {
            return Ok(None);
        };
        let Some(chain) = binding.table.get(self.method) else {
            trace!(method = self.method, "super: not virtual");
            return Ok(None);
        };
        let Some(next) = chain.position(self.caller).and_then(|i| chain.get(i + 1)) else {
            trace!(method = self.method, caller = %self.caller, "super: no more-base entry");
            return Ok(None);
        };
        trace!(method = self.method, caller = %self.caller, target = %next.owner(), "super");
        binding.dispatch(next, args, true).map(Some)
    }
}
