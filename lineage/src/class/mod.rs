//! Class descriptors
//!
//! Every type taking part in a hierarchy implements [`Class`] and describes
//! itself with a [`ClassDef`]: its name, the methods it declares, and the
//! fields it is composed of. Method tables are built from these descriptors
//! instead of from runtime reflection.
//!
//! ```ignore
//! impl Class for Mid {
//!     fn class_def() -> &'static ClassDef {
//!         static DEF: OnceLock<ClassDef> = OnceLock::new();
//!         DEF.get_or_init(|| {
//!             ClassDef::builder::<Mid>()
//!                 .embed::<Base>("Base", |m| &m.base, |m| &mut m.base)
//!                 .method("Greet", Signature::returning(Kind::Str), Mid::greet)
//!                 .build()
//!         })
//!     }
//!     fn object(&self) -> &Object { self.base.object() }
//!     fn object_mut(&mut self) -> &mut Object { self.base.object_mut() }
//! }
//! ```

mod field;

pub use field::{FieldDef, Storage};
pub(crate) use field::Getter;

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{ClassError, Result};
use crate::object::Object;
use crate::value::{FromValue, Signature, Value};

/// Tag value designating a field as the parent link
pub const PARENT_TAG: &str = "parent";

/// Stable identity of a concrete type
///
/// Equality and hashing use the `TypeId` only; the name is for messages.
#[derive(Clone, Copy)]
pub struct ClassId {
    id: TypeId,
    name: &'static str,
}

impl ClassId {
    pub fn of<T: Any>() -> Self {
        ClassId {
            id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn renamed(self, name: &'static str) -> Self {
        ClassId { name, ..self }
    }
}

/// `my_crate::shapes::Circle` -> `Circle`
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

impl PartialEq for ClassId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClassId {}

impl Hash for ClassId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.name)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A type taking part in a class hierarchy
///
/// `object`/`object_mut` reach the single [`Object`] the type embeds,
/// directly or through its ancestors. Nullable links on that path are
/// allocated by the factories before either is called.
pub trait Class: Any + Send + Sync {
    fn class_def() -> &'static ClassDef
    where
        Self: Sized;

    fn object(&self) -> &Object;

    fn object_mut(&mut self) -> &mut Object;

    /// Virtual call through this instance's method table
    fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        self.object().invoke(method, args)
    }
}

/// Identifies the implementation that is currently executing
///
/// The dispatcher hands a frame to every method body; bodies pass it back
/// to [`Object::inherited`] and [`Object::super_call`] to say who is calling.
/// A frame is *forwarded* when the body was reached through `Inherited` or
/// `Super` rather than called directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    class: ClassId,
    method: &'static str,
    forwarded: bool,
}

impl Frame {
    pub fn new(class: ClassId, method: &'static str) -> Self {
        Frame {
            class,
            method,
            forwarded: false,
        }
    }

    pub(crate) fn forwarded(self) -> Self {
        Frame {
            forwarded: true,
            ..self
        }
    }

    pub fn is_forwarded(&self) -> bool {
        self.forwarded
    }

    /// Declaring class of the executing implementation
    pub fn class(&self) -> ClassId {
        self.class
    }

    pub fn method(&self) -> &'static str {
        self.method
    }
}

/// Arguments and frame of one dispatched call
#[derive(Debug, Clone, Copy)]
pub struct Call<'a> {
    frame: Frame,
    args: &'a [Value],
}

impl<'a> Call<'a> {
    pub fn new(frame: Frame, args: &'a [Value]) -> Self {
        Call { frame, args }
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn args(&self) -> &'a [Value] {
        self.args
    }

    /// Argument `index` converted to `T`
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T> {
        self.args.get(index).and_then(|v| v.get()).ok_or_else(|| {
            ClassError::method(
                self.frame.method,
                format!("argument {index} has an unexpected kind"),
            )
        })
    }
}

/// Type-erased method body: receiver is the declaring type's value
pub type MethodFn = Arc<dyn Fn(&dyn Any, &Call<'_>) -> Result<Value> + Send + Sync>;

fn method_fn<F>(f: F) -> MethodFn
where
    F: Fn(&dyn Any, &Call<'_>) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A method declared by a class
pub struct MethodDef {
    name: &'static str,
    owner: ClassId,
    signature: Signature,
    exported: bool,
    body: MethodFn,
}

impl MethodDef {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declaring class
    pub fn owner(&self) -> ClassId {
        self.owner
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn is_exported(&self) -> bool {
        self.exported
    }

    pub(crate) fn body(&self) -> MethodFn {
        Arc::clone(&self.body)
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("signature", &self.signature)
            .field("exported", &self.exported)
            .finish()
    }
}

/// A method resolved on a class, possibly promoted from an embedded field
#[derive(Debug, Clone)]
pub struct Resolved<'a> {
    pub method: &'a MethodDef,
    /// Embedded fields leading from the class to the declaring type
    pub path: Vec<&'a FieldDef>,
}

/// Method set of a class by name
pub type MethodSet<'a> = BTreeMap<&'static str, Resolved<'a>>;

/// Type descriptor of a class
#[derive(Debug)]
pub struct ClassDef {
    id: ClassId,
    methods: Vec<MethodDef>,
    fields: Vec<FieldDef>,
}

impl ClassDef {
    pub fn builder<T: Class>() -> ClassBuilder<T> {
        ClassBuilder {
            id: ClassId::of::<T>(),
            methods: Vec::new(),
            fields: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> ClassId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    /// Methods declared directly on this class
    pub fn methods(&self) -> &[MethodDef] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Own methods plus methods promoted through embedded fields.
    ///
    /// A promoted name resolves at the shallowest embedding depth where it
    /// occurs; if it occurs more than once at that depth it is ambiguous and
    /// left out, hiding any deeper declaration as well.
    pub fn method_set(&self) -> MethodSet<'_> {
        let mut set: MethodSet<'_> = self
            .methods
            .iter()
            .map(|m| (m.name, Resolved { method: m, path: Vec::new() }))
            .collect();
        let mut blocked: BTreeSet<&'static str> = BTreeSet::new();
        let mut visited = vec![self.id];
        let mut frontier: Vec<(&ClassDef, Vec<&FieldDef>)> = vec![(self, Vec::new())];

        while !frontier.is_empty() {
            let mut next = Vec::new();
            let mut found: BTreeMap<&'static str, Vec<Resolved<'_>>> = BTreeMap::new();

            for (def, path) in &frontier {
                for field in def.fields.iter().filter(|f| f.is_embedded()) {
                    let Some(target) = field.target() else {
                        continue;
                    };
                    if visited.contains(&target.id) {
                        continue;
                    }
                    let mut sub = path.clone();
                    sub.push(field);
                    for m in &target.methods {
                        found.entry(m.name).or_default().push(Resolved {
                            method: m,
                            path: sub.clone(),
                        });
                    }
                    next.push((target, sub));
                }
            }

            visited.extend(next.iter().map(|(def, _)| def.id));
            for (name, mut candidates) in found {
                if set.contains_key(name) || blocked.contains(name) {
                    continue;
                }
                match candidates.pop() {
                    Some(only) if candidates.is_empty() => {
                        set.insert(name, only);
                    }
                    _ => {
                        blocked.insert(name);
                    }
                }
            }
            frontier = next;
        }

        set
    }

    /// Whether this class is `Object` or embeds it, directly or transitively
    pub fn contains_root(&self) -> bool {
        crate::locate::contains_root(self)
    }
}

/// Builder for [`ClassDef`]
///
/// Field modifiers (`tag`, `private`) apply to the most recently added field.
pub struct ClassBuilder<T> {
    id: ClassId,
    methods: Vec<MethodDef>,
    fields: Vec<FieldDef>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Class> ClassBuilder<T> {
    /// Display name used in messages and reports
    pub fn named(mut self, name: &'static str) -> Self {
        self.id = self.id.renamed(name);
        for m in &mut self.methods {
            m.owner = self.id;
        }
        self
    }

    /// Exported method (eligible to be virtual)
    pub fn method<F>(self, name: &'static str, signature: Signature, body: F) -> Self
    where
        F: Fn(&T, &Call<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.push_method(name, signature, true, body)
    }

    /// Unexported method (never virtual)
    pub fn private_method<F>(self, name: &'static str, signature: Signature, body: F) -> Self
    where
        F: Fn(&T, &Call<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.push_method(name, signature, false, body)
    }

    fn push_method<F>(mut self, name: &'static str, signature: Signature, exported: bool, body: F) -> Self
    where
        F: Fn(&T, &Call<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        // the display name may still change through `named`
        let erased = method_fn(move |receiver, call| {
            let this = receiver
                .downcast_ref::<T>()
                .ok_or_else(|| ClassError::receiver_mismatch(T::class_def().name(), name))?;
            body(this, call)
        });
        let owner = self.id;
        self.methods.retain(|m| m.name != name);
        self.methods.push(MethodDef {
            name,
            owner,
            signature,
            exported,
            body: erased,
        });
        self
    }

    /// Anonymous field holding `P` by value
    pub fn embed<P: Class>(self, name: &'static str, get: fn(&T) -> &P, get_mut: fn(&mut T) -> &mut P) -> Self {
        self.push_field(FieldDef::inline(name, true, get, get_mut))
    }

    /// Anonymous nullable field holding `Option<Box<P>>`
    pub fn embed_boxed<P: Class + Default>(
        self,
        name: &'static str,
        get: fn(&T) -> &Option<Box<P>>,
        get_mut: fn(&mut T) -> &mut Option<Box<P>>,
    ) -> Self {
        self.push_field(FieldDef::nullable(name, true, get, get_mut))
    }

    /// Named field holding `P` by value
    pub fn field<P: Class>(self, name: &'static str, get: fn(&T) -> &P, get_mut: fn(&mut T) -> &mut P) -> Self {
        self.push_field(FieldDef::inline(name, false, get, get_mut))
    }

    /// Named nullable field holding `Option<Box<P>>`
    pub fn field_boxed<P: Class + Default>(
        self,
        name: &'static str,
        get: fn(&T) -> &Option<Box<P>>,
        get_mut: fn(&mut T) -> &mut Option<Box<P>>,
    ) -> Self {
        self.push_field(FieldDef::nullable(name, false, get, get_mut))
    }

    /// Named field that does not hold a class
    pub fn data(self, name: &'static str) -> Self {
        self.push_field(FieldDef::data(name, false))
    }

    /// Anonymous field that does not hold a class
    pub fn embed_data(self, name: &'static str) -> Self {
        self.push_field(FieldDef::data(name, true))
    }

    /// Attach a tag value to the last field, e.g. [`PARENT_TAG`]
    pub fn tag(mut self, tag: &'static str) -> Self {
        debug_assert!(!self.fields.is_empty(), "tag({tag}) before any field");
        if let Some(field) = self.fields.last_mut() {
            field.set_tag(tag);
        }
        self
    }

    /// Mark the last field as unexported (not settable)
    pub fn private(mut self) -> Self {
        debug_assert!(!self.fields.is_empty(), "private() before any field");
        if let Some(field) = self.fields.last_mut() {
            field.set_private();
        }
        self
    }

    fn push_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> ClassDef {
        ClassDef {
            id: self.id,
            methods: self.methods,
            fields: self.fields,
        }
    }
}
