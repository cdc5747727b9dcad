//! Field descriptors
//!
//! A [`FieldDef`] describes one field of a composite type: whether it is
//! embedded, exported, tagged, and how to reach the value it holds. Only
//! fields holding a [`Class`] carry accessors; plain data fields are listed so
//! that parent discovery sees the same layout the type actually has.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::{Class, ClassDef, ClassId};

/// Shared accessor from a container value to one of its fields
pub(crate) type Getter = Arc<dyn Fn(&dyn Any) -> Option<&dyn Any> + Send + Sync>;

/// Mutable accessor that allocates an empty nullable link on the way
pub(crate) type Ensurer = Arc<dyn Fn(&mut dyn Any) -> Option<&mut dyn Any> + Send + Sync>;

fn getter<F>(f: F) -> Getter
where
    F: Fn(&dyn Any) -> Option<&dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn ensurer<F>(f: F) -> Ensurer
where
    F: Fn(&mut dyn Any) -> Option<&mut dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// How a field stores its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// `P` held by value
    Inline,
    /// `Option<Box<P>>`, allocated with `P::default()` when a factory needs it
    Nullable,
    /// Not a class; never a parent link
    Data,
}

/// Descriptor of one field of a composite type
pub struct FieldDef {
    name: &'static str,
    embedded: bool,
    exported: bool,
    tag: Option<&'static str>,
    storage: Storage,
    target: Option<fn() -> &'static ClassDef>,
    get: Option<Getter>,
    ensure: Option<Ensurer>,
}

impl FieldDef {
    pub(crate) fn inline<T: Class, P: Class>(
        name: &'static str,
        embedded: bool,
        get: fn(&T) -> &P,
        get_mut: fn(&mut T) -> &mut P,
    ) -> Self {
        FieldDef {
            name,
            embedded,
            exported: true,
            tag: None,
            storage: Storage::Inline,
            target: Some(P::class_def as fn() -> &'static ClassDef),
            get: Some(getter(move |any| {
                any.downcast_ref::<T>().map(|t| get(t) as &dyn Any)
            })),
            ensure: Some(ensurer(move |any| {
                any.downcast_mut::<T>().map(|t| get_mut(t) as &mut dyn Any)
            })),
        }
    }

    pub(crate) fn nullable<T: Class, P: Class + Default>(
        name: &'static str,
        embedded: bool,
        get: fn(&T) -> &Option<Box<P>>,
        get_mut: fn(&mut T) -> &mut Option<Box<P>>,
    ) -> Self {
        FieldDef {
            name,
            embedded,
            exported: true,
            tag: None,
            storage: Storage::Nullable,
            target: Some(P::class_def as fn() -> &'static ClassDef),
            get: Some(getter(move |any| {
                any.downcast_ref::<T>()
                    .and_then(|t| get(t).as_deref())
                    .map(|p| p as &dyn Any)
            })),
            ensure: Some(ensurer(move |any| {
                let slot = get_mut(any.downcast_mut::<T>()?);
                let boxed: &mut Box<P> = slot.get_or_insert_with(Box::default);
                Some(&mut **boxed as &mut dyn Any)
            })),
        }
    }

    pub(crate) fn data(name: &'static str, embedded: bool) -> Self {
        FieldDef {
            name,
            embedded,
            exported: true,
            tag: None,
            storage: Storage::Data,
            target: None,
            get: None,
            ensure: None,
        }
    }

    pub(crate) fn set_tag(&mut self, tag: &'static str) {
        self.tag = Some(tag);
    }

    pub(crate) fn set_private(&mut self) {
        self.exported = false;
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Embedded without a name (promotes the held type's methods)
    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    /// Exported fields are settable by the factories
    pub fn is_exported(&self) -> bool {
        self.exported
    }

    pub fn tag(&self) -> Option<&'static str> {
        self.tag
    }

    /// Tagged as the designated parent link
    pub fn is_parent_tagged(&self) -> bool {
        self.tag.is_some_and(|t| t.trim() == super::PARENT_TAG)
    }

    pub fn storage(&self) -> Storage {
        self.storage
    }

    /// Descriptor of the class this field holds, if it holds one
    pub fn target(&self) -> Option<&'static ClassDef> {
        self.target.map(|def| def())
    }

    /// Whether the field holds exactly the given class
    pub fn holds(&self, id: ClassId) -> bool {
        self.target().is_some_and(|def| def.id() == id)
    }

    pub(crate) fn getter(&self) -> Option<Getter> {
        self.get.clone()
    }

    /// Mutable access, allocating an empty nullable link first
    pub(crate) fn ensure<'v>(&self, container: &'v mut dyn Any) -> Option<&'v mut dyn Any> {
        self.ensure.as_ref().and_then(|ensure| ensure(container))
    }
}

impl fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("embedded", &self.embedded)
            .field("exported", &self.exported)
            .field("tag", &self.tag)
            .field("storage", &self.storage)
            .field("target", &self.target().map(|def| def.name()))
            .finish()
    }
}
