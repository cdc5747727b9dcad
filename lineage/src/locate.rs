//! Parent discovery
//!
//! Finds the field of a composite type that links it to its ancestor:
//! 1. a direct field tagged [`PARENT_TAG`](crate::class::PARENT_TAG); two
//!    tagged fields are an error,
//! 2. otherwise the outermost embedded field whose type is [`Object`] or
//!    structurally contains it, searched depth-first.
//!
//! Discovery reads type descriptors only, so an empty nullable link is still
//! found (and later allocated by the factory).

use tracing::trace;

use crate::class::{ClassDef, ClassId, FieldDef};
use crate::error::{ClassError, Result};
use crate::object::Object;

/// One step of an ancestor walk: the link field and the class it holds
#[derive(Debug, Clone, Copy)]
pub struct Link<'a> {
    pub field: &'a FieldDef,
    pub class: &'static ClassDef,
}

/// The direct field tagged as parent, if exactly one is
pub fn find_by_tag(class: &ClassDef) -> Result<Option<&FieldDef>> {
    let mut found: Option<&FieldDef> = None;
    for field in class.fields().iter().filter(|f| f.is_parent_tagged()) {
        if let Some(first) = found {
            return Err(ClassError::ambiguous_parent(
                class.name(),
                first.name(),
                field.name(),
            ));
        }
        found = Some(field);
    }
    Ok(found)
}

/// The outermost embedded field leading to `Object`
pub fn find_embedded(class: &ClassDef) -> Option<&FieldDef> {
    let root = ClassId::of::<Object>();
    let mut visited = vec![class.id()];
    class
        .fields()
        .iter()
        .filter(|f| f.is_embedded())
        .find(|field| {
            field
                .target()
                .is_some_and(|def| def.id() == root || reaches_root(def, root, &mut visited))
        })
}

fn reaches_root(def: &ClassDef, root: ClassId, visited: &mut Vec<ClassId>) -> bool {
    if visited.contains(&def.id()) {
        return false;
    }
    visited.push(def.id());
    def.fields()
        .iter()
        .filter(|f| f.is_embedded())
        .filter_map(|f| f.target())
        .any(|target| target.id() == root || reaches_root(target, root, visited))
}

/// Whether `class` is `Object` or embeds it
pub(crate) fn contains_root(class: &ClassDef) -> bool {
    let root = ClassId::of::<Object>();
    class.id() == root || reaches_root(class, root, &mut Vec::new())
}

/// Tag first, then embedding
pub fn locate(class: &ClassDef) -> Result<Option<&FieldDef>> {
    match find_by_tag(class)? {
        Some(field) => Ok(Some(field)),
        None => Ok(find_embedded(class)),
    }
}

/// The parent link a factory needs: found and settable
pub fn require_parent(class: &ClassDef) -> Result<&FieldDef> {
    let field = locate(class)?.ok_or_else(|| ClassError::no_parent_field(class.name()))?;
    if !field.is_exported() {
        return Err(ClassError::parent_not_settable(class.name(), field.name()));
    }
    Ok(field)
}

/// An explicitly named parent link
pub fn find_by_name<'a>(class: &'a ClassDef, name: &str) -> Result<&'a FieldDef> {
    let field = class
        .field(name)
        .ok_or_else(|| ClassError::unknown_field(class.name(), name))?;
    if !field.is_exported() {
        return Err(ClassError::parent_not_settable(class.name(), field.name()));
    }
    Ok(field)
}

/// Ancestor links of `owner`, starting at `first`.
///
/// Each ancestor's own link is found with [`locate`]. The walk stops when
/// nothing is found, the link is not settable, it does not hold a class, or
/// a type repeats. An ambiguous parent tag on any ancestor is an error.
pub fn lineage<'a>(owner: &ClassDef, first: &'a FieldDef) -> Result<Vec<Link<'a>>> {
    let mut visited = vec![owner.id()];
    let mut links = Vec::new();
    let mut next = Some(first);

    while let Some(field) = next {
        let Some(class) = field.target() else {
            break;
        };
        if visited.contains(&class.id()) {
            trace!(class = class.name(), "ancestor type repeats, stopping walk");
            break;
        }
        visited.push(class.id());
        links.push(Link { field, class });
        next = match locate(class)? {
            Some(link) if link.is_exported() => Some(link),
            _ => None,
        };
    }

    Ok(links)
}
