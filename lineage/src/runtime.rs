//! Object runtime: initialization of an instance

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tracing::debug;

use crate::class::{Class, ClassDef, FieldDef};
use crate::contract::Contract;
use crate::error::{ClassError, Result};
use crate::locate::{lineage, Link};
use crate::object::Binding;
use crate::table::{MethodDescriptor, MethodTable};

/// Initialize `value` and publish it.
///
/// `parent` is the link to the nearest ancestor, `None` for a type with no
/// ancestor. Empty nullable links along the ancestor line are allocated, the
/// method table is built, and the value is moved into an `Arc` whose
/// embedded [`Object`](crate::Object) points back at it. The table does not
/// change after this returns.
pub fn initialize<T: Class>(mut value: T, parent: Option<&FieldDef>, contracts: &[Contract]) -> Result<Arc<T>> {
    let class = T::class_def();
    if value.object().is_initialized() {
        return Err(ClassError::already_initialized(class.name()));
    }

    let links = match parent {
        Some(first) => {
            let links = lineage(class, first)?;
            allocate(&mut value, first, &links);
            links
        }
        None => Vec::new(),
    };
    let table = MethodTable::build(class, &links, contracts)?;
    let direct = direct_methods(class, &table);
    debug!(class = class.name(), methods = table.len(), direct = direct.len(), "initialized");

    Ok(Arc::new_cyclic(|weak: &Weak<T>| {
        let anchor: Weak<dyn Any + Send + Sync> = weak.clone();
        value.object_mut().bind(Binding {
            anchor,
            class,
            table,
            direct,
        });
        value
    }))
}

/// Exported methods of `class` that dispatch statically
fn direct_methods(class: &'static ClassDef, table: &MethodTable) -> HashMap<&'static str, MethodDescriptor> {
    class
        .method_set()
        .into_values()
        .filter(|resolved| resolved.method.is_exported() && !table.contains(resolved.method.name()))
        .filter_map(|resolved| MethodDescriptor::resolve(&[], &resolved))
        .map(|entry| (entry.name(), entry))
        .collect()
}

/// Allocate empty nullable links from the outermost value down
fn allocate(root: &mut dyn Any, first: &FieldDef, links: &[Link<'_>]) {
    let Some(mut current) = first.ensure(root) else {
        return;
    };
    for link in links.iter().skip(1) {
        match link.field.ensure(current) {
            Some(next) => current = next,
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ClassDef, ClassId, PARENT_TAG};
    use crate::object::Object;
    use crate::value::{Kind, Signature, Value};
    use std::sync::OnceLock;

    #[derive(Default)]
    struct Shape {
        object: Object,
    }

    impl Class for Shape {
        fn class_def() -> &'static ClassDef {
            static DEF: OnceLock<ClassDef> = OnceLock::new();
            DEF.get_or_init(|| {
                ClassDef::builder::<Shape>()
                    .embed::<Object>("Object", |s| &s.object, |s| &mut s.object)
                    .method("Area", Signature::returning(Kind::Int), |_, _| Ok(Value::Int(0)))
                    .build()
            })
        }
        fn object(&self) -> &Object {
            &self.object
        }
        fn object_mut(&mut self) -> &mut Object {
            &mut self.object
        }
    }

    #[derive(Default)]
    struct Square {
        side: i64,
        shape: Option<Box<Shape>>,
    }

    impl Class for Square {
        fn class_def() -> &'static ClassDef {
            static DEF: OnceLock<ClassDef> = OnceLock::new();
            DEF.get_or_init(|| {
                ClassDef::builder::<Square>()
                    .data("side")
                    .field_boxed::<Shape>("shape", |s| &s.shape, |s| &mut s.shape)
                    .tag(PARENT_TAG)
                    .method("Area", Signature::returning(Kind::Int), |s: &Square, _| {
                        Ok(Value::Int(s.side * s.side))
                    })
                    .build()
            })
        }
        fn object(&self) -> &Object {
            self.shape.as_deref().map_or(Object::unbound(), Class::object)
        }
        fn object_mut(&mut self) -> &mut Object {
            self.shape.get_or_insert_with(Box::default).object_mut()
        }
    }

    #[test]
    fn test_initialize_allocates_nullable_parent() {
        let parent = Square::class_def().field("shape").unwrap();
        let square = initialize(Square { side: 3, shape: None }, Some(parent), &[]).unwrap();
        assert!(square.shape.is_some());
        assert!(square.object().is_initialized());
        assert_eq!(square.object().class(), Some(ClassId::of::<Square>()));
        assert_eq!(square.call("Area", &[]).unwrap(), Value::Int(9));
    }

    #[test]
    fn test_initialize_root_type() {
        let shape = initialize(Shape::default(), None, &[]).unwrap();
        let table = shape.object().table().unwrap();
        assert_eq!(table.names(), vec!["Area"]);
        assert_eq!(table.get("Area").unwrap().len(), 1);
    }

    #[test]
    fn test_initialize_twice_fails() {
        let shape = initialize(Shape::default(), None, &[]).unwrap();
        let shape = Arc::try_unwrap(shape).ok().unwrap();
        let err = initialize(shape, None, &[]).err().unwrap();
        assert_eq!(err, ClassError::already_initialized("Shape"));
    }

    #[test]
    fn test_uninitialized_object() {
        let square = Square::default();
        assert!(!square.object().is_initialized());
        assert_eq!(square.call("Area", &[]).unwrap_err(), ClassError::NotInitialized);
    }
}
