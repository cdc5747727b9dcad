//! Factory operations
//!
//! Three ways to construct an instance, differing in how the parent link is
//! chosen:
//! - [`new`]: discovered (parent tag, then embedding),
//! - [`extends`]: named explicitly,
//! - [`create`]: for a value the caller already built, named or discovered
//!   through [`Options`].
//!
//! The `try_` forms return structural errors; the plain forms panic with
//! them, for wiring code where a malformed type is a programming mistake.

use std::sync::Arc;

use crate::class::{Class, ClassDef, FieldDef};
use crate::contract::Contract;
use crate::error::{ClassError, Result};
use crate::locate::{find_by_name, require_parent};
use crate::runtime::initialize;

/// Construction options for [`create`]
#[derive(Debug, Clone, Default)]
pub struct Options {
    parent_field: Option<String>,
    contracts: Vec<Contract>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the named field as parent link instead of discovering it
    pub fn parent_field(mut self, name: impl Into<String>) -> Self {
        self.parent_field = Some(name.into());
        self
    }

    /// Narrow the virtual surface to the methods of `contract`
    pub fn contract(mut self, contract: Contract) -> Self {
        self.contracts.push(contract);
        self
    }

    pub fn contracts(mut self, contracts: impl IntoIterator<Item = Contract>) -> Self {
        self.contracts.extend(contracts);
        self
    }

    pub fn parent_field_name(&self) -> Option<&str> {
        self.parent_field.as_deref()
    }

    pub fn contract_list(&self) -> &[Contract] {
        &self.contracts
    }
}

/// Parent link of `class`, checked to hold a type built on `Object`
fn parent_link(class: &'static ClassDef, name: Option<&str>) -> Result<&'static FieldDef> {
    let field = match name {
        Some(name) => find_by_name(class, name)?,
        None => require_parent(class)?,
    };
    match field.target() {
        Some(target) if target.contains_root() => Ok(field),
        _ => Err(ClassError::not_a_class(class.name(), field.name())),
    }
}

#[tracing::instrument(level = "debug", skip_all, fields(class = std::any::type_name::<T>()))]
pub fn try_new<T: Class + Default>(contracts: &[Contract]) -> Result<Arc<T>> {
    let parent = parent_link(T::class_def(), None)?;
    initialize(T::default(), Some(parent), contracts)
}

#[tracing::instrument(level = "debug", skip(contracts), fields(class = std::any::type_name::<T>()))]
pub fn try_extends<T: Class + Default>(parent_field: &str, contracts: &[Contract]) -> Result<Arc<T>> {
    let parent = parent_link(T::class_def(), Some(parent_field))?;
    initialize(T::default(), Some(parent), contracts)
}

#[tracing::instrument(level = "debug", skip_all, fields(class = std::any::type_name::<T>()))]
pub fn try_create<T: Class>(value: T, options: &Options) -> Result<Arc<T>> {
    let parent = parent_link(T::class_def(), options.parent_field_name())?;
    initialize(value, Some(parent), &options.contracts)
}

/// [`try_new`], panicking on structural errors
pub fn new<T: Class + Default>(contracts: &[Contract]) -> Arc<T> {
    try_new(contracts).unwrap_or_else(|e| panic!("{e}"))
}

/// [`try_extends`], panicking on structural errors
pub fn extends<T: Class + Default>(parent_field: &str, contracts: &[Contract]) -> Arc<T> {
    try_extends(parent_field, contracts).unwrap_or_else(|e| panic!("{e}"))
}

/// [`try_create`], panicking on structural errors
pub fn create<T: Class>(value: T, options: &Options) -> Arc<T> {
    try_create(value, options).unwrap_or_else(|e| panic!("{e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::PARENT_TAG;
    use crate::object::Object;
    use crate::value::{Kind, Signature, Value};
    use std::sync::OnceLock;

    #[derive(Default)]
    struct Engine {
        object: Object,
    }

    impl Class for Engine {
        fn class_def() -> &'static ClassDef {
            static DEF: OnceLock<ClassDef> = OnceLock::new();
            DEF.get_or_init(|| {
                ClassDef::builder::<Engine>()
                    .embed::<Object>("Object", |e| &e.object, |e| &mut e.object)
                    .method("Power", Signature::returning(Kind::Int), |_, _| Ok(Value::Int(100)))
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
    struct Turbo {
        engine: Engine,
        spare: Engine,
        note: String,
    }

    impl Class for Turbo {
        fn class_def() -> &'static ClassDef {
            static DEF: OnceLock<ClassDef> = OnceLock::new();
            DEF.get_or_init(|| {
                ClassDef::builder::<Turbo>()
                    .embed::<Engine>("Engine", |t| &t.engine, |t| &mut t.engine)
                    .field::<Engine>("spare", |t| &t.spare, |t| &mut t.spare)
                    .data("note")
                    .method("Power", Signature::returning(Kind::Int), |t: &Turbo, call| {
                        let base = t.object().super_call(call.frame()).call(&[])?;
                        let boost = t.note.len() as i64;
                        Ok(Value::Int(base.and_then(|v| v.as_int()).unwrap_or(0) * 2 + boost))
                    })
                    .build()
            })
        }
        fn object(&self) -> &Object {
            self.engine.object()
        }
        fn object_mut(&mut self) -> &mut Object {
            self.engine.object_mut()
        }
    }

    #[derive(Default)]
    struct Bolted {
        object: Object,
        engine: Engine,
    }

    impl Class for Bolted {
        fn class_def() -> &'static ClassDef {
            static DEF: OnceLock<ClassDef> = OnceLock::new();
            DEF.get_or_init(|| {
                ClassDef::builder::<Bolted>()
                    .data("serial")
                    .tag(PARENT_TAG)
                    .field::<Engine>("engine", |b| &b.engine, |b| &mut b.engine)
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

    #[test]
    fn test_new_discovers_parent() {
        let turbo = new::<Turbo>(&[]);
        assert_eq!(turbo.call("Power", &[]).unwrap(), Value::Int(200));
    }

    #[test]
    fn test_create_keeps_caller_value() {
        let value = Turbo {
            note: "abc".to_string(),
            ..Turbo::default()
        };
        let turbo = create(value, &Options::new());
        assert_eq!(turbo.call("Power", &[]).unwrap(), Value::Int(203));
    }

    #[test]
    fn test_extends_named_field() {
        let turbo = extends::<Turbo>("Engine", &[]);
        assert!(turbo.object().is_initialized());

        let err = try_extends::<Turbo>("missing", &[]).err().unwrap();
        assert_eq!(err, ClassError::unknown_field("Turbo", "missing"));
    }

    #[test]
    fn test_create_with_named_parent() {
        // spare is a plain Engine: no ancestor beyond it shares the table
        let options = Options::new().parent_field("spare");
        assert_eq!(options.parent_field_name(), Some("spare"));
        let turbo = try_create(Turbo::default(), &options).unwrap();
        let chain = turbo.object().table().unwrap().get("Power").unwrap();
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_tagged_data_field_is_not_a_class() {
        let err = try_new::<Bolted>(&[]).err().unwrap();
        assert_eq!(err, ClassError::not_a_class("Bolted", "serial"));
        assert!(err.is_structural());
    }

    #[test]
    #[should_panic(expected = "has no field")]
    fn test_extends_panics_on_unknown_field() {
        extends::<Turbo>("nope", &[]);
    }

    #[test]
    fn test_contract_options() {
        let power = Contract::new("Powered").method("Power", Signature::returning(Kind::Int));
        let options = Options::new().contract(power.clone());
        assert_eq!(options.contract_list(), &[power]);
        let turbo = create(Turbo::default(), &options);
        assert_eq!(turbo.object().table().unwrap().names(), vec!["Power"]);
    }
}
