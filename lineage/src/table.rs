//! Method tables
//!
//! A [`MethodTable`] maps each virtual method name of an instance to a
//! [`MethodChain`]: the implementations of that name along the ancestor
//! line, most-derived first. Tables are built once by the object runtime
//! and never change afterward.

use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::class::{Call, ClassDef, ClassId, Frame, Getter, MethodFn, Resolved};
use crate::contract::{eligible_names, is_eligible_by_default, Contract};
use crate::error::{ClassError, Result};
use crate::locate::Link;
use crate::value::{Signature, Value};

/// Field accessors from the outermost value down to a method's receiver
#[derive(Clone)]
struct Projection(Vec<Getter>);

impl Projection {
    fn resolve<'v>(&self, root: &'v dyn Any) -> Option<&'v dyn Any> {
        self.0.iter().try_fold(root, |value, get| get(value))
    }
}

/// One implementation of a method, bound to its level of the hierarchy
#[derive(Clone)]
pub struct MethodDescriptor {
    owner: ClassId,
    name: &'static str,
    signature: Signature,
    body: MethodFn,
    receiver: Projection,
}

impl MethodDescriptor {
    /// Descriptor for a method resolved on a class reached through `prefix`
    pub(crate) fn resolve(prefix: &[Getter], resolved: &Resolved<'_>) -> Option<Self> {
        let mut path = prefix.to_vec();
        for field in &resolved.path {
            path.push(field.getter()?);
        }
        let method = resolved.method;
        Some(MethodDescriptor {
            owner: method.owner(),
            name: method.name(),
            signature: method.signature().clone(),
            body: method.body(),
            receiver: Projection(path),
        })
    }

    /// Declaring class
    pub fn owner(&self) -> ClassId {
        self.owner
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Run the body against the receiver reached from `root`
    pub(crate) fn call(&self, root: &dyn Any, args: &[Value], forwarded: bool) -> Result<Value> {
        self.signature.check_args(self.name, args)?;
        let receiver = self.receiver.resolve(root).ok_or(ClassError::Detached)?;
        let mut frame = Frame::new(self.owner, self.name);
        if forwarded {
            frame = frame.forwarded();
        }
        let result = (self.body)(receiver, &Call::new(frame, args))?;
        self.signature.check_result(self.name, &result)?;
        Ok(result)
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("depth", &self.receiver.0.len())
            .finish()
    }
}

/// Implementations of one method name, most-derived first
#[derive(Debug, Clone)]
pub struct MethodChain {
    entries: Vec<MethodDescriptor>,
}

impl MethodChain {
    fn new(head: MethodDescriptor) -> Self {
        MethodChain { entries: vec![head] }
    }

    /// Entry 0: the most-derived implementation
    pub fn head(&self) -> &MethodDescriptor {
        &self.entries[0]
    }

    pub fn get(&self, index: usize) -> Option<&MethodDescriptor> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the entry declared by `class`
    pub fn position(&self, class: ClassId) -> Option<usize> {
        self.entries.iter().position(|d| d.owner == class)
    }

    pub fn owners(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.entries.iter().map(|d| d.owner)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MethodDescriptor> {
        self.entries.iter()
    }
}

/// Virtual method table of one instance
#[derive(Debug, Clone)]
pub struct MethodTable {
    class: ClassId,
    chains: HashMap<&'static str, MethodChain>,
}

impl MethodTable {
    /// Build the table for `class` whose ancestors are `links`.
    ///
    /// Entry 0 of every chain is resolved on `class` itself. Each ancestor
    /// level appends its implementation when the signature matches entry 0
    /// and removes the name for good when it does not.
    pub fn build(class: &ClassDef, links: &[Link<'_>], contracts: &[Contract]) -> Result<Self> {
        let eligible = eligible_names(class, contracts)?;
        let mut chains = HashMap::new();

        for (name, resolved) in &class.method_set() {
            let wanted = match &eligible {
                Some(names) => names.contains(name),
                None => is_eligible_by_default(name, resolved.method.is_exported()),
            };
            if !wanted {
                continue;
            }
            if let Some(head) = MethodDescriptor::resolve(&[], resolved) {
                chains.insert(*name, MethodChain::new(head));
            }
        }

        let mut prefix: Vec<Getter> = Vec::new();
        for link in links {
            let Some(get) = link.field.getter() else {
                break;
            };
            prefix.push(get);
            let set = link.class.method_set();

            chains.retain(|name, chain| {
                let Some(resolved) = set.get(name).filter(|r| r.method.is_exported()) else {
                    return true;
                };
                if resolved.method.signature() != chain.head().signature() {
                    debug!(
                        class = class.name(),
                        ancestor = link.class.name(),
                        method = *name,
                        expected = %chain.head().signature(),
                        found = %resolved.method.signature(),
                        "signature differs, method is no longer virtual"
                    );
                    return false;
                }
                if chain.position(resolved.method.owner()).is_none()
                    && let Some(entry) = MethodDescriptor::resolve(&prefix, resolved)
                {
                    chain.entries.push(entry);
                }
                true
            });
        }

        let table = MethodTable {
            class: class.id(),
            chains,
        };
        debug!(
            class = class.name(),
            methods = table.len(),
            ancestors = links.len(),
            "built method table"
        );
        Ok(table)
    }

    /// Class the table was built for
    pub fn class(&self) -> ClassId {
        self.class
    }

    pub fn get(&self, name: &str) -> Option<&MethodChain> {
        self.chains.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.chains.contains_key(name)
    }

    /// Virtual method names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.chains.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Serializable snapshot of the table
    pub fn report(&self) -> TableReport {
        let methods = self
            .names()
            .into_iter()
            .filter_map(|name| {
                let chain = self.chains.get(name)?;
                Some(MethodReport {
                    name,
                    signature: chain.head().signature().clone(),
                    chain: chain.owners().map(|c| c.name()).collect(),
                })
            })
            .collect();
        TableReport {
            class: self.class.name(),
            methods,
        }
    }
}

impl fmt::Display for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in self.names().into_iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{name}:")?;
            if let Some(chain) = self.chains.get(name) {
                for (j, owner) in chain.owners().enumerate() {
                    let sep = if j == 0 { " " } else { " -> " };
                    write!(f, "{sep}{owner}")?;
                }
            }
        }
        Ok(())
    }
}

/// Method table report
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub class: &'static str,
    pub methods: Vec<MethodReport>,
}

/// One virtual method in a [`TableReport`]
#[derive(Debug, Clone, Serialize)]
pub struct MethodReport {
    pub name: &'static str,
    pub signature: Signature,
    /// Declaring classes, most-derived first
    pub chain: Vec<&'static str>,
}

impl TableReport {
    /// Serialize to JSON
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::Class;
    use crate::locate::{lineage, require_parent};
    use crate::object::Object;
    use crate::value::Kind;
    use std::sync::OnceLock;

    fn text() -> Signature {
        Signature::returning(Kind::Str)
    }

    #[derive(Default)]
    struct Animal {
        object: Object,
    }

    impl Class for Animal {
        fn class_def() -> &'static ClassDef {
            static DEF: OnceLock<ClassDef> = OnceLock::new();
            DEF.get_or_init(|| {
                ClassDef::builder::<Animal>()
                    .embed::<Object>("Object", |a| &a.object, |a| &mut a.object)
                    .method("Speak", text(), |_, _| Ok("...".into()))
                    .method("Legs", Signature::returning(Kind::Int), |_, _| Ok(Value::Int(4)))
                    .method("Feed", Signature::new([Kind::Int], Kind::Unit), |_, _| Ok(Value::Unit))
                    .private_method("digest", Signature::returning(Kind::Unit), |_, _| Ok(Value::Unit))
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
    struct Dog {
        animal: Animal,
    }

    impl Class for Dog {
        fn class_def() -> &'static ClassDef {
            static DEF: OnceLock<ClassDef> = OnceLock::new();
            DEF.get_or_init(|| {
                ClassDef::builder::<Dog>()
                    .embed::<Animal>("Animal", |d| &d.animal, |d| &mut d.animal)
                    .method("Speak", text(), |_, _| Ok("woof".into()))
                    // takes a string where Animal takes an int
                    .method("Feed", Signature::new([Kind::Str], Kind::Unit), |_, _| Ok(Value::Unit))
                    .build()
            })
        }
        fn object(&self) -> &Object {
            self.animal.object()
        }
        fn object_mut(&mut self) -> &mut Object {
            self.animal.object_mut()
        }
    }

    #[derive(Default)]
    struct Puppy {
        dog: Dog,
    }

    impl Class for Puppy {
        fn class_def() -> &'static ClassDef {
            static DEF: OnceLock<ClassDef> = OnceLock::new();
            DEF.get_or_init(|| {
                ClassDef::builder::<Puppy>()
                    .embed::<Dog>("Dog", |p| &p.dog, |p| &mut p.dog)
                    .method("Speak", text(), |_, _| Ok("yip".into()))
                    .build()
            })
        }
        fn object(&self) -> &Object {
            self.dog.object()
        }
        fn object_mut(&mut self) -> &mut Object {
            self.dog.object_mut()
        }
    }

    fn table_for(def: &'static ClassDef, contracts: &[Contract]) -> MethodTable {
        let first = require_parent(def).unwrap();
        let links = lineage(def, first).unwrap();
        MethodTable::build(def, &links, contracts).unwrap()
    }

    #[test]
    fn test_chains_most_derived_first() {
        let table = table_for(Puppy::class_def(), &[]);
        let speak = table.get("Speak").unwrap();
        let owners: Vec<&str> = speak.owners().map(|c| c.name()).collect();
        assert_eq!(owners, vec!["Puppy", "Dog", "Animal"]);
        assert_eq!(speak.head().owner(), ClassId::of::<Puppy>());
        assert_eq!(speak.position(ClassId::of::<Animal>()), Some(2));
    }

    #[test]
    fn test_promoted_head_not_repeated() {
        // Legs is promoted to Puppy from Animal; the ancestors add nothing new
        let table = table_for(Puppy::class_def(), &[]);
        let legs = table.get("Legs").unwrap();
        assert_eq!(legs.len(), 1);
        assert_eq!(legs.head().owner(), ClassId::of::<Animal>());
    }

    #[test]
    fn test_signature_mismatch_devirtualizes() {
        // Dog.Feed(str) is promoted to Puppy, Animal.Feed(int) differs
        let table = table_for(Puppy::class_def(), &[]);
        assert!(!table.contains("Feed"));
        assert!(table.contains("Speak"));
    }

    #[test]
    fn test_private_methods_not_virtual() {
        let table = table_for(Animal::class_def(), &[]);
        assert!(!table.contains("digest"));
        assert_eq!(table.names(), vec!["Feed", "Legs", "Speak"]);
    }

    #[test]
    fn test_contract_limits_names() {
        let speaker = Contract::new("Speaker").method("Speak", text());
        let table = table_for(Puppy::class_def(), &[speaker]);
        assert_eq!(table.names(), vec!["Speak"]);
        assert_eq!(table.get("Speak").unwrap().len(), 3);
    }

    #[test]
    fn test_root_only_table() {
        let table = MethodTable::build(Animal::class_def(), &[], &[]).unwrap();
        assert_eq!(table.len(), 3);
        assert!(table.get("Speak").unwrap().get(1).is_none());
    }

    #[test]
    fn test_display() {
        let table = table_for(Dog::class_def(), &[]);
        assert_eq!(table.to_string(), "Legs: Animal\nSpeak: Dog -> Animal");
    }

    #[test]
    fn test_report_json() {
        let report = table_for(Dog::class_def(), &[]).report();
        assert_eq!(report.class, "Dog");
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["methods"][1]["name"], "Speak");
        assert_eq!(json["methods"][1]["chain"][1], "Animal");
        assert_eq!(json["methods"][1]["signature"]["ret"], "str");
    }
}
