//! Capability contracts
//!
//! A [`Contract`] names a set of method signatures. Constructing an instance
//! with contracts narrows its virtual surface to the methods those contracts
//! declare, after checking the concrete type implements every one of them.

use std::collections::BTreeSet;

use crate::class::ClassDef;
use crate::error::{ClassError, Result};
use crate::value::Signature;

/// Names of the dispatch primitives; never virtual
pub const DISPATCH_PRIMITIVES: [&str; 2] = ["Inherited", "Super"];

/// A named set of method signatures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    name: &'static str,
    methods: Vec<(&'static str, Signature)>,
}

impl Contract {
    pub fn new(name: &'static str) -> Self {
        Contract {
            name,
            methods: Vec::new(),
        }
    }

    pub fn method(mut self, name: &'static str, signature: Signature) -> Self {
        self.methods.push((name, signature));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn methods(&self) -> &[(&'static str, Signature)] {
        &self.methods
    }

    pub fn method_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.methods.iter().map(|(name, _)| *name)
    }

    /// Reject contracts that cannot describe a capability
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ClassError::malformed_contract("<unnamed>", "contract has no name"));
        }
        for (i, (name, sig)) in self.methods.iter().enumerate() {
            if DISPATCH_PRIMITIVES.contains(name) {
                return Err(ClassError::malformed_contract(
                    self.name,
                    format!("{name} is a dispatch primitive"),
                ));
            }
            let conflict = self.methods[..i]
                .iter()
                .any(|(other, other_sig)| other == name && other_sig != sig);
            if conflict {
                return Err(ClassError::malformed_contract(
                    self.name,
                    format!("{name} is declared with two signatures"),
                ));
            }
        }
        Ok(())
    }

    /// Check that `class` implements every method of this contract
    pub fn check(&self, class: &ClassDef) -> Result<()> {
        let set = class.method_set();
        for (name, sig) in &self.methods {
            let reason = match set.get(name) {
                None => format!("missing method {name}"),
                Some(found) if !found.method.is_exported() => {
                    format!("method {name} is not exported")
                }
                Some(found) if found.method.signature() != sig => format!(
                    "method {name} has signature {}, want {sig}",
                    found.method.signature()
                ),
                Some(_) => continue,
            };
            return Err(ClassError::contract_not_satisfied(
                class.name(),
                self.name,
                reason,
            ));
        }
        Ok(())
    }
}

/// Method names eligible to be virtual for `class`.
///
/// `None` means no contract was given and every exported method other than
/// the dispatch primitives is eligible. Otherwise every contract is validated
/// and checked against `class`, and the union of their method names is
/// returned.
pub fn eligible_names(class: &ClassDef, contracts: &[Contract]) -> Result<Option<BTreeSet<&'static str>>> {
    if contracts.is_empty() {
        return Ok(None);
    }
    let mut names = BTreeSet::new();
    for contract in contracts {
        contract.validate()?;
        contract.check(class)?;
        names.extend(contract.method_names());
    }
    Ok(Some(names))
}

/// Fallback eligibility when no contract narrows the surface
pub(crate) fn is_eligible_by_default(name: &str, exported: bool) -> bool {
    exported && !DISPATCH_PRIMITIVES.contains(&name)
}
