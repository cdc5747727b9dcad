//! Error types for class wiring and dispatch

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClassError>;

/// Class runtime error
///
/// Wiring errors (see [`ClassError::is_structural`]) are detected while an
/// instance is being constructed and mean the composite type is declared
/// wrong. Everything else is raised by a call on a constructed instance.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassError {
    #[error("type {class} declares more than one parent field ({first}, {second})")]
    AmbiguousParent {
        class: String,
        first: String,
        second: String,
    },

    #[error("type {class} has no parent field (tag one as `parent` or embed a type built on Object)")]
    NoParentField { class: String },

    #[error("type {class} has no field named {field}")]
    UnknownField { class: String, field: String },

    #[error("parent field {class}.{field} is not settable")]
    ParentNotSettable { class: String, field: String },

    #[error("parent field {class}.{field} does not hold a type built on Object")]
    NotAClass { class: String, field: String },

    #[error("{class} does not implement {contract}: {reason}")]
    ContractNotSatisfied {
        class: String,
        contract: String,
        reason: String,
    },

    #[error("malformed contract {contract}: {reason}")]
    MalformedContract { contract: String, reason: String },

    #[error("{class} is already initialized")]
    AlreadyInitialized { class: String },

    #[error("object is not initialized (construct it through a factory)")]
    NotInitialized,

    #[error("receiver is no longer reachable from the instance")]
    Detached,

    #[error("receiver for {method} is not a {class}")]
    ReceiverMismatch { class: String, method: String },

    #[error("{method} expects {expected}, got ({got})")]
    ArgumentMismatch {
        method: String,
        expected: String,
        got: String,
    },

    #[error("{method} must return {expected}, returned {got}")]
    ResultMismatch {
        method: String,
        expected: String,
        got: String,
    },

    #[error("{class} has no method {method}")]
    UnknownMethod { class: String, method: String },

    /// Failure reported by a method body
    #[error("{method}: {message}")]
    Method { method: String, message: String },
}

impl ClassError {
    pub fn ambiguous_parent(
        class: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        Self::AmbiguousParent {
            class: class.into(),
            first: first.into(),
            second: second.into(),
        }
    }

    pub fn no_parent_field(class: impl Into<String>) -> Self {
        Self::NoParentField {
            class: class.into(),
        }
    }

    pub fn unknown_field(class: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            class: class.into(),
            field: field.into(),
        }
    }

    pub fn parent_not_settable(class: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ParentNotSettable {
            class: class.into(),
            field: field.into(),
        }
    }

    pub fn not_a_class(class: impl Into<String>, field: impl Into<String>) -> Self {
        Self::NotAClass {
            class: class.into(),
            field: field.into(),
        }
    }

    pub fn contract_not_satisfied(
        class: impl Into<String>,
        contract: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ContractNotSatisfied {
            class: class.into(),
            contract: contract.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed_contract(contract: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedContract {
            contract: contract.into(),
            reason: reason.into(),
        }
    }

    pub fn already_initialized(class: impl Into<String>) -> Self {
        Self::AlreadyInitialized {
            class: class.into(),
        }
    }

    pub fn receiver_mismatch(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self::ReceiverMismatch {
            class: class.into(),
            method: method.into(),
        }
    }

    pub fn argument_mismatch(
        method: impl Into<String>,
        expected: impl Into<String>,
        got: impl Into<String>,
    ) -> Self {
        Self::ArgumentMismatch {
            method: method.into(),
            expected: expected.into(),
            got: got.into(),
        }
    }

    pub fn result_mismatch(
        method: impl Into<String>,
        expected: impl Into<String>,
        got: impl Into<String>,
    ) -> Self {
        Self::ResultMismatch {
            method: method.into(),
            expected: expected.into(),
            got: got.into(),
        }
    }

    pub fn unknown_method(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self::UnknownMethod {
            class: class.into(),
            method: method.into(),
        }
    }

    /// Error raised from inside a method body
    pub fn method(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Method {
            method: method.into(),
            message: message.into(),
        }
    }

    /// True for errors in how a type is composed, as opposed to call errors.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::AmbiguousParent { .. }
                | Self::NoParentField { .. }
                | Self::UnknownField { .. }
                | Self::ParentNotSettable { .. }
                | Self::NotAClass { .. }
                | Self::ContractNotSatisfied { .. }
                | Self::MalformedContract { .. }
                | Self::AlreadyInitialized { .. }
        )
    }
}
