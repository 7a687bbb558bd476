use alloc::string::String;

/// Misuse of the registration protocol.
///
/// Every variant is raised synchronously at the call that violates the contract and is never retried.
/// A missing key on resolution isn't an error, see [`crate::Registry::get`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryErrorKind {
    #[error("Key should be a type or a non-empty label")]
    InvalidKey,
    #[error("Key `{key}` is already registered")]
    DuplicateKey { key: String },
    #[error("Key `{key}` is not registered")]
    NotRegistered { key: String },
    #[error("Registration in superclasses requires a class, got a {datum} datum")]
    InvalidOperation { datum: &'static str },
}
