#![no_std]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub(crate) mod any;
pub(crate) mod component;
pub(crate) mod config;
pub(crate) mod errors;
pub(crate) mod inject;
pub(crate) mod instantiator;
pub(crate) mod key;
pub(crate) mod registry;
pub(crate) mod store;

#[cfg(feature = "std")]
pub(crate) mod global;

pub use any::{TypeInfo, Value};
pub use component::{Class, Component};
pub use config::Config;
pub use errors::RegistryErrorKind;
pub use inject::{Binding, Fallback, Inject, InjectAll, Injectable};
pub use instantiator::{Datum, Factory};
pub use key::{normalize, Key};
pub use registry::Registry;

#[cfg(feature = "std")]
pub use global::global;
