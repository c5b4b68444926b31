#![forbid(unsafe_code)]
//! Pre-parsed Web IDL database schema.
//!
//! This crate models the *input* of the binding generator: a database of Web
//! IDL definitions that has already been parsed, merged (partials, mixins,
//! includes) and resolved by an external frontend. The generator consumes
//! these objects as read-only typed values; nothing here validates IDL.
//!
//! The whole schema derives `serde::Deserialize` so a database produced by
//! the frontend can be loaded from JSON. Tests construct the objects
//! directly.

pub mod database;
pub mod definitions;
pub mod exposure;
pub mod extended_attributes;
pub mod info;
pub mod members;
pub mod types;

pub use database::{Database, DatabaseError};
pub use definitions::{
    AsyncIterable, AsyncIterator, CallbackFunction, CallbackInterface, Dictionary, Enumeration,
    Interface, Iterable, IteratorKind, Maplike, Namespace, ObservableArray, Setlike, SyncIterator,
    Typedef, Union,
};
pub use exposure::{Exposure, GlobalNameAndFeature, SecureContextMode};
pub use extended_attributes::ExtendedAttributes;
pub use info::{CodeGeneratorInfo, Component, DebugInfo};
pub use members::{
    Argument, Attribute, Constant, Constructor, ConstructorGroup, DefaultValue, DictionaryMember,
    ExposedConstruct, IndexedAndNamedProperties, LegacyWindowAlias, Operation, OperationGroup,
    SpecialOperationKind, Stringifier,
};
pub use types::{BufferSourceKind, FloatKind, IntegerKind, StringKind, TypeKind};
pub use types::{IdlType, UnwrapFlags};
