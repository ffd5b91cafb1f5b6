//! Document and module model for modstore.
//!
//! Defines the types every cache layer depends on:
//! - [`Document`]: one entity's persisted tree (JSON object + virtual flag)
//! - [`ModuleSchema`] / [`FieldBinding`]: the field-to-path table a module declares
//! - [`PersistentModule`] / [`TransientModule`]: the two module kinds
//! - [`FieldReader`] / [`FieldWriter`]: typed access to bound paths
//!
//! Modules never introspect themselves at runtime. Each persistent module
//! declares its bindings once in [`PersistentModule::schema`] and reads or
//! writes its fields through them.

mod document;
mod error;
mod module;
mod schema;

pub use document::Document;
pub use error::{ModelError, ModelResult};
pub use module::{read_module, write_module, ModuleRef, PersistentModule, TransientModule};
pub use schema::{FieldBinding, FieldReader, FieldType, FieldWriter, ModuleSchema};
