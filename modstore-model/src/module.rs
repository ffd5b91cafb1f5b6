use crate::{Document, FieldReader, FieldWriter, ModelResult, ModuleSchema};
use std::sync::{Arc, RwLock};

/// Shared handle to a cached module. Callers mutate in place; two handles
/// refer to the same instance iff `Arc::ptr_eq` holds.
pub type ModuleRef<M> = Arc<RwLock<M>>;

/// A module whose state round-trips through its entity's document.
///
/// Implementors declare their bindings in [`schema`](Self::schema) and move
/// values through the reader/writer; nothing is discovered by reflection.
pub trait PersistentModule: Send + Sync + 'static {
    /// The field-to-path table for this module type.
    fn schema() -> ModuleSchema
    where
        Self: Sized;

    /// Populates fields from the document (defaults applied for absent paths).
    fn read_fields(&mut self, fields: &FieldReader<'_>) -> ModelResult<()>;

    /// Writes fields back into the document.
    fn write_fields(&self, fields: &mut FieldWriter<'_>) -> ModelResult<()>;
}

/// A module that lives only as long as its cache entry and is never
/// serialized.
pub trait TransientModule: Send + Sync + 'static {}

/// Populates `module` from `document` using the module's schema.
pub fn read_module<M: PersistentModule>(module: &mut M, document: &Document) -> ModelResult<()> {
    let schema = M::schema();
    schema.validate()?;
    module.read_fields(&FieldReader::new(document, &schema))
}

/// Flushes `module` into `document` using the module's schema.
pub fn write_module<M: PersistentModule>(module: &M, document: &mut Document) -> ModelResult<()> {
    let schema = M::schema();
    module.write_fields(&mut FieldWriter::new(document, &schema))
}
