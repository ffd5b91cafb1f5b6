//! Shared test modules for cache tests.

#![allow(dead_code)]

use modstore_cache::{EntityRecord, EntityService, ModuleRegistry};
use modstore_model::{
    FieldBinding, FieldReader, FieldWriter, ModelResult, ModuleSchema, PersistentModule,
    TransientModule,
};
use modstore_storage::MemoryStore;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// Chat flags stored under `/flags`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Flags {
    pub muted: bool,
    pub reason: Option<String>,
}

impl PersistentModule for Flags {
    fn schema() -> ModuleSchema {
        ModuleSchema::new("flags")
            .field(FieldBinding::bool("muted", "/flags/muted").with_default(false))
            .field(FieldBinding::text("reason", "/flags/reason"))
    }

    fn read_fields(&mut self, fields: &FieldReader<'_>) -> ModelResult<()> {
        self.muted = fields.get("muted")?;
        self.reason = fields.get_opt("reason")?;
        Ok(())
    }

    fn write_fields(&self, fields: &mut FieldWriter<'_>) -> ModelResult<()> {
        fields.set("muted", &self.muted)?;
        fields.set_opt("reason", self.reason.as_ref())
    }
}

/// Named locations stored under `/homes`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Homes {
    pub homes: BTreeMap<String, String>,
}

impl PersistentModule for Homes {
    fn schema() -> ModuleSchema {
        ModuleSchema::new("homes")
            .field(FieldBinding::map("homes", "/homes").with_default(serde_json::json!({})))
    }

    fn read_fields(&mut self, fields: &FieldReader<'_>) -> ModelResult<()> {
        self.homes = fields.get("homes")?;
        Ok(())
    }

    fn write_fields(&self, fields: &mut FieldWriter<'_>) -> ModelResult<()> {
        fields.set("homes", &self.homes)
    }
}

/// Session-only away status.
#[derive(Debug, Default)]
pub struct Afk {
    pub away: bool,
}

impl TransientModule for Afk {}

/// Needs its owning record, so it can only come from a factory.
#[derive(Debug)]
pub struct Jail {
    pub owner: Weak<EntityRecord>,
    pub jailed: bool,
}

impl PersistentModule for Jail {
    fn schema() -> ModuleSchema {
        ModuleSchema::new("jail").field(FieldBinding::bool("jailed", "/jail/jailed").with_default(false))
    }

    fn read_fields(&mut self, fields: &FieldReader<'_>) -> ModelResult<()> {
        self.jailed = fields.get("jailed")?;
        Ok(())
    }

    fn write_fields(&self, fields: &mut FieldWriter<'_>) -> ModelResult<()> {
        fields.set("jailed", &self.jailed)
    }
}

/// Its factory always fails.
#[derive(Debug, Default)]
pub struct Broken;

impl PersistentModule for Broken {
    fn schema() -> ModuleSchema {
        ModuleSchema::new("broken")
    }

    fn read_fields(&mut self, _fields: &FieldReader<'_>) -> ModelResult<()> {
        Ok(())
    }

    fn write_fields(&self, _fields: &mut FieldWriter<'_>) -> ModelResult<()> {
        Ok(())
    }
}

/// Registry with factories for `Jail` and `Broken`; everything else falls back.
pub fn registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry
        .register(|ctx| {
            Ok(Jail {
                owner: ctx.record(),
                jailed: false,
            })
        })
        .register::<Broken, _>(|_| Err(anyhow::anyhow!("broken on purpose")));
    registry
}

pub fn service() -> (Arc<MemoryStore>, EntityService) {
    let store = Arc::new(MemoryStore::new());
    let service = EntityService::new(store.clone(), Arc::new(registry()));
    (store, service)
}
