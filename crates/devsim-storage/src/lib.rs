//! Persistent storage for device models and simulations.
//!
//! Both kinds share one redb database file, one table each. Writes go
//! through [`VersionedStore`], which enforces ETag optimistic concurrency.

pub mod error;
pub mod store;

use std::path::Path;

use devsim_core::{DeviceModel, Simulation, is_stock_model_id};

pub use error::{Error, Result};
pub use store::{Versioned, VersionedStore, memory_database, new_etag, open_database};

pub type DeviceModelStore = VersionedStore<DeviceModel>;
pub type SimulationStore = VersionedStore<Simulation>;

impl Versioned for DeviceModel {
    const TABLE: &'static str = "device_models";
    const KIND: &'static str = "DeviceModel";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn etag(&self) -> &str {
        &self.etag
    }

    fn set_etag(&mut self, etag: String) {
        self.etag = etag;
    }

    fn is_protected_id(id: &str) -> bool {
        is_stock_model_id(id)
    }

    fn is_protected(&self) -> bool {
        self.is_stock()
    }
}

impl Versioned for Simulation {
    const TABLE: &'static str = "simulations";
    const KIND: &'static str = "Simulation";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn etag(&self) -> &str {
        &self.etag
    }

    fn set_etag(&mut self, etag: String) {
        self.etag = etag;
    }
}

/// Every store the service needs, opened over one database.
#[derive(Clone)]
pub struct Stores {
    pub device_models: DeviceModelStore,
    pub simulations: SimulationStore,
}

impl Stores {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = open_database(path)?;
        Ok(Self {
            device_models: VersionedStore::new(db.clone()),
            simulations: VersionedStore::new(db),
        })
    }

    /// Stores over an in-memory database, for tests.
    pub fn memory() -> Result<Self> {
        let db = memory_database()?;
        Ok(Self {
            device_models: VersionedStore::new(db.clone()),
            simulations: VersionedStore::new(db),
        })
    }
}
