//! Durable marketplace store.
//!
//! Sled-backed storage for bounties and services. Every state transition
//! goes through a compare-and-swap loop on the serialized row, so a
//! transition is single-row atomic: under concurrent attempts exactly one
//! writer lands and the rest re-evaluate their precondition against the
//! fresh row. Records are bincode-encoded; ids are allocated from per-tree
//! monotonic counters so listings stay deterministic.

use crate::bounty::Bounty;
use crate::catalog::Service;
use crate::error::{ApiError, StoreError};
use crate::types::{BountyId, ServiceId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

const BOUNTIES_TREE: &str = "bounties";
const SERVICES_TREE: &str = "services";
const META_TREE: &str = "meta";

/// Shared durable store for bounties and services.
pub struct MarketStore {
    db: sled::Db,
    bounties: sled::Tree,
    services: sled::Tree,
    meta: sled::Tree,
}

fn encode_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(bincode::deserialize(bytes)?)
}

fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>, StoreError> {
    Ok(bincode::serialize(record)?)
}

impl MarketStore {
    /// Open (or create) the store at the given directory.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let bounties = db.open_tree(BOUNTIES_TREE)?;
        let services = db.open_tree(SERVICES_TREE)?;
        let meta = db.open_tree(META_TREE)?;
        Ok(Self {
            db,
            bounties,
            services,
            meta,
        })
    }

    /// Allocate the next id for a tree. `update_and_fetch` makes the
    /// increment atomic across concurrent creators.
    fn alloc_id(&self, counter: &str) -> Result<u64, StoreError> {
        let bytes = self.meta.update_and_fetch(counter, |old| {
            let next = old
                .and_then(|b| b.try_into().ok().map(u64::from_be_bytes))
                .unwrap_or(0)
                + 1;
            Some(next.to_be_bytes().to_vec())
        })?;
        let bytes = bytes.ok_or_else(|| {
            StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "id counter vanished",
            ))
        })?;
        let arr: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
            StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "id counter corrupted",
            ))
        })?;
        Ok(u64::from_be_bytes(arr))
    }

    pub fn next_bounty_id(&self) -> Result<BountyId, StoreError> {
        self.alloc_id("bounty_id")
    }

    pub fn next_service_id(&self) -> Result<ServiceId, StoreError> {
        self.alloc_id("service_id")
    }

    fn get_record<T: DeserializeOwned>(
        tree: &sled::Tree,
        id: u64,
    ) -> Result<Option<T>, StoreError> {
        match tree.get(encode_key(id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_record<T: Serialize>(tree: &sled::Tree, id: u64, record: &T) -> Result<(), StoreError> {
        tree.insert(encode_key(id), encode(record)?)?;
        tree.flush()?;
        Ok(())
    }

    /// Atomic conditional update: read the row, run the caller's check-and
    /// -mutate closure, and publish with compare-and-swap. A CAS miss means
    /// another writer landed first; the precondition is re-evaluated against
    /// the new row, so a losing `claim` surfaces `Conflict` rather than a
    /// corrupted state.
    fn update_record<T, F>(
        tree: &sled::Tree,
        entity: &'static str,
        id: u64,
        mutate: F,
    ) -> Result<T, ApiError>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(&T) -> Result<T, ApiError>,
    {
        let key = encode_key(id);
        loop {
            let current = tree
                .get(key)
                .map_err(StoreError::from)?
                .ok_or_else(|| ApiError::not_found(entity, id))?;
            let record: T = decode(&current)?;
            let updated = mutate(&record)?;
            let encoded = encode(&updated).map_err(ApiError::from)?;
            match tree
                .compare_and_swap(key, Some(current), Some(encoded))
                .map_err(StoreError::from)?
            {
                Ok(()) => {
                    tree.flush().map_err(StoreError::from)?;
                    return Ok(updated);
                }
                // Row changed underneath us; retry against the fresh value.
                Err(_) => continue,
            }
        }
    }

    fn scan<T: DeserializeOwned>(tree: &sled::Tree) -> Result<Vec<T>, StoreError> {
        let mut records = Vec::new();
        for item in tree.iter() {
            let (_, value) = item?;
            records.push(decode(&value)?);
        }
        Ok(records)
    }

    // ---- bounties ----

    pub fn insert_bounty(&self, bounty: &Bounty) -> Result<(), StoreError> {
        Self::put_record(&self.bounties, bounty.id, bounty)
    }

    pub fn get_bounty(&self, id: BountyId) -> Result<Option<Bounty>, StoreError> {
        Self::get_record(&self.bounties, id)
    }

    pub fn update_bounty<F>(&self, id: BountyId, mutate: F) -> Result<Bounty, ApiError>
    where
        F: Fn(&Bounty) -> Result<Bounty, ApiError>,
    {
        Self::update_record(&self.bounties, "bounty", id, mutate)
    }

    pub fn scan_bounties(&self) -> Result<Vec<Bounty>, StoreError> {
        Self::scan(&self.bounties)
    }

    // ---- services ----

    pub fn insert_service(&self, service: &Service) -> Result<(), StoreError> {
        Self::put_record(&self.services, service.id, service)
    }

    pub fn get_service(&self, id: ServiceId) -> Result<Option<Service>, StoreError> {
        Self::get_record(&self.services, id)
    }

    pub fn update_service<F>(&self, id: ServiceId, mutate: F) -> Result<Service, ApiError>
    where
        F: Fn(&Service) -> Result<Service, ApiError>,
    {
        Self::update_record(&self.services, "service", id, mutate)
    }

    pub fn scan_services(&self) -> Result<Vec<Service>, StoreError> {
        Self::scan(&self.services)
    }

    /// Storage reachability probe for the health check.
    pub fn is_reachable(&self) -> bool {
        self.meta.contains_key("health_probe").is_ok() && self.db.size_on_disk().is_ok()
    }
}
