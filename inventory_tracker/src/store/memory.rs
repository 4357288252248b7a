//! In-memory record store for tests and throwaway runs

use super::RecordStore;
use crate::error::{InventoryError, Result};
use crate::product::{ProductRecord, Sku};
use crate::users::{User, UserDirectory};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<Sku, ProductRecord>>,
    users: Mutex<BTreeMap<String, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<Sku, ProductRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_users(&self) -> MutexGuard<'_, BTreeMap<String, User>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, sku: &Sku) -> Result<ProductRecord> {
        self.lock()
            .get(sku)
            .cloned()
            .ok_or_else(|| InventoryError::NotFound(sku.to_string()))
    }

    fn insert(&self, record: ProductRecord) -> Result<()> {
        record.validate()?;
        match self.lock().entry(record.sku.clone()) {
            Entry::Occupied(_) => Err(InventoryError::AlreadyExists(record.sku.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    fn update(
        &self,
        sku: &Sku,
        apply: &mut dyn FnMut(&mut ProductRecord) -> Result<()>,
    ) -> Result<ProductRecord> {
        let mut records = self.lock();
        let current = records
            .get(sku)
            .ok_or_else(|| InventoryError::NotFound(sku.to_string()))?;
        let mut edited = current.clone();
        apply(&mut edited)?;
        edited.validate()?;
        records.insert(sku.clone(), edited.clone());
        Ok(edited)
    }

    fn upsert(&self, record: ProductRecord) -> Result<Option<ProductRecord>> {
        record.validate()?;
        Ok(self.lock().insert(record.sku.clone(), record))
    }

    fn remove(&self, sku: &Sku) -> Result<ProductRecord> {
        self.lock()
            .remove(sku)
            .ok_or_else(|| InventoryError::NotFound(sku.to_string()))
    }

    fn list_all(&self) -> Result<Vec<ProductRecord>> {
        Ok(self.lock().values().cloned().collect())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.lock().len())
    }
}

impl UserDirectory for MemoryStore {
    fn insert_user(&self, user: User) -> Result<()> {
        match self.lock_users().entry(user.username.clone()) {
            Entry::Occupied(_) => Err(InventoryError::UserExists(user.username)),
            Entry::Vacant(slot) => {
                slot.insert(user);
                Ok(())
            }
        }
    }

    fn get_user(&self, username: &str) -> Result<User> {
        self.lock_users()
            .get(username)
            .cloned()
            .ok_or_else(|| InventoryError::UnknownUser(username.to_string()))
    }

    fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.lock_users().values().cloned().collect())
    }

    fn set_user_active(&self, username: &str, active: bool) -> Result<User> {
        let mut users = self.lock_users();
        let user = users
            .get_mut(username)
            .ok_or_else(|| InventoryError::UnknownUser(username.to_string()))?;
        user.is_active = active;
        Ok(user.clone())
    }
}
