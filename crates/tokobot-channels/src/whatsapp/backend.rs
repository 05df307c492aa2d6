//! In-memory storage backend for `whatsapp-rust`.
//!
//! Implements `SignalStore + AppSyncStore + ProtocolStore + DeviceStore` over
//! one [`SessionImage`]. The whole image round-trips through bincode, which
//! is what the session store persists for this client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Mutex;
use tokobot_core::message::SessionBlob;
use wacore::appstate::hash::HashState;
use wacore::appstate::processor::AppStateMutationMAC;
use wacore::store::error::StoreError;
use wacore::store::traits::{
    AppStateSyncKey, AppSyncStore, DeviceListRecord, DeviceStore, LidPnMappingEntry, ProtocolStore,
    SignalStore,
};
use wacore::store::Device;

type Result<T> = wacore::store::error::Result<T>;

/// Bumped when the image layout changes; older blobs are rejected on import.
const IMAGE_FORMAT: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SyncKey {
    key_data: Vec<u8>,
    timestamp: i64,
    fingerprint: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LidMapping {
    phone_number: String,
    created_at: i64,
    updated_at: i64,
    learning_source: String,
}

/// Everything the protocol library persists, keyed the way it asks for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SessionImage {
    format: u16,
    identities: BTreeMap<String, Vec<u8>>,
    sessions: BTreeMap<String, Vec<u8>>,
    /// id -> (record, uploaded)
    prekeys: BTreeMap<u32, (Vec<u8>, bool)>,
    signed_prekeys: BTreeMap<u32, Vec<u8>>,
    sender_keys: BTreeMap<String, Vec<u8>>,
    sync_keys: BTreeMap<Vec<u8>, SyncKey>,
    /// collection -> HashState as JSON
    versions: BTreeMap<String, String>,
    /// (collection, index_mac) -> (version, value_mac)
    mutation_macs: BTreeMap<(String, Vec<u8>), (u64, Vec<u8>)>,
    skdm_recipients: BTreeMap<String, BTreeSet<String>>,
    lid_mappings: BTreeMap<String, LidMapping>,
    /// (address, message_id) -> base key
    base_keys: BTreeMap<(String, String), Vec<u8>>,
    /// user -> DeviceListRecord as JSON
    device_lists: BTreeMap<String, String>,
    forget_marks: BTreeMap<String, BTreeSet<String>>,
    /// `Device` as bincode; its serde impls need a binary format.
    device: Option<Vec<u8>>,
}

impl Default for SessionImage {
    fn default() -> Self {
        Self {
            format: IMAGE_FORMAT,
            identities: BTreeMap::new(),
            sessions: BTreeMap::new(),
            prekeys: BTreeMap::new(),
            signed_prekeys: BTreeMap::new(),
            sender_keys: BTreeMap::new(),
            sync_keys: BTreeMap::new(),
            versions: BTreeMap::new(),
            mutation_macs: BTreeMap::new(),
            skdm_recipients: BTreeMap::new(),
            lid_mappings: BTreeMap::new(),
            base_keys: BTreeMap::new(),
            device_lists: BTreeMap::new(),
            forget_marks: BTreeMap::new(),
            device: None,
        }
    }
}

/// `whatsapp-rust` backend whose state lives in memory until exported.
#[derive(Default)]
pub struct ImageBackend {
    image: Mutex<SessionImage>,
}

impl ImageBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the backend from an exported session.
    pub fn from_blob(blob: &SessionBlob) -> std::result::Result<Self, String> {
        let image: SessionImage =
            bincode::deserialize(blob.as_bytes()).map_err(|e| format!("corrupt session: {e}"))?;
        if image.format != IMAGE_FORMAT {
            return Err(format!(
                "unsupported session format {} (expected {IMAGE_FORMAT})",
                image.format
            ));
        }
        Ok(Self {
            image: Mutex::new(image),
        })
    }

    /// Export the current state as an opaque session blob.
    pub async fn to_blob(&self) -> std::result::Result<SessionBlob, String> {
        let image = self.image.lock().await;
        bincode::serialize(&*image)
            .map(SessionBlob::new)
            .map_err(|e| format!("session export failed: {e}"))
    }

    /// Whether a device identity has been created (pairing started or done).
    pub async fn has_device(&self) -> bool {
        self.image.lock().await.device.is_some()
    }
}

fn ser_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization(e.to_string())
}

#[async_trait]
impl SignalStore for ImageBackend {
    async fn put_identity(&self, address: &str, key: [u8; 32]) -> Result<()> {
        let mut image = self.image.lock().await;
        image.identities.insert(address.to_string(), key.to_vec());
        Ok(())
    }

    async fn load_identity(&self, address: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.image.lock().await.identities.get(address).cloned())
    }

    async fn delete_identity(&self, address: &str) -> Result<()> {
        self.image.lock().await.identities.remove(address);
        Ok(())
    }

    async fn get_session(&self, address: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.image.lock().await.sessions.get(address).cloned())
    }

    async fn put_session(&self, address: &str, session: &[u8]) -> Result<()> {
        let mut image = self.image.lock().await;
        image.sessions.insert(address.to_string(), session.to_vec());
        Ok(())
    }

    async fn delete_session(&self, address: &str) -> Result<()> {
        self.image.lock().await.sessions.remove(address);
        Ok(())
    }

    async fn store_prekey(&self, id: u32, record: &[u8], uploaded: bool) -> Result<()> {
        let mut image = self.image.lock().await;
        image.prekeys.insert(id, (record.to_vec(), uploaded));
        Ok(())
    }

    async fn load_prekey(&self, id: u32) -> Result<Option<Vec<u8>>> {
        let image = self.image.lock().await;
        Ok(image.prekeys.get(&id).map(|(record, _)| record.clone()))
    }

    async fn remove_prekey(&self, id: u32) -> Result<()> {
        self.image.lock().await.prekeys.remove(&id);
        Ok(())
    }

    async fn store_signed_prekey(&self, id: u32, record: &[u8]) -> Result<()> {
        let mut image = self.image.lock().await;
        image.signed_prekeys.insert(id, record.to_vec());
        Ok(())
    }

    async fn load_signed_prekey(&self, id: u32) -> Result<Option<Vec<u8>>> {
        Ok(self.image.lock().await.signed_prekeys.get(&id).cloned())
    }

    async fn load_all_signed_prekeys(&self) -> Result<Vec<(u32, Vec<u8>)>> {
        let image = self.image.lock().await;
        Ok(image
            .signed_prekeys
            .iter()
            .map(|(id, record)| (*id, record.clone()))
            .collect())
    }

    async fn remove_signed_prekey(&self, id: u32) -> Result<()> {
        self.image.lock().await.signed_prekeys.remove(&id);
        Ok(())
    }

    async fn put_sender_key(&self, address: &str, record: &[u8]) -> Result<()> {
        let mut image = self.image.lock().await;
        image.sender_keys.insert(address.to_string(), record.to_vec());
        Ok(())
    }

    async fn get_sender_key(&self, address: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.image.lock().await.sender_keys.get(address).cloned())
    }

    async fn delete_sender_key(&self, address: &str) -> Result<()> {
        self.image.lock().await.sender_keys.remove(address);
        Ok(())
    }
}

#[async_trait]
impl AppSyncStore for ImageBackend {
    async fn get_sync_key(&self, key_id: &[u8]) -> Result<Option<AppStateSyncKey>> {
        let image = self.image.lock().await;
        Ok(image.sync_keys.get(key_id).map(|k| AppStateSyncKey {
            key_data: k.key_data.clone(),
            timestamp: k.timestamp,
            fingerprint: k.fingerprint.clone(),
        }))
    }

    async fn set_sync_key(&self, key_id: &[u8], key: AppStateSyncKey) -> Result<()> {
        let mut image = self.image.lock().await;
        image.sync_keys.insert(
            key_id.to_vec(),
            SyncKey {
                key_data: key.key_data,
                timestamp: key.timestamp,
                fingerprint: key.fingerprint,
            },
        );
        Ok(())
    }

    async fn get_version(&self, name: &str) -> Result<HashState> {
        let image = self.image.lock().await;
        match image.versions.get(name) {
            Some(data) => serde_json::from_str(data).map_err(ser_err),
            None => Ok(HashState::default()),
        }
    }

    async fn set_version(&self, name: &str, state: HashState) -> Result<()> {
        let data = serde_json::to_string(&state).map_err(ser_err)?;
        self.image
            .lock()
            .await
            .versions
            .insert(name.to_string(), data);
        Ok(())
    }

    async fn put_mutation_macs(
        &self,
        name: &str,
        version: u64,
        mutations: &[AppStateMutationMAC],
    ) -> Result<()> {
        let mut image = self.image.lock().await;
        for m in mutations {
            image.mutation_macs.insert(
                (name.to_string(), m.index_mac.clone()),
                (version, m.value_mac.clone()),
            );
        }
        Ok(())
    }

    async fn get_mutation_mac(&self, name: &str, index_mac: &[u8]) -> Result<Option<Vec<u8>>> {
        let image = self.image.lock().await;
        Ok(image
            .mutation_macs
            .get(&(name.to_string(), index_mac.to_vec()))
            .map(|(_, value_mac)| value_mac.clone()))
    }

    async fn delete_mutation_macs(&self, name: &str, index_macs: &[Vec<u8>]) -> Result<()> {
        let mut image = self.image.lock().await;
        for mac in index_macs {
            image.mutation_macs.remove(&(name.to_string(), mac.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProtocolStore for ImageBackend {
    async fn get_skdm_recipients(&self, group_jid: &str) -> Result<Vec<String>> {
        let image = self.image.lock().await;
        Ok(image
            .skdm_recipients
            .get(group_jid)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_skdm_recipients(&self, group_jid: &str, device_jids: &[String]) -> Result<()> {
        let mut image = self.image.lock().await;
        image
            .skdm_recipients
            .entry(group_jid.to_string())
            .or_default()
            .extend(device_jids.iter().cloned());
        Ok(())
    }

    async fn clear_skdm_recipients(&self, group_jid: &str) -> Result<()> {
        self.image.lock().await.skdm_recipients.remove(group_jid);
        Ok(())
    }

    async fn get_lid_mapping(&self, lid: &str) -> Result<Option<LidPnMappingEntry>> {
        let image = self.image.lock().await;
        Ok(image.lid_mappings.get(lid).map(|m| lid_entry(lid, m)))
    }

    async fn get_pn_mapping(&self, phone: &str) -> Result<Option<LidPnMappingEntry>> {
        let image = self.image.lock().await;
        Ok(image
            .lid_mappings
            .iter()
            .filter(|(_, m)| m.phone_number == phone)
            .max_by_key(|(_, m)| m.updated_at)
            .map(|(lid, m)| lid_entry(lid, m)))
    }

    async fn put_lid_mapping(&self, entry: &LidPnMappingEntry) -> Result<()> {
        let mut image = self.image.lock().await;
        image.lid_mappings.insert(
            entry.lid.clone(),
            LidMapping {
                phone_number: entry.phone_number.clone(),
                created_at: entry.created_at,
                updated_at: entry.updated_at,
                learning_source: entry.learning_source.clone(),
            },
        );
        Ok(())
    }

    async fn get_all_lid_mappings(&self) -> Result<Vec<LidPnMappingEntry>> {
        let image = self.image.lock().await;
        Ok(image
            .lid_mappings
            .iter()
            .map(|(lid, m)| lid_entry(lid, m))
            .collect())
    }

    async fn save_base_key(&self, address: &str, message_id: &str, base_key: &[u8]) -> Result<()> {
        let mut image = self.image.lock().await;
        image.base_keys.insert(
            (address.to_string(), message_id.to_string()),
            base_key.to_vec(),
        );
        Ok(())
    }

    async fn has_same_base_key(
        &self,
        address: &str,
        message_id: &str,
        current_base_key: &[u8],
    ) -> Result<bool> {
        let image = self.image.lock().await;
        Ok(image
            .base_keys
            .get(&(address.to_string(), message_id.to_string()))
            .is_some_and(|k| k == current_base_key))
    }

    async fn delete_base_key(&self, address: &str, message_id: &str) -> Result<()> {
        self.image
            .lock()
            .await
            .base_keys
            .remove(&(address.to_string(), message_id.to_string()));
        Ok(())
    }

    async fn update_device_list(&self, record: DeviceListRecord) -> Result<()> {
        let data = serde_json::to_string(&record).map_err(ser_err)?;
        self.image
            .lock()
            .await
            .device_lists
            .insert(record.user.clone(), data);
        Ok(())
    }

    async fn get_devices(&self, user: &str) -> Result<Option<DeviceListRecord>> {
        let image = self.image.lock().await;
        image
            .device_lists
            .get(user)
            .map(|data| serde_json::from_str(data).map_err(ser_err))
            .transpose()
    }

    async fn mark_forget_sender_key(&self, group_jid: &str, participant: &str) -> Result<()> {
        let mut image = self.image.lock().await;
        image
            .forget_marks
            .entry(group_jid.to_string())
            .or_default()
            .insert(participant.to_string());
        Ok(())
    }

    async fn consume_forget_marks(&self, group_jid: &str) -> Result<Vec<String>> {
        let mut image = self.image.lock().await;
        Ok(image
            .forget_marks
            .remove(group_jid)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl DeviceStore for ImageBackend {
    async fn save(&self, device: &Device) -> Result<()> {
        let data = bincode::serialize(device).map_err(ser_err)?;
        self.image.lock().await.device = Some(data);
        Ok(())
    }

    async fn load(&self) -> Result<Option<Device>> {
        let image = self.image.lock().await;
        image
            .device
            .as_deref()
            .map(|data| bincode::deserialize(data).map_err(ser_err))
            .transpose()
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.image.lock().await.device.is_some())
    }

    async fn create(&self) -> Result<i32> {
        // Single-device image; the device itself arrives through `save`.
        Ok(1)
    }
}

fn lid_entry(lid: &str, m: &LidMapping) -> LidPnMappingEntry {
    LidPnMappingEntry {
        lid: lid.to_string(),
        phone_number: m.phone_number.clone(),
        created_at: m.created_at,
        updated_at: m.updated_at,
        learning_source: m.learning_source.clone(),
    }
}
