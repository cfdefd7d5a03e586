//! Process-wide profile cache tying the engine together.

use crate::error::{ProfileError, Result};
use crate::profile::{PlayerProfile, Profile};
use crate::storage::ProfileStorage;
use crate::types::ProfileType;
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Base path for the store.
    pub path: PathBuf,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./profiles"),
            create_if_missing: true,
        }
    }
}

/// Magic bytes for the store manifest.
const STORE_MAGIC: &[u8; 4] = b"PRF\0";

/// Current store format version.
const STORE_VERSION: u8 = 1;

/// Process-wide cache of player profiles.
///
/// Accounts materialize lazily from storage on first lookup and stay
/// resident for the life of the process. Each account sits behind its own
/// mutex: a request locks the account for its whole mutation sequence, so
/// at most one request mutates an account at a time while other accounts
/// proceed in parallel. [`ProfileStore::drain`] flushes everything at
/// shutdown.
pub struct ProfileStore {
    config: StoreConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    /// Document persistence.
    storage: ProfileStorage,

    /// Loaded accounts.
    profiles: RwLock<HashMap<String, Arc<Mutex<PlayerProfile>>>>,
}

impl ProfileStore {
    /// Open an existing store or create a new one.
    pub fn open_or_create(config: StoreConfig) -> Result<Self> {
        if config.path.exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(ProfileError::NotInitialized)
        }
    }

    /// Create a new store.
    pub fn create(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.path)?;
        Self::write_manifest(&config.path)?;
        let lock_file = Self::acquire_lock(&config.path)?;
        let storage = ProfileStorage::open(config.path.join("accounts"))?;

        info!(path = %config.path.display(), "created profile store");

        Ok(Self {
            config,
            _lock_file: lock_file,
            storage,
            profiles: RwLock::new(HashMap::new()),
        })
    }

    /// Open an existing store.
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::verify_manifest(&config.path)?;
        let lock_file = Self::acquire_lock(&config.path)?;
        let storage = ProfileStorage::open(config.path.join("accounts"))?;

        info!(path = %config.path.display(), "opened profile store");

        Ok(Self {
            config,
            _lock_file: lock_file,
            storage,
            profiles: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The underlying document storage (useful for seeding accounts).
    pub fn storage(&self) -> &ProfileStorage {
        &self.storage
    }

    /// Get the account aggregate, loading it from storage on first touch.
    ///
    /// Callers lock the returned handle for the duration of one request's
    /// mutation sequence and response construction.
    pub fn get(&self, account_id: &str) -> Result<Arc<Mutex<PlayerProfile>>> {
        if let Some(profile) = self.profiles.read().get(account_id) {
            return Ok(Arc::clone(profile));
        }

        // Load outside the map lock so first-touch disk reads don't stall
        // unrelated accounts. If two requests race, the second insert loses
        // and its load is dropped; both read the same committed documents.
        let loaded = self.load_account(account_id)?;

        let mut profiles = self.profiles.write();
        if let Some(profile) = profiles.get(account_id) {
            return Ok(Arc::clone(profile));
        }
        let handle = Arc::new(Mutex::new(loaded));
        profiles.insert(account_id.to_string(), Arc::clone(&handle));
        debug!(account = account_id, "materialized player profile");
        Ok(handle)
    }

    /// Whether an account is currently resident.
    pub fn contains(&self, account_id: &str) -> bool {
        self.profiles.read().contains_key(account_id)
    }

    /// Number of resident accounts.
    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }

    /// Persist one account's dirty segments.
    ///
    /// A storage failure leaves the in-memory state untouched and the
    /// affected segments dirty, so a later save retries them.
    pub fn save(&self, account_id: &str) -> Result<()> {
        let handle = self.profiles.read().get(account_id).cloned();
        match handle {
            Some(handle) => {
                let mut player = handle.lock();
                self.save_player(&mut player)
            }
            None => Ok(()),
        }
    }

    /// Persist every resident account's dirty segments. Failures are
    /// logged and the first error returned, but every account is
    /// attempted.
    pub fn save_all(&self) -> Result<()> {
        let handles: Vec<Arc<Mutex<PlayerProfile>>> =
            self.profiles.read().values().cloned().collect();

        let mut result = Ok(());
        for handle in handles {
            let mut player = handle.lock();
            if let Err(e) = self.save_player(&mut player) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Flush and evict everything (graceful shutdown). Accounts whose
    /// flush failed stay resident so nothing in memory is lost.
    pub fn drain(&self) -> Result<()> {
        let handles: Vec<(String, Arc<Mutex<PlayerProfile>>)> = self
            .profiles
            .read()
            .iter()
            .map(|(account, handle)| (account.clone(), Arc::clone(handle)))
            .collect();

        let mut result = Ok(());
        let mut flushed = Vec::new();
        for (account, handle) in handles {
            let mut player = handle.lock();
            match self.save_player(&mut player) {
                Ok(()) => flushed.push(account),
                Err(e) => {
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
        }

        let mut profiles = self.profiles.write();
        for account in flushed {
            profiles.remove(&account);
        }
        info!(remaining = profiles.len(), "drained profile store");
        result
    }

    fn load_account(&self, account_id: &str) -> Result<PlayerProfile> {
        let mut segments: [Option<Profile>; 5] = Default::default();
        for profile_type in ProfileType::ALL {
            segments[profile_type.index()] = self
                .storage
                .load(account_id, profile_type)?
                .map(Profile::from_document);
        }
        Ok(PlayerProfile::from_segments(account_id, |profile_type| {
            segments[profile_type.index()].take()
        }))
    }

    fn save_player(&self, player: &mut PlayerProfile) -> Result<()> {
        let mut result = Ok(());
        for segment in player.segments_mut() {
            if !segment.is_dirty() {
                continue;
            }
            match self.storage.store(&segment.to_document()) {
                Ok(()) => segment.mark_clean(),
                Err(e) => {
                    warn!(
                        account = segment.account_id(),
                        profile = %segment.profile_type(),
                        error = %e,
                        "profile flush failed, keeping segment dirty"
                    );
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
        }
        result
    }

    fn write_manifest(path: &Path) -> Result<()> {
        use std::io::Write;

        let manifest_path = path.join("MANIFEST");
        let mut file = File::create(manifest_path)?;

        file.write_all(STORE_MAGIC)?;
        file.write_all(&[STORE_VERSION])?;
        file.sync_all()?;

        Ok(())
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        use std::io::Read;

        let manifest_path = path.join("MANIFEST");
        let mut file = File::open(manifest_path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != STORE_MAGIC {
            return Err(ProfileError::InvalidFormat("Invalid store magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != STORE_VERSION {
            return Err(ProfileError::InvalidFormat(format!(
                "Unsupported store version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_path = path.join("LOCK");
        let lock_file = File::create(lock_path)?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| ProfileError::Locked)?;

        Ok(lock_file)
    }
}
