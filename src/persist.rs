//! Character persistence.
//!
//! The engine only knows about `CharacterStore`: a synchronous sink invoked
//! once after every successful mutating operation. `MemoryStore` is the
//! key-value blob store the game uses in-session; `SavedCharacter` is the
//! versioned on-disk format for exporting and re-importing characters.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::warn;

use crate::character::{Character, CharacterId};

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Where mutated characters go.
///
/// Called exactly once per successful engine operation. Storage is assumed
/// to accept every write; implementations deal with their own failures.
pub trait CharacterStore: Send + Sync {
    fn persist(&self, character: &Character);
}

impl<T: CharacterStore> CharacterStore for Arc<T> {
    fn persist(&self, character: &Character) {
        (**self).persist(character)
    }
}

/// A store that discards everything.
pub struct NullStore;

impl CharacterStore for NullStore {
    fn persist(&self, _character: &Character) {}
}

/// Thread-safe key-value store of serialized character blobs, keyed by
/// character id.
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored blob for a character, if present.
    pub fn get(&self, id: &CharacterId) -> Option<String> {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner()).get(&id.to_string()).cloned()
    }

    /// Deserialize the stored character, if present and well-formed.
    pub fn load(&self, id: &CharacterId) -> Option<Character> {
        self.get(id)
            .and_then(|blob| serde_json::from_str(&blob).ok())
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CharacterStore for MemoryStore {
    fn persist(&self, character: &Character) {
        match serde_json::to_string(character) {
            Ok(blob) => {
                self.blobs
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(character.id.to_string(), blob);
            }
            Err(error) => warn!(%error, "failed to serialize character"),
        }
    }
}

// ============================================================================
// Character save files
// ============================================================================

/// Current character save file version.
const CHARACTER_SAVE_VERSION: u32 = 1;

/// A saved character that can be reused across sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedCharacter {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// When the character was saved (unix seconds, as a string).
    pub saved_at: String,

    /// The complete character data.
    pub character: Character,

    /// Quick-access metadata about the character.
    pub metadata: CharacterMetadata,
}

/// Metadata about a saved character for quick display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterMetadata {
    pub name: String,
    pub max_hp: i32,
    /// Distinct item ids held.
    pub item_count: usize,
}

impl SavedCharacter {
    /// Create a new saved character from a Character.
    pub fn new(character: Character) -> Self {
        let metadata = CharacterMetadata {
            name: character.name.clone(),
            max_hp: character.max_hp,
            item_count: character.inventory.len(),
        };

        Self {
            version: CHARACTER_SAVE_VERSION,
            saved_at: crate::status::unix_now().to_string(),
            character,
            metadata,
        }
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;

        if saved.version != CHARACTER_SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: CHARACTER_SAVE_VERSION,
                found: saved.version,
            });
        }

        Ok(saved)
    }

    /// Get metadata without loading the full character.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<CharacterMetadata, PersistError> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: CharacterMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;

        if partial.version != CHARACTER_SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: CHARACTER_SAVE_VERSION,
                found: partial.version,
            });
        }

        Ok(partial.metadata)
    }
}

/// Information about a character save file.
#[derive(Debug, Clone)]
pub struct CharacterSaveInfo {
    /// Path to the save file.
    pub path: String,

    /// Character metadata.
    pub metadata: CharacterMetadata,
}

/// List all character save files in a directory, sorted by name.
pub async fn list_character_saves(
    dir: impl AsRef<Path>,
) -> Result<Vec<CharacterSaveInfo>, PersistError> {
    let mut saves = Vec::new();

    let dir_path = dir.as_ref();
    if !dir_path.exists() {
        fs::create_dir_all(dir_path).await?;
        return Ok(saves);
    }

    let mut entries = fs::read_dir(dir_path).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            if let Ok(metadata) = SavedCharacter::peek_metadata(&path).await {
                saves.push(CharacterSaveInfo {
                    path: path.to_string_lossy().to_string(),
                    metadata,
                });
            }
        }
    }

    saves.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
    Ok(saves)
}

/// Generate a save path for a character name.
pub fn character_save_path(dir: impl AsRef<Path>, name: &str) -> std::path::PathBuf {
    let sanitized = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>();
    dir.as_ref().join(format!("{sanitized}.json"))
}
