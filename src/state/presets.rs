/// Named presets and per-image sidecars
///
/// Both persist `Uniforms` in its key=value text form. The preset store is a
/// JSON list of `{ name, settings }` records rewritten in full on every
/// change; a sidecar is the bare text next to the image.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, ValidationError};
use crate::export::write_then_rename;
use crate::state::uniforms::Uniforms;

#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: String,
    pub uniforms: Uniforms,
}

/// On-disk form of a preset
#[derive(Serialize, Deserialize, Debug)]
struct PresetRecord {
    name: String,
    settings: String,
}

/// Ordered list of named presets backed by one file
#[derive(Debug)]
pub struct PresetStore {
    path: PathBuf,
    presets: Vec<Preset>,
}

impl PresetStore {
    /// Load the store at `path`. A missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self { path, presets: Vec::new() });
        }

        let text = std::fs::read_to_string(&path)?;
        let records: Vec<PresetRecord> = serde_json::from_str(&text)?;
        let presets: Vec<Preset> = records
            .into_iter()
            .map(|r| Preset {
                uniforms: Uniforms::deserialize(&r.settings),
                name: r.name,
            })
            .collect();

        tracing::info!("🎛️  Loaded {} presets from {}", presets.len(), path.display());
        Ok(Self { path, presets })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.iter().map(|p| p.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.name == name)
    }

    /// Save under `name`, replacing any preset of the same name in place.
    ///
    /// An empty name is a no-op and returns `Ok(false)`.
    pub fn save(&mut self, name: &str, uniforms: &Uniforms) -> Result<bool> {
        let name = name.trim();
        if name.is_empty() {
            tracing::warn!("⚠️  {}", ValidationError::EmptyName);
            return Ok(false);
        }

        let mut presets = self.presets.clone();
        match presets.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.uniforms = *uniforms,
            None => presets.push(Preset {
                name: name.to_string(),
                uniforms: *uniforms,
            }),
        }
        self.replace(presets)?;
        tracing::info!("💾 Saved preset '{name}'");
        Ok(true)
    }

    /// Remove `name`. Returns whether anything was removed.
    pub fn delete(&mut self, name: &str) -> Result<bool> {
        if self.get(name).is_none() {
            return Ok(false);
        }
        let presets = self.presets.iter().filter(|p| p.name != name).cloned().collect();
        self.replace(presets)?;
        tracing::info!("🗑️  Deleted preset '{name}'");
        Ok(true)
    }

    /// Write `presets` as the whole store file, then adopt them. A failed
    /// write leaves the store unchanged.
    fn replace(&mut self, presets: Vec<Preset>) -> Result<()> {
        let records: Vec<PresetRecord> = presets
            .iter()
            .map(|p| PresetRecord {
                name: p.name.clone(),
                settings: p.uniforms.serialize(),
            })
            .collect();
        let json = serde_json::to_vec_pretty(&records)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_then_rename(&self.path, |file| file.write_all(&json))?;
        self.presets = presets;
        Ok(())
    }
}

/// Sidecar location for an image: the image path with `.<ext>` appended
pub fn sidecar_path(image: &Path, ext: &str) -> PathBuf {
    let mut name = image.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

pub fn save_sidecar(image: &Path, ext: &str, uniforms: &Uniforms) -> Result<PathBuf> {
    let path = sidecar_path(image, ext);
    let text = uniforms.serialize();
    write_then_rename(&path, |file| file.write_all(text.as_bytes()))?;
    tracing::info!("📝 Wrote sidecar {}", path.display());
    Ok(path)
}

/// Adjustments stored next to `image`, if a sidecar exists
pub fn load_sidecar(image: &Path, ext: &str) -> Result<Option<Uniforms>> {
    let path = sidecar_path(image, ext);
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path)?;
    tracing::info!("📝 Applying sidecar {}", path.display());
    Ok(Some(Uniforms::deserialize(&text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warm() -> Uniforms {
        let mut u = Uniforms::defaults();
        u.temperature = 0.35;
        u.tint = 0.05;
        u.vibrance = 0.2;
        u.hsl_adjustments[1] = [0.1, 0.2, -0.1, 0.0];
        u
    }

    #[test]
    fn test_missing_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PresetStore::load(dir.path().join("presets.json")).unwrap();
        assert!(store.presets().is_empty());
    }

    #[test]
    fn test_save_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.json");

        let mut store = PresetStore::load(&path).unwrap();
        assert!(store.save("Warm", &warm()).unwrap());
        assert!(store.save("Flat", &Uniforms::defaults()).unwrap());

        let reloaded = PresetStore::load(&path).unwrap();
        assert_eq!(reloaded.names().collect::<Vec<_>>(), vec!["Warm", "Flat"]);
        assert_eq!(reloaded.get("Warm").map(|p| p.uniforms), Some(warm()));
    }

    #[test]
    fn test_name_collision_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PresetStore::load(dir.path().join("p.json")).unwrap();
        store.save("A", &Uniforms::defaults()).unwrap();
        store.save("B", &Uniforms::defaults()).unwrap();
        store.save("A", &warm()).unwrap();

        assert_eq!(store.names().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(store.get("A").map(|p| p.uniforms), Some(warm()));
    }

    #[test]
    fn test_empty_name_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        let mut store = PresetStore::load(&path).unwrap();
        assert!(!store.save("   ", &warm()).unwrap());
        assert!(store.presets().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        let mut store = PresetStore::load(&path).unwrap();
        store.save("A", &warm()).unwrap();
        assert!(store.delete("A").unwrap());
        assert!(!store.delete("A").unwrap());
        assert!(PresetStore::load(&path).unwrap().presets().is_empty());
    }

    #[test]
    fn test_failed_write_keeps_previous_presets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        let mut store = PresetStore::load(&path).unwrap();
        store.save("A", &warm()).unwrap();

        // The store file's parent becomes a regular file, so every write fails
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"").unwrap();
        store.path = blocked.join("p.json");

        assert!(store.save("B", &Uniforms::defaults()).is_err());
        assert!(store.save("A", &Uniforms::defaults()).is_err());
        assert!(store.delete("A").is_err());
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["A"]);
        assert_eq!(store.get("A").map(|p| p.uniforms), Some(warm()));
    }

    #[test]
    fn test_sidecar_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("IMG_0001.CR2");
        assert_eq!(load_sidecar(&image, "darkroom").unwrap(), None);

        let written = save_sidecar(&image, "darkroom", &warm()).unwrap();
        assert_eq!(written, dir.path().join("IMG_0001.CR2.darkroom"));
        assert_eq!(load_sidecar(&image, "darkroom").unwrap(), Some(warm()));
    }
}
