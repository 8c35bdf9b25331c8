//! On-disk store for encoded coefficient sets
//!
//! Encoding a dense HRTF set at high order is expensive, so results are
//! content-addressed: the key hashes everything the coefficients depend on.
//!
//! Layout under the root directory:
//! - `coefficients/<key>.json` - serialized `ShCoefficientSet`
//! - `index/<key>.json` - entry metadata, loaded at `open`

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::codec::{EncodingStrategy, ShCoefficientSet, ShEncoder};
use crate::config::EncoderConfig;
use crate::data::TransferFunctionSet;
use crate::error::ShResult;
use crate::grid::DirectionGrid;
use crate::sh::ShOrder;

/// Bumped whenever the encoder output changes for identical inputs
const CACHE_VERSION: &str = "rf-hrtf-sh/1";

/// SHA-256 content key of one encode
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for encoding `tf` on `grid` with the given order, strategy and config
    pub fn new(
        tf: &TransferFunctionSet,
        grid: &DirectionGrid,
        order: ShOrder,
        strategy: EncodingStrategy,
        config: &EncoderConfig,
    ) -> ShResult<Self> {
        let mut hasher = Sha256::new();
        hasher.update(CACHE_VERSION.as_bytes());
        hasher.update(strategy.name().as_bytes());
        hasher.update((order.as_usize() as u64).to_le_bytes());
        hasher.update(serde_json::to_vec(config)?);
        hasher.update(grid.fingerprint().as_bytes());
        hasher.update(tf.fingerprint().as_bytes());
        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// Key for what `encoder` would produce from `tf`
    pub fn for_encoder(encoder: &ShEncoder, tf: &TransferFunctionSet, strategy: EncodingStrategy) -> ShResult<Self> {
        Self::new(tf, encoder.grid(), encoder.order(), strategy, encoder.config())
    }

    /// Hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata of one cached set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Content key
    pub key: CacheKey,

    /// Encoding strategy
    pub strategy: EncodingStrategy,

    /// Encoding order
    pub order: ShOrder,

    /// MagLS cutoff, if any
    pub cutoff_hz: Option<f64>,

    /// Audio format
    pub sample_rate: u32,
    pub num_bins: usize,
}

/// Content-addressed coefficient store
#[derive(Debug)]
pub struct CoefficientCache {
    /// Root directory
    root: PathBuf,

    /// Loaded entry index
    index: HashMap<CacheKey, CacheEntry>,
}

impl CoefficientCache {
    /// Create or open a cache at the given path
    pub fn open<P: AsRef<Path>>(root: P) -> ShResult<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("coefficients"))?;
        fs::create_dir_all(root.join("index"))?;

        let mut cache = Self {
            root,
            index: HashMap::new(),
        };
        cache.load_index()?;

        log::debug!("Opened coefficient cache at {:?} ({} entries)", cache.root, cache.index.len());
        Ok(cache)
    }

    /// Load entry metadata, skipping unreadable files
    fn load_index(&mut self) -> ShResult<()> {
        for entry in fs::read_dir(self.root.join("index"))? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match fs::read_to_string(&path).map(|c| serde_json::from_str::<CacheEntry>(&c)) {
                    Ok(Ok(entry)) => {
                        self.index.insert(entry.key.clone(), entry);
                    }
                    _ => log::warn!("Skipping unreadable cache index file {:?}", path),
                }
            }
        }
        Ok(())
    }

    fn coefficients_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join("coefficients").join(format!("{}.json", key))
    }

    fn index_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join("index").join(format!("{}.json", key))
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of cached sets
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// All entries
    pub fn entries(&self) -> Vec<&CacheEntry> {
        self.index.values().collect()
    }

    /// Check if a key is cached
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.index.contains_key(key) && self.coefficients_path(key).exists()
    }

    /// Load a cached set
    pub fn get(&self, key: &CacheKey) -> ShResult<Option<ShCoefficientSet>> {
        if !self.contains(key) {
            return Ok(None);
        }
        let content = fs::read_to_string(self.coefficients_path(key))?;
        ShCoefficientSet::from_json(&content).map(Some)
    }

    /// Store a set under `key`, replacing any previous one
    pub fn insert(&mut self, key: CacheKey, set: &ShCoefficientSet) -> ShResult<()> {
        let entry = CacheEntry {
            key: key.clone(),
            strategy: set.strategy(),
            order: set.order(),
            cutoff_hz: set.cutoff_hz(),
            sample_rate: set.sample_rate(),
            num_bins: set.num_bins(),
        };

        fs::write(self.coefficients_path(&key), set.to_json()?)?;
        fs::write(self.index_path(&key), serde_json::to_string_pretty(&entry)?)?;
        self.index.insert(key, entry);
        Ok(())
    }

    /// Remove a cached set, returning whether it existed
    pub fn remove(&mut self, key: &CacheKey) -> ShResult<bool> {
        let existed = self.index.remove(key).is_some();
        for path in [self.coefficients_path(key), self.index_path(key)] {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(existed)
    }

    /// Cached result of `encoder.encode(tf, strategy)`, encoding and storing on a miss
    ///
    /// An unreadable cached file counts as a miss and is overwritten.
    pub fn get_or_encode(
        &mut self,
        encoder: &ShEncoder,
        tf: &TransferFunctionSet,
        strategy: EncodingStrategy,
    ) -> ShResult<ShCoefficientSet> {
        let key = CacheKey::for_encoder(encoder, tf, strategy)?;
        match self.get(&key) {
            Ok(Some(set)) => {
                log::debug!("Coefficient cache hit {}", key);
                return Ok(set);
            }
            Ok(None) => {}
            Err(e) => log::warn!("Discarding unreadable cached set {}: {}", key, e),
        }

        let set = encoder.encode(tf, strategy)?;
        self.insert(key, &set)?;
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binaural::SyntheticHrtf;
    use tempfile::TempDir;

    fn setup() -> (DirectionGrid, TransferFunctionSet, ShEncoder) {
        let grid = DirectionGrid::fibonacci(30).unwrap();
        let tf = SyntheticHrtf::new(48000, 32).unwrap().transfer_functions(&grid).unwrap();
        let encoder = ShEncoder::new(&grid, ShOrder::new(2).unwrap(), EncoderConfig::default()).unwrap();
        (grid, tf, encoder)
    }

    #[test]
    fn test_key_depends_on_inputs() {
        let (grid, tf, _) = setup();
        let order = ShOrder::new(2).unwrap();
        let config = EncoderConfig::default();

        let a = CacheKey::new(&tf, &grid, order, EncodingStrategy::MagLs, &config).unwrap();
        let b = CacheKey::new(&tf, &grid, order, EncodingStrategy::MagLs, &config).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);

        let other_strategy = CacheKey::new(&tf, &grid, order, EncodingStrategy::BiMagLs, &config).unwrap();
        let other_order = CacheKey::new(&tf, &grid, ShOrder::new(3).unwrap(), EncodingStrategy::MagLs, &config).unwrap();
        let other_config =
            CacheKey::new(&tf, &grid, order, EncodingStrategy::MagLs, &EncoderConfig::smoothed(0.5)).unwrap();
        assert_ne!(a, other_strategy);
        assert_ne!(a, other_order);
        assert_ne!(a, other_config);
    }

    #[test]
    fn test_insert_get_remove() {
        let dir = TempDir::new().unwrap();
        let (_, tf, encoder) = setup();
        let mut cache = CoefficientCache::open(dir.path()).unwrap();
        assert!(cache.is_empty());

        let set = encoder.encode(&tf, EncodingStrategy::Truncated).unwrap();
        let key = CacheKey::for_encoder(&encoder, &tf, EncodingStrategy::Truncated).unwrap();
        assert!(cache.get(&key).unwrap().is_none());

        cache.insert(key.clone(), &set).unwrap();
        assert!(cache.contains(&key));
        let loaded = cache.get(&key).unwrap().unwrap();
        assert_eq!(loaded.order(), set.order());
        assert_eq!(loaded.coefficients().dim(), set.coefficients().dim());

        assert!(cache.remove(&key).unwrap());
        assert!(!cache.contains(&key));
        assert!(!cache.remove(&key).unwrap());
    }

    #[test]
    fn test_index_persists() {
        let dir = TempDir::new().unwrap();
        let (_, tf, encoder) = setup();

        let key = {
            let mut cache = CoefficientCache::open(dir.path()).unwrap();
            cache.get_or_encode(&encoder, &tf, EncodingStrategy::BiMagLs).unwrap();
            CacheKey::for_encoder(&encoder, &tf, EncodingStrategy::BiMagLs).unwrap()
        };

        let cache = CoefficientCache::open(dir.path()).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&key));
        assert_eq!(cache.entries()[0].strategy, EncodingStrategy::BiMagLs);
    }

    #[test]
    fn test_get_or_encode_hits() {
        let dir = TempDir::new().unwrap();
        let (_, tf, encoder) = setup();
        let mut cache = CoefficientCache::open(dir.path()).unwrap();

        let first = cache.get_or_encode(&encoder, &tf, EncodingStrategy::MagLs).unwrap();
        let second = cache.get_or_encode(&encoder, &tf, EncodingStrategy::MagLs).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(first.strategy(), second.strategy());
        assert_eq!(first.cutoff_hz(), second.cutoff_hz());
        for (a, b) in first.coefficients().iter().zip(second.coefficients().iter()) {
            assert!((a - b).norm() <= 1e-12 * a.norm().max(1.0));
        }

        // Whatever is stored under the key is returned without encoding
        let key = CacheKey::for_encoder(&encoder, &tf, EncodingStrategy::MagLs).unwrap();
        let stored = encoder.encode(&tf, EncodingStrategy::Truncated).unwrap();
        cache.insert(key, &stored).unwrap();
        let hit = cache.get_or_encode(&encoder, &tf, EncodingStrategy::MagLs).unwrap();
        assert_eq!(hit.strategy(), EncodingStrategy::Truncated);
        assert_eq!(hit, cache.get_or_encode(&encoder, &tf, EncodingStrategy::MagLs).unwrap());
    }

    #[test]
    fn test_corrupt_coefficients_reencoded() {
        let dir = TempDir::new().unwrap();
        let (_, tf, encoder) = setup();
        let mut cache = CoefficientCache::open(dir.path()).unwrap();

        cache.get_or_encode(&encoder, &tf, EncodingStrategy::TimeAligned).unwrap();
        let key = CacheKey::for_encoder(&encoder, &tf, EncodingStrategy::TimeAligned).unwrap();
        fs::write(cache.coefficients_path(&key), "{ truncated").unwrap();
        assert!(cache.get(&key).is_err());

        let set = cache.get_or_encode(&encoder, &tf, EncodingStrategy::TimeAligned).unwrap();
        assert_eq!(set.strategy(), EncodingStrategy::TimeAligned);
        assert!(cache.get(&key).unwrap().is_some());
    }

    #[test]
    fn test_ignores_corrupt_index() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("index")).unwrap();
        fs::write(dir.path().join("index").join("junk.json"), "not json").unwrap();
        let cache = CoefficientCache::open(dir.path()).unwrap();
        assert!(cache.is_empty());
    }
}
