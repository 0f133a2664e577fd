//! Fixed-size Bloom filter used to deduplicate votes on a comment.
//!
//! The bit array is persisted verbatim in the `comments.voters` column, so the
//! probe layout is part of the storage format: probe `i` is bits
//! `[w*i, w*i + w)` of the SHA-256 digest of the key read as a big-endian
//! integer, where `w = log2(m)`. Bit `n` of the array lives in byte `n / 8` at
//! position `n % 8`.

use sha2::{Digest, Sha256};

use crate::{Error, Result};

const DIGEST_BITS: usize = 256;

// ─── Parameters ──────────────────────────────────────────────────────────────

/// Sizing of a [`BloomFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloomParams {
  /// Size of the bit array in bytes. `bytes * 8` must be a power of two.
  pub bytes:  usize,
  /// Number of probes per key.
  pub hashes: u32,
}

impl BloomParams {
  /// 2048 bits and 11 probes: a false-positive rate around 1e-3 at 142
  /// elements, the default vote cap.
  pub const DEFAULT: Self = Self { bytes: 256, hashes: 11 };

  pub fn validate(&self) -> Result<()> {
    let bits = self.bytes * 8;
    let valid = self.bytes > 0
      && bits.is_power_of_two()
      && self.hashes > 0
      && self.hashes as usize * self.probe_width() <= DIGEST_BITS;

    if valid {
      Ok(())
    } else {
      Err(Error::InvalidBloomParams { bytes: self.bytes, hashes: self.hashes })
    }
  }

  /// Number of bits in the array.
  pub fn bits(&self) -> usize { self.bytes * 8 }

  fn probe_width(&self) -> usize { self.bits().trailing_zeros() as usize }

  /// Expected false-positive rate after inserting `elements` keys.
  pub fn false_positive_rate(&self, elements: usize) -> f64 {
    let k = f64::from(self.hashes);
    let m = self.bits() as f64;
    let n = elements as f64;
    (1.0 - (-k * n / m).exp()).powf(k)
  }
}

impl Default for BloomParams {
  fn default() -> Self { Self::DEFAULT }
}

// ─── Filter ──────────────────────────────────────────────────────────────────

/// A probabilistic set of strings. Never reports a false negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
  bits:     Vec<u8>,
  params:   BloomParams,
  elements: usize,
}

impl BloomFilter {
  /// An empty filter with [`BloomParams::DEFAULT`].
  pub fn new() -> Self {
    let params = BloomParams::DEFAULT;
    Self { bits: vec![0; params.bytes], params, elements: 0 }
  }

  pub fn with_params(params: BloomParams) -> Result<Self> {
    params.validate()?;
    Ok(Self { bits: vec![0; params.bytes], params, elements: 0 })
  }

  /// A filter that already contains `key`.
  pub fn seeded(key: &str) -> Self {
    let mut filter = Self::new();
    filter.insert(key);
    filter
  }

  /// Rebuild a filter from its persisted bit array.
  ///
  /// `elements` is not stored with the array; callers pass the number of
  /// keys they know were inserted (for votes, `likes + dislikes`).
  pub fn from_bytes(bits: Vec<u8>, elements: usize) -> Result<Self> {
    let params = BloomParams::DEFAULT;
    if bits.len() != params.bytes {
      return Err(Error::InvalidBloomFilter {
        expected: params.bytes,
        actual:   bits.len(),
      });
    }
    Ok(Self { bits, params, elements })
  }

  /// Bit positions probed for `key`.
  pub fn probes(&self, key: &str) -> Vec<usize> {
    let digest = Sha256::digest(key.as_bytes());
    let width = self.params.probe_width();

    (0..self.params.hashes as usize)
      .map(|i| {
        (0..width).fold(0usize, |acc, b| {
          let n = i * width + b;
          // Bit n of the big-endian integer lives in the n/8-th byte from the end.
          let byte = digest[digest.len() - 1 - n / 8];
          acc | ((((byte >> (n % 8)) & 1) as usize) << b)
        })
      })
      .collect()
  }

  pub fn insert(&mut self, key: &str) {
    for n in self.probes(key) {
      self.bits[n / 8] |= 1 << (n % 8);
    }
    self.elements += 1;
  }

  pub fn contains(&self, key: &str) -> bool {
    self
      .probes(key)
      .into_iter()
      .all(|n| self.bits[n / 8] & (1 << (n % 8)) != 0)
  }

  /// Number of keys inserted so far.
  pub fn len(&self) -> usize { self.elements }

  pub fn is_empty(&self) -> bool { self.elements == 0 }

  /// Fraction of bits set.
  pub fn density(&self) -> f64 {
    let set: u32 = self.bits.iter().map(|b| b.count_ones()).sum();
    f64::from(set) / self.params.bits() as f64
  }

  pub fn params(&self) -> BloomParams { self.params }

  pub fn as_bytes(&self) -> &[u8] { &self.bits }

  pub fn into_bytes(self) -> Vec<u8> { self.bits }
}

impl Default for BloomFilter {
  fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn probe_layout_is_stable() {
    let filter = BloomFilter::new();
    assert_eq!(
      filter.probes("127.0.0.1"),
      vec![416, 14, 1013, 212, 896, 1670, 1177, 260, 1646, 932, 329]
    );
  }

  #[test]
  fn seeded_filter_sets_expected_bytes() {
    let filter = BloomFilter::seeded("127.0.0.1");
    let set: Vec<(usize, u8)> = filter
      .as_bytes()
      .iter()
      .enumerate()
      .filter(|(_, b)| **b != 0)
      .map(|(i, b)| (i, *b))
      .collect();

    assert_eq!(
      set,
      vec![
        (1, 64), (26, 16), (32, 16), (41, 2), (52, 1), (112, 1),
        (116, 16), (126, 32), (147, 2), (205, 64), (208, 64),
      ]
    );
    assert_eq!(filter.len(), 1);
  }

  #[test]
  fn no_false_negatives() {
    let mut filter = BloomFilter::new();
    let keys: Vec<String> = (0..142).map(|i| format!("10.0.{}.{}", i / 256, i % 256)).collect();
    for k in &keys {
      filter.insert(k);
    }
    assert!(keys.iter().all(|k| filter.contains(k)));
    assert_eq!(filter.len(), 142);
  }

  #[test]
  fn false_positive_rate_at_vote_cap_is_small() {
    let mut filter = BloomFilter::new();
    for i in 0..142 {
      filter.insert(&format!("10.0.0.{i}"));
    }

    let trials = 10_000;
    let hits = (0..trials)
      .filter(|i| filter.contains(&format!("192.168.{}.{}", i / 256, i % 256)))
      .count();

    // Theoretical rate is ~1e-3; leave generous headroom.
    assert!(hits < trials / 100, "{hits} false positives out of {trials}");
    assert!(BloomParams::DEFAULT.false_positive_rate(142) < 1e-2);
    assert!(BloomParams::DEFAULT.false_positive_rate(80) < 1e-4);
  }

  #[test]
  fn from_bytes_roundtrip_keeps_membership() {
    let filter = BloomFilter::seeded("1.2.3.4");
    let restored = BloomFilter::from_bytes(filter.clone().into_bytes(), 1).unwrap();
    assert!(restored.contains("1.2.3.4"));
    assert_eq!(restored, filter);
  }

  #[test]
  fn from_bytes_rejects_wrong_length() {
    let err = BloomFilter::from_bytes(vec![0; 12], 0).unwrap_err();
    assert!(matches!(err, Error::InvalidBloomFilter { expected: 256, actual: 12 }));
  }

  #[test]
  fn params_validation() {
    assert!(BloomParams { bytes: 64, hashes: 7 }.validate().is_ok());
    assert!(BloomParams { bytes: 100, hashes: 7 }.validate().is_err());
    assert!(BloomParams { bytes: 256, hashes: 0 }.validate().is_err());
    // 24 probes of 11 bits exceed the 256-bit digest.
    assert!(BloomParams { bytes: 256, hashes: 24 }.validate().is_err());
  }

  #[test]
  fn smaller_filter_works_with_custom_params() {
    let mut filter = BloomFilter::with_params(BloomParams { bytes: 32, hashes: 4 }).unwrap();
    filter.insert("a");
    assert!(filter.contains("a"));
    assert!(filter.density() > 0.0);
    assert_eq!(filter.as_bytes().len(), 32);
  }
}
