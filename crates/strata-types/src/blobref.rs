use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Digest;

use crate::error::TypeError;

/// Digest length in bytes for every supported algorithm.
pub const DIGEST_LEN: usize = 32;

/// Hash function used to derive a [`BlobRef`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// BLAKE3 (the default for new blobs).
    #[default]
    Blake3,
    /// SHA-256.
    Sha256,
}

impl HashAlgorithm {
    /// Tag used in the textual form of a reference.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Blake3 => "blake3",
            Self::Sha256 => "sha256",
        }
    }

    /// Hash raw bytes with this algorithm.
    pub fn digest(&self, data: &[u8]) -> [u8; DIGEST_LEN] {
        match self {
            Self::Blake3 => *blake3::hash(data).as_bytes(),
            Self::Sha256 => sha2::Sha256::digest(data).into(),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for HashAlgorithm {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blake3" => Ok(Self::Blake3),
            "sha256" => Ok(Self::Sha256),
            other => Err(TypeError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Content address of an immutable blob.
///
/// A `BlobRef` pairs a [`HashAlgorithm`] with the digest of the blob's bytes.
/// Equality is structural: two references are equal exactly when they name
/// the same content under the same algorithm. The textual form is
/// `"<algorithm>-<lowercase hex digest>"`, e.g. `blake3-af13…`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobRef {
    algorithm: HashAlgorithm,
    digest: [u8; DIGEST_LEN],
}

impl BlobRef {
    /// Compute the reference of `data` under `algorithm`.
    pub fn compute(algorithm: HashAlgorithm, data: &[u8]) -> Self {
        Self {
            algorithm,
            digest: algorithm.digest(data),
        }
    }

    /// Compute a BLAKE3 reference of `data`.
    pub fn blake3(data: &[u8]) -> Self {
        Self::compute(HashAlgorithm::Blake3, data)
    }

    /// Create a reference from a pre-computed digest.
    pub fn from_digest(algorithm: HashAlgorithm, digest: [u8; DIGEST_LEN]) -> Self {
        Self { algorithm, digest }
    }

    /// Parse the textual form `"<algorithm>-<hex digest>"`.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let invalid = |reason: &str| TypeError::InvalidRef {
            input: s.to_string(),
            reason: reason.to_string(),
        };
        let (tag, hex_digest) = s.split_once('-').ok_or_else(|| invalid("missing '-'"))?;
        let algorithm: HashAlgorithm = tag.parse()?;
        if hex_digest.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(invalid("digest must be lowercase hex"));
        }
        let bytes = hex::decode(hex_digest).map_err(|e| invalid(&e.to_string()))?;
        if bytes.len() != DIGEST_LEN {
            return Err(TypeError::InvalidLength {
                expected: DIGEST_LEN,
                actual: bytes.len(),
            });
        }
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&bytes);
        Ok(Self { algorithm, digest })
    }

    /// The algorithm this reference was computed with.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The raw digest bytes.
    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }

    /// Hex-encoded digest without the algorithm tag.
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// Short form for log output: tag plus the first 8 hex characters.
    pub fn short(&self) -> String {
        format!("{}-{}", self.algorithm, hex::encode(&self.digest[..4]))
    }

    /// Returns `true` if `data` hashes to this reference.
    pub fn verify(&self, data: &[u8]) -> bool {
        self.algorithm.digest(data) == self.digest
    }
}

impl fmt::Debug for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobRef({})", self.short())
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.algorithm, self.digest_hex())
    }
}

impl FromStr for BlobRef {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for BlobRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BlobRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn compute_is_deterministic() {
        let r1 = BlobRef::blake3(b"hello world");
        let r2 = BlobRef::blake3(b"hello world");
        assert_eq!(r1, r2);
    }

    #[test]
    fn different_data_produces_different_refs() {
        assert_ne!(BlobRef::blake3(b"hello"), BlobRef::blake3(b"world"));
    }

    #[test]
    fn algorithms_are_distinct() {
        let a = BlobRef::compute(HashAlgorithm::Blake3, b"same");
        let b = BlobRef::compute(HashAlgorithm::Sha256, b"same");
        assert_ne!(a, b);
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn sha256_known_vector() {
        let r = BlobRef::compute(HashAlgorithm::Sha256, b"abc");
        assert_eq!(
            r.to_string(),
            "sha256-ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn display_format() {
        let r = BlobRef::blake3(b"test");
        let s = r.to_string();
        assert!(s.starts_with("blake3-"));
        assert_eq!(s.len(), "blake3-".len() + 64);
    }

    #[test]
    fn parse_roundtrip() {
        let r = BlobRef::compute(HashAlgorithm::Sha256, b"abc");
        let parsed: BlobRef = r.to_string().parse().unwrap();
        assert_eq!(r, parsed);
    }

    #[test]
    fn parse_rejects_missing_dash() {
        let err = BlobRef::parse("blake3").unwrap_err();
        assert!(matches!(err, TypeError::InvalidRef { .. }));
    }

    #[test]
    fn parse_rejects_unknown_algorithm() {
        let err = BlobRef::parse("md5-00").unwrap_err();
        assert_eq!(err, TypeError::UnknownAlgorithm("md5".into()));
    }

    #[test]
    fn parse_rejects_short_digest() {
        let err = BlobRef::parse("blake3-abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn parse_rejects_uppercase_hex() {
        let upper = BlobRef::blake3(b"x").digest_hex().to_uppercase();
        let err = BlobRef::parse(&format!("blake3-{upper}")).unwrap_err();
        assert!(matches!(err, TypeError::InvalidRef { .. }));
    }

    #[test]
    fn verify_detects_tampering() {
        let r = BlobRef::blake3(b"original");
        assert!(r.verify(b"original"));
        assert!(!r.verify(b"tampered"));
    }

    #[test]
    fn short_form() {
        let r = BlobRef::blake3(b"test");
        assert_eq!(r.short().len(), "blake3-".len() + 8);
        assert!(r.to_string().starts_with(&r.short()));
    }

    #[test]
    fn serde_as_string() {
        let r = BlobRef::blake3(b"serde test");
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, format!("\"{r}\""));
        let parsed: BlobRef = serde_json::from_str(&json).unwrap();
        assert_eq!(r, parsed);
    }

    #[test]
    fn serde_rejects_garbage() {
        assert!(serde_json::from_str::<BlobRef>("\"nope\"").is_err());
    }

    #[test]
    fn algorithm_from_str() {
        assert_eq!("blake3".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Blake3);
        assert_eq!("sha256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert!("sha1".parse::<HashAlgorithm>().is_err());
    }

    proptest! {
        #[test]
        fn display_parse_roundtrip(digest in proptest::array::uniform32(any::<u8>()), sha in any::<bool>()) {
            let alg = if sha { HashAlgorithm::Sha256 } else { HashAlgorithm::Blake3 };
            let r = BlobRef::from_digest(alg, digest);
            prop_assert_eq!(BlobRef::parse(&r.to_string()).unwrap(), r);
        }
    }
}
