use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use sha2::Sha512;

/// Hash algorithms published by the supported pack sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha1,
    Sha512,
    Md5,
}

impl HashAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha512 => "SHA-512",
            HashAlgorithm::Md5 => "MD5",
        }
    }

    /// Lowercase hex digest of `bytes`.
    pub fn digest(self, bytes: &[u8]) -> String {
        match self {
            HashAlgorithm::Sha1 => hex::encode(Sha1::digest(bytes)),
            HashAlgorithm::Sha512 => hex::encode(Sha512::digest(bytes)),
            HashAlgorithm::Md5 => hex::encode(Md5::digest(bytes)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedHash {
    pub algorithm: HashAlgorithm,
    pub value: String,
}

impl ExpectedHash {
    pub fn new(algorithm: HashAlgorithm, value: impl Into<String>) -> Self {
        Self {
            algorithm,
            value: value.into().to_ascii_lowercase(),
        }
    }

    pub fn matches(&self, bytes: &[u8]) -> Result<(), String> {
        let actual = self.algorithm.digest(bytes);
        if actual == self.value {
            Ok(())
        } else {
            Err(actual)
        }
    }
}

/// A concrete downloadable artifact produced by a resolver.
///
/// `download_url` is absent for artifacts the distributor does not allow to
/// be fetched automatically; those are reported for manual download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedArtifact {
    pub id: String,
    pub display_name: String,
    pub file_name: String,
    pub download_url: Option<String>,
    pub hash: Option<ExpectedHash>,
}

impl std::fmt::Display for ResolvedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.display_name, self.id, self.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digests() {
        assert_eq!(
            HashAlgorithm::Sha1.digest(b"abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            HashAlgorithm::Md5.digest(b"abc"),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert!(HashAlgorithm::Sha512.digest(b"abc").starts_with("ddaf35a193617aba"));
    }

    #[test]
    fn expected_hash_is_case_insensitive() {
        let expected = ExpectedHash::new(
            HashAlgorithm::Sha1,
            "A9993E364706816ABA3E25717850C26C9CD0D89D",
        );
        assert!(expected.matches(b"abc").is_ok());
        assert!(expected.matches(b"abd").is_err());
    }
}
