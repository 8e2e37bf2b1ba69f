/// Domain-separated BLAKE3 hasher.
///
/// Each hasher carries a domain tag (e.g., `"custody-content-v1"`) that is
/// prepended to every hash computation, so a payload and a ledger reference
/// built from identical bytes never collide.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for content-store payloads.
    pub const CONTENT: Self = Self {
        domain: "custody-content-v1",
    };
    /// Hasher for contract-mediated logical anchor references.
    pub const ANCHOR_REF: Self = Self {
        domain: "custody-anchor-ref-v1",
    };
    /// Hasher for signed ledger transactions.
    pub const TRANSACTION: Self = Self {
        domain: "custody-tx-v1",
    };
    /// Hasher for deriving account addresses from public keys.
    pub const ADDRESS: Self = Self {
        domain: "custody-address-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> [u8; 32] {
        self.hash_parts(&[data])
    }

    /// Hash several byte strings as one concatenated message.
    pub fn hash_parts(&self, parts: &[&[u8]]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        for part in parts {
            hasher.update(part);
        }
        *hasher.finalize().as_bytes()
    }

    /// Hex form of [`Self::hash`].
    pub fn hash_hex(&self, data: &[u8]) -> String {
        hex::encode(self.hash(data))
    }

    /// Verify that data produces the expected hash.
    pub fn verify(&self, data: &[u8], expected: &[u8; 32]) -> bool {
        self.hash(data) == *expected
    }

    /// Raw BLAKE3 hash without domain separation (for low-level use).
    pub fn raw_hash(data: &[u8]) -> [u8; 32] {
        *blake3::hash(data).as_bytes()
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"hello world";
        assert_eq!(ContentHasher::CONTENT.hash(data), ContentHasher::CONTENT.hash(data));
    }

    #[test]
    fn different_domains_produce_different_hashes() {
        let data = b"same content";
        let content = ContentHasher::CONTENT.hash(data);
        let anchor = ContentHasher::ANCHOR_REF.hash(data);
        let tx = ContentHasher::TRANSACTION.hash(data);
        assert_ne!(content, anchor);
        assert_ne!(content, tx);
        assert_ne!(anchor, tx);
    }

    #[test]
    fn parts_hash_like_concatenation() {
        let joined = ContentHasher::ANCHOR_REF.hash(b"abcdef");
        let parts = ContentHasher::ANCHOR_REF.hash_parts(&[b"abc", b"def"]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::CONTENT.hash(b"original");
        assert!(ContentHasher::CONTENT.verify(b"original", &id));
        assert!(!ContentHasher::CONTENT.verify(b"tampered", &id));
    }

    #[test]
    fn hex_is_64_chars() {
        assert_eq!(ContentHasher::CONTENT.hash_hex(b"").len(), 64);
    }

    #[test]
    fn raw_hash_no_domain() {
        let raw = ContentHasher::raw_hash(b"test");
        assert_ne!(raw, ContentHasher::CONTENT.hash(b"test"));
    }
}
