/// Domain-separated BLAKE3 hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so a transaction identifier can never collide with the
/// signature message computed over the same bytes.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for transaction identifiers (witnesses included).
    pub const TXID: Self = Self {
        domain: "catena-txid-v1",
    };
    /// Hasher for signature messages (witnesses stripped).
    pub const SIGHASH: Self = Self {
        domain: "catena-sighash-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        *hasher.finalize().as_bytes()
    }

    /// Verify that data produces the expected digest.
    pub fn verify(&self, data: &[u8], expected: &[u8; 32]) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
