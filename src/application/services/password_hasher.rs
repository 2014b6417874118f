use rand::Rng;
use sha2::Sha256;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

pub const DEFAULT_PASSWORD_ITERATIONS: u32 = 600_000;

/// Salted PBKDF2-HMAC-SHA256 hashes encoded as
/// `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>`.
///
/// Verification reads the iteration count from the stored hash, so raising
/// `iterations` only affects newly hashed passwords.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    iterations: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_PASSWORD_ITERATIONS)
    }
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn hash(&self, password: &str) -> String {
        let salt: [u8; SALT_LEN] = rand::rng().random();
        let digest = derive(password, &salt, self.iterations);
        format!(
            "{}${}${}${}",
            SCHEME,
            self.iterations,
            hex::encode(salt),
            hex::encode(digest)
        )
    }

    /// False for a wrong password and for anything that is not a hash this
    /// type produced.
    pub fn verify(&self, password: &str, encoded: &str) -> bool {
        let Some(stored) = EncodedHash::parse(encoded) else {
            return false;
        };
        let digest = derive(password, &stored.salt, stored.iterations);

        // Compare every byte regardless of where the first difference is.
        stored.hash.len() == digest.len()
            && stored
                .hash
                .iter()
                .zip(digest.iter())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }

    pub fn is_well_formed(encoded: &str) -> bool {
        EncodedHash::parse(encoded).is_some()
    }
}

struct EncodedHash {
    iterations: u32,
    salt: Vec<u8>,
    hash: Vec<u8>,
}

impl EncodedHash {
    fn parse(encoded: &str) -> Option<Self> {
        let mut parts = encoded.split('$');
        if parts.next()? != SCHEME {
            return None;
        }
        let iterations: u32 = parts.next()?.parse().ok().filter(|n| *n > 0)?;
        let salt = hex::decode(parts.next()?).ok()?;
        let hash = hex::decode(parts.next()?).ok()?;
        if parts.next().is_some() || salt.is_empty() || hash.len() != HASH_LEN {
            return None;
        }

        Some(Self {
            iterations,
            salt,
            hash,
        })
    }
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}
