/// One-way credential hashing. Stores only ever see the output of `hash`.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, raw: &str) -> Result<String, HashError>;

    /// Password check for the external login collaborator.
    fn verify(&self, raw: &str, hash: &str) -> Result<bool, HashError>;
}

#[derive(Debug, thiserror::Error)]
#[error("Credential hashing failed: {0}")]
pub struct HashError(#[from] bcrypt::BcryptError);

pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl CredentialHasher for BcryptHasher {
    fn hash(&self, raw: &str) -> Result<String, HashError> {
        Ok(bcrypt::hash(raw, self.cost)?)
    }

    fn verify(&self, raw: &str, hash: &str) -> Result<bool, HashError> {
        Ok(bcrypt::verify(raw, hash)?)
    }
}
