//! Object key derivation for uploads.

use crate::models::object::ObjectKey;

/// Maps an upload's filename to its object key.
///
/// The key is the MD5 hex digest of `filename ++ disambiguator`. The
/// disambiguator is fixed for the life of the deriver (the process id in
/// production), so the same filename always yields the same key within one
/// process and a later upload overwrites an earlier one.
#[derive(Clone, Debug)]
pub struct KeyDeriver {
    disambiguator: String,
}

impl KeyDeriver {
    /// Deriver keyed on the current process id.
    pub fn from_process() -> Self {
        Self::with_disambiguator(std::process::id().to_string())
    }

    pub fn with_disambiguator(disambiguator: impl Into<String>) -> Self {
        Self {
            disambiguator: disambiguator.into(),
        }
    }

    pub fn disambiguator(&self) -> &str {
        &self.disambiguator
    }

    /// Derive the key for `filename`. Every input is accepted, including "".
    pub fn derive(&self, filename: &str) -> ObjectKey {
        let mut ctx = md5::Context::new();
        ctx.consume(filename.as_bytes());
        ctx.consume(self.disambiguator.as_bytes());
        ObjectKey::new(format!("{:x}", ctx.compute()))
    }
}
