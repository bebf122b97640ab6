use tracing::{error, warn};

/// Hash a plaintext password with bcrypt. The cost factor comes from config
/// (default 12); bcrypt salts internally, so equal inputs produce distinct
/// hashes.
pub fn hash_password(plain: &str, cost: u32) -> anyhow::Result<String> {
    bcrypt::hash(plain, cost).map_err(|e| {
        error!(error = %e, "bcrypt hash error");
        anyhow::anyhow!(e.to_string())
    })
}

/// Verify a plaintext password against a stored hash. A wrong password and
/// an unparseable hash both come back `false`; callers must not be able to
/// tell them apart.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    match bcrypt::verify(plain, hash) {
        Ok(ok) => ok,
        Err(e) => {
            warn!(error = %e, "unverifiable password hash");
            false
        }
    }
}
