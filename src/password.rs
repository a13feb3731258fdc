use argon2::{
    Algorithm, Argon2, Params, PasswordHasher, Version,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use password_hash::rand_core::OsRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCheck {
    Valid { needs_rehash: bool },
    Invalid,
    /// Stored value is not an argon2 PHC string.
    Unsupported,
}

/// Current-parameter argon2id hash that no password matches. Verifying
/// against it costs the same as checking a real account.
const DECOY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Spend one full verification when there is no usable stored hash.
pub fn verify_decoy(password: &str) {
    let _ = verify_password(password, DECOY_HASH);
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, stored: &str) -> PasswordCheck {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return PasswordCheck::Unsupported;
    };
    if Algorithm::try_from(parsed.algorithm).is_err() {
        return PasswordCheck::Unsupported;
    }

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => PasswordCheck::Valid {
            needs_rehash: is_outdated(&parsed),
        },
        Err(_) => PasswordCheck::Invalid,
    }
}

fn is_outdated(hash: &PasswordHash<'_>) -> bool {
    if hash.algorithm != Algorithm::Argon2id.ident() || hash.version != Some(Version::V0x13 as u32) {
        return true;
    }
    // output length is recorded in parsed params, so compare costs only
    let current = Params::default();
    match Params::try_from(hash) {
        Ok(params) => {
            params.m_cost() != current.m_cost()
                || params.t_cost() != current.t_cost()
                || params.p_cost() != current.p_cost()
        }
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_with(algorithm: Algorithm, params: Params, password: &str) -> String {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::new(algorithm, Version::V0x13, params)
            .hash_password(password.as_bytes(), &salt)
            .unwrap()
            .to_string()
    }

    #[test]
    fn fresh_hash_verifies_without_rehash() {
        let hash = hash_password("s3cret").unwrap();
        assert_eq!(
            verify_password("s3cret", &hash),
            PasswordCheck::Valid { needs_rehash: false }
        );
        assert_eq!(verify_password("wrong", &hash), PasswordCheck::Invalid);
    }

    #[test]
    fn argon2i_hash_is_flagged_for_rehash() {
        let hash = hash_with(Algorithm::Argon2i, Params::default(), "pw");
        assert_eq!(
            verify_password("pw", &hash),
            PasswordCheck::Valid { needs_rehash: true }
        );
    }

    #[test]
    fn weak_parameters_are_flagged_for_rehash() {
        let params = Params::new(8, 1, 1, None).unwrap();
        let hash = hash_with(Algorithm::Argon2id, params, "pw");
        assert_eq!(
            verify_password("pw", &hash),
            PasswordCheck::Valid { needs_rehash: true }
        );
    }

    #[test]
    fn legacy_formats_are_unsupported() {
        assert_eq!(
            verify_password("password", "5f4dcc3b5aa765d61d8327deb882cf99"),
            PasswordCheck::Unsupported
        );
        assert_eq!(verify_password("password", "password"), PasswordCheck::Unsupported);
    }

    #[test]
    fn decoy_hash_runs_a_full_verification() {
        let parsed = PasswordHash::new(DECOY_HASH).unwrap();
        let params = Params::try_from(&parsed).unwrap();
        let current = Params::default();
        assert_eq!(parsed.algorithm, Algorithm::Argon2id.ident());
        assert_eq!(
            (params.m_cost(), params.t_cost(), params.p_cost()),
            (current.m_cost(), current.t_cost(), current.p_cost())
        );
        assert_eq!(verify_password("anything", DECOY_HASH), PasswordCheck::Invalid);
    }
}
