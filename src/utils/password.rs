use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::ErrorMessage;

/// Maximum allowed password length in characters
///
/// Argon2 is deliberately slow, so unbounded input is refused before hashing.
///
/// Note: this counts characters, not bytes. A password of 64 emoji is
/// accepted even though it is several times longer in UTF-8.
const MAX_PASSWORD_LENGTH: usize = 64;

/// Minimum length accepted when an account password is set or changed
pub const MIN_PASSWORD_LENGTH: usize = 6;

fn check_length(password: &str) -> Result<(), ErrorMessage> {
    if password.is_empty() {
        return Err(ErrorMessage::EmptyPassword);
    }
    if password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(ErrorMessage::ExceededMaxPasswordLength(MAX_PASSWORD_LENGTH));
    }
    Ok(())
}

/// Hash an account password with Argon2id
///
/// **Hash format:**
/// The result is a PHC string:
/// ```text
/// $argon2id$v=19$m=19456,t=2,p=1$<salt>$<hash>
/// ```
/// - `argon2id`: algorithm variant (hybrid of Argon2d and Argon2i)
/// - `v=19`: Argon2 version 1.3
/// - `m`, `t`, `p`: memory cost in KiB, iterations, lanes
/// - `<salt>`, `<hash>`: base64 without padding
///
/// The salt and parameters travel inside the string, so `User::password`
/// needs no companion column. Two calls with the same input yield
/// different strings.
///
/// # Errors
/// - `EmptyPassword` / `ExceededMaxPasswordLength` from the length check
/// - `HashingError` if argon2 rejects its own parameters
pub fn hash(password: impl Into<String>) -> Result<String, ErrorMessage> {
    let password = password.into();
    check_length(&password)?;

    // 16 random bytes from the OS, base64-encoded into the PHC string
    let salt = SaltString::generate(&mut OsRng);

    // Argon2::default() is Argon2id v1.3 with the crate's recommended costs
    let hashed_password = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| ErrorMessage::HashingError)?
        .to_string();

    Ok(hashed_password)
}

/// Verify a password against a stored PHC string
///
/// - `Ok(true)` / `Ok(false)`: the hash parsed and the password did or did not match
/// - `Err(InvalidHashFormat)`: the stored value is not a PHC string, e.g. a
///   plain-text password carried over from an old export
pub fn compare(password: &str, hashed_password: &str) -> Result<bool, ErrorMessage> {
    check_length(password)?;

    // The stored string carries the salt and cost parameters used at hash time
    let parsed_hash =
        PasswordHash::new(hashed_password).map_err(|_| ErrorMessage::InvalidHashFormat)?;

    // verify_password re-hashes with the parsed parameters and compares in
    // constant time; any mismatch surfaces as an Err, read here as `false`
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
