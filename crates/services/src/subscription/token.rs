//! Subscription token generation and validation.
//!
//! Format: `NFX-<code>-<number>-<profile>`, where `<code>` is four symbols from
//! [`TOKEN_ALPHABET`] and `<number>` is four decimal digits.

use rand::{rngs::StdRng, Rng, SeedableRng};

use super::ports::{ClientRepository, SubscriptionError};

pub const TOKEN_PREFIX: &str = "NFX";

/// 32 symbols; `0`/`O` and `1`/`I` are left out so tokens read back unambiguously
pub const TOKEN_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const TOKEN_CODE_LEN: usize = 4;

/// Upper bound on regeneration after collisions with existing tokens
pub const MAX_TOKEN_ATTEMPTS: u32 = 1000;

/// Borrowed view of a well-formed token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenParts<'a> {
    pub code: &'a str,
    pub number: u16,
    pub profile: &'a str,
}

/// Build one random candidate; does not check the store
pub fn generate_candidate<R: Rng + ?Sized>(profile: &str, rng: &mut R) -> String {
    let code: String = (0..TOKEN_CODE_LEN)
        .map(|_| TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())] as char)
        .collect();
    let number: u16 = rng.random_range(1000..=9999);
    format!("{TOKEN_PREFIX}-{code}-{number}-{profile}")
}

/// Generate a token that the store has never issued
pub async fn generate_unique_token(
    repo: &dyn ClientRepository,
    profile: &str,
) -> Result<String, SubscriptionError> {
    let mut rng = StdRng::from_rng(&mut rand::rng());
    generate_unique_token_with(repo, profile, MAX_TOKEN_ATTEMPTS, &mut rng).await
}

pub async fn generate_unique_token_with<R: Rng + Send>(
    repo: &dyn ClientRepository,
    profile: &str,
    max_attempts: u32,
    rng: &mut R,
) -> Result<String, SubscriptionError> {
    for attempt in 1..=max_attempts {
        let candidate = generate_candidate(profile, rng);
        if !repo.exists(&candidate).await? {
            return Ok(candidate);
        }
        tracing::debug!(
            "Token collision on attempt {}/{}: {}",
            attempt,
            max_attempts,
            candidate
        );
    }

    tracing::error!(
        "Token space exhausted for profile={} after {} attempts",
        profile,
        max_attempts
    );
    Err(SubscriptionError::TokenSpaceExhausted {
        attempts: max_attempts,
    })
}

/// Split a token into its parts, or `None` if it does not follow the format
pub fn parse_token(token: &str) -> Option<TokenParts<'_>> {
    let mut parts = token.splitn(4, '-');
    let prefix = parts.next()?;
    let code = parts.next()?;
    let number = parts.next()?;
    let profile = parts.next()?;

    if prefix != TOKEN_PREFIX || profile.is_empty() {
        return None;
    }
    if code.len() != TOKEN_CODE_LEN
        || !code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    {
        return None;
    }
    if number.len() != 4 || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some(TokenParts {
        code,
        number: number.parse().ok()?,
        profile,
    })
}
