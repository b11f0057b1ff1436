//! Confirmation code ledger: single-use, expiring tokens keyed by
//! (email, purpose).
//!
//! Codes are bearer secrets delivered out-of-band (email). Issuing a new
//! code invalidates any unused code for the same (email, purpose), and
//! redemption flips the `used` flag with an atomic conditional update so
//! concurrent redeems cannot both succeed.

use rand::Rng;
use sqlx::SqlitePool;

use crate::db::{CodePurpose, ConfirmationCode};

/// Fixed code length. Codes travel both in links and through manual
/// entry; 32 alphanumeric characters is the single policy for all
/// shipped purposes.
pub const CODE_LENGTH: usize = 32;

/// Default validity window.
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Character set for generated codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alphabet {
    /// Case-sensitive [A-Za-z0-9]
    Alphanumeric,
    /// [0-9], for contexts where a code must be typed on a keypad
    Digits,
}

impl Alphabet {
    fn chars(&self) -> &'static [u8] {
        match self {
            Alphabet::Alphanumeric => {
                b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789"
            }
            Alphabet::Digits => b"0123456789",
        }
    }
}

/// Generate a random code of the given length. ThreadRng is a CSPRNG.
pub fn generate_code(length: usize, alphabet: Alphabet) -> String {
    let chars = alphabet.chars();
    let mut rng = rand::rng();
    (0..length)
        .map(|_| chars[rng.random_range(0..chars.len())] as char)
        .collect()
}

/// Issue a confirmation code for (email, purpose).
///
/// Any unused code for the same pair is removed first, so at most one
/// unused code exists per pair at any time. Returns the stored record,
/// which carries the plaintext code for out-of-band delivery.
pub async fn issue(
    pool: &SqlitePool,
    email: &str,
    purpose: CodePurpose,
    ttl_hours: i64,
) -> Result<ConfirmationCode, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM confirmation_codes WHERE email = ? AND purpose = ? AND used = 0")
        .bind(email)
        .bind(purpose.as_str())
        .execute(&mut *tx)
        .await?;

    let now = chrono::Utc::now();
    let record = ConfirmationCode {
        id: uuid::Uuid::new_v4().to_string(),
        code: generate_code(CODE_LENGTH, Alphabet::Alphanumeric),
        email: email.to_string(),
        purpose: purpose.as_str().to_string(),
        used: false,
        used_at: None,
        created_at: now.to_rfc3339(),
        expires_at: (now + chrono::Duration::hours(ttl_hours)).to_rfc3339(),
    };

    sqlx::query(
        "INSERT INTO confirmation_codes (id, code, email, purpose, used, created_at, expires_at) \
         VALUES (?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(&record.id)
    .bind(&record.code)
    .bind(&record.email)
    .bind(&record.purpose)
    .bind(&record.created_at)
    .bind(&record.expires_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(email = %email, purpose = %purpose, "Issued confirmation code");
    Ok(record)
}

/// Redeem a code for (email, purpose).
///
/// Returns the record on success, or None when no matching unused,
/// unexpired code exists. The `used` flip is a single conditional
/// UPDATE: of two concurrent redeems, exactly one sees a row change.
pub async fn redeem(
    pool: &SqlitePool,
    email: &str,
    code: &str,
    purpose: CodePurpose,
) -> Result<Option<ConfirmationCode>, sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        "UPDATE confirmation_codes SET used = 1, used_at = ? \
         WHERE email = ? AND code = ? AND purpose = ? AND used = 0 AND expires_at > ?",
    )
    .bind(&now)
    .bind(email)
    .bind(code)
    .bind(purpose.as_str())
    .bind(&now)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        tracing::info!(email = %email, purpose = %purpose, "Confirmation code rejected");
        return Ok(None);
    }

    let record: ConfirmationCode = sqlx::query_as(
        "SELECT * FROM confirmation_codes \
         WHERE email = ? AND code = ? AND purpose = ? AND used = 1",
    )
    .bind(email)
    .bind(code)
    .bind(purpose.as_str())
    .fetch_one(pool)
    .await?;

    tracing::info!(email = %email, purpose = %purpose, "Confirmation code redeemed");
    Ok(Some(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_in_memory;

    #[test]
    fn generated_codes_match_alphabet_and_length() {
        let code = generate_code(CODE_LENGTH, Alphabet::Alphanumeric);
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));

        let numeric = generate_code(6, Alphabet::Digits);
        assert_eq!(numeric.len(), 6);
        assert!(numeric.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn redeem_succeeds_once_then_fails() {
        let pool = init_in_memory().await.unwrap();
        let issued = issue(&pool, "a@example.se", CodePurpose::EmailVerification, 24)
            .await
            .unwrap();

        let first = redeem(&pool, "a@example.se", &issued.code, CodePurpose::EmailVerification)
            .await
            .unwrap();
        assert!(first.is_some());
        assert!(first.unwrap().used);

        // Second redemption of the same code fails
        let second = redeem(&pool, "a@example.se", &issued.code, CodePurpose::EmailVerification)
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn reissue_invalidates_previous_code() {
        let pool = init_in_memory().await.unwrap();
        let first = issue(&pool, "a@example.se", CodePurpose::PasswordReset, 24)
            .await
            .unwrap();
        let second = issue(&pool, "a@example.se", CodePurpose::PasswordReset, 24)
            .await
            .unwrap();

        assert!(
            redeem(&pool, "a@example.se", &first.code, CodePurpose::PasswordReset)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            redeem(&pool, "a@example.se", &second.code, CodePurpose::PasswordReset)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn purposes_are_isolated() {
        let pool = init_in_memory().await.unwrap();
        let reset = issue(&pool, "a@example.se", CodePurpose::PasswordReset, 24)
            .await
            .unwrap();

        // A password-reset code must never verify an email
        assert!(
            redeem(&pool, "a@example.se", &reset.code, CodePurpose::EmailVerification)
                .await
                .unwrap()
                .is_none()
        );
        // Issuing for one purpose leaves the other purpose's codes alone
        let verify = issue(&pool, "a@example.se", CodePurpose::EmailVerification, 24)
            .await
            .unwrap();
        assert!(
            redeem(&pool, "a@example.se", &reset.code, CodePurpose::PasswordReset)
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            redeem(&pool, "a@example.se", &verify.code, CodePurpose::EmailVerification)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn expired_code_is_rejected() {
        let pool = init_in_memory().await.unwrap();
        let issued = issue(&pool, "a@example.se", CodePurpose::UserRegistration, -1)
            .await
            .unwrap();

        assert!(
            redeem(&pool, "a@example.se", &issued.code, CodePurpose::UserRegistration)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn wrong_email_is_rejected() {
        let pool = init_in_memory().await.unwrap();
        let issued = issue(&pool, "a@example.se", CodePurpose::EmailVerification, 24)
            .await
            .unwrap();
        assert!(
            redeem(&pool, "b@example.se", &issued.code, CodePurpose::EmailVerification)
                .await
                .unwrap()
                .is_none()
        );
    }
}
