// Users and personal access tokens.
//
// Passwords are stored as Argon2id PHC strings. The bearer credential handed
// to clients is "{token_id}|{secret}"; only a SHA-256 digest of the secret is
// stored.

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use chrono::Utc;
use log::debug;
use rand::Rng;
use rand::distr::Alphanumeric;
use sha2::{Digest, Sha256};

use crate::catalog::entities::{NewUser, User};
use crate::catalog::errors::{Error, Result};
use crate::catalog::local_storage::{LocalStorage, Table};

const TOKEN_SECRET_LEN: usize = 40;

/// An authenticated request's identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Token owner
    pub user: User,
    /// Identity of the token used, for revocation
    pub token_id: i64,
}

fn token_digest(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
        .map_err(|e| Error::PasswordHashError(e.to_string()))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::PasswordHashError(e.to_string()))?;
    Ok(hash.to_string())
}

fn verify_password(stored: &str, password: &str) -> bool {
    PasswordHash::new(stored).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

impl LocalStorage {
    pub async fn register_user(&self, user: &NewUser) -> Result<User> {
        let query = format!(
            "INSERT INTO {} (name, email, password_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4) RETURNING *;",
            Table::Users.as_str()
        );
        let created = sqlx::query_as::<_, User>(&query)
            .bind(&user.name)
            .bind(&user.email)
            .bind(hash_password(&user.password)?)
            .bind(Utc::now())
            .fetch_one(self.pool())
            .await?;
        debug!("Registered user {}", created.id);
        Ok(created)
    }

    pub async fn email_taken(&self, email: &str) -> Result<bool> {
        let query = format!("SELECT 1 FROM {} WHERE email = ?1 LIMIT 1;", Table::Users.as_str());
        let found: Option<(i64,)> = sqlx::query_as(&query)
            .bind(email)
            .fetch_optional(self.pool())
            .await?;
        Ok(found.is_some())
    }

    /// The user owning these credentials, if they match.
    pub async fn attempt(&self, email: &str, password: &str) -> Result<Option<User>> {
        let query = format!("SELECT * FROM {} WHERE email = ?1;", Table::Users.as_str());
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(self.pool())
            .await?;

        Ok(user.filter(|u| verify_password(&u.password_hash, password)))
    }

    /// Issue a fresh bearer token for `user`; the plaintext is only available here.
    pub async fn issue_token(&self, user: &User, name: &str) -> Result<String> {
        let secret: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_SECRET_LEN)
            .map(char::from)
            .collect();
        let query = format!(
            "INSERT INTO {} (user_id, name, token_hash, created_at) VALUES (?1, ?2, ?3, ?4) RETURNING id;",
            Table::PersonalAccessTokens.as_str()
        );
        let (token_id,): (i64,) = sqlx::query_as(&query)
            .bind(user.id)
            .bind(name)
            .bind(token_digest(&secret))
            .bind(Utc::now())
            .fetch_one(self.pool())
            .await?;
        debug!("Issued token {token_id} for user {}", user.id);
        Ok(format!("{token_id}|{secret}"))
    }

    /// Resolve a bearer credential. Unknown, revoked or malformed tokens are `None`.
    pub async fn authenticate(&self, bearer: &str) -> Result<Option<Session>> {
        let Some((id, secret)) = bearer.split_once('|') else {
            return Ok(None);
        };
        let Ok(token_id) = id.parse::<i64>() else {
            return Ok(None);
        };

        let query = format!(
            "SELECT user_id, token_hash FROM {} WHERE id = ?1;",
            Table::PersonalAccessTokens.as_str()
        );
        let row: Option<(i64, String)> = sqlx::query_as(&query)
            .bind(token_id)
            .fetch_optional(self.pool())
            .await?;
        let Some((user_id, token_hash)) = row else {
            return Ok(None);
        };
        if token_digest(secret) != token_hash {
            return Ok(None);
        }

        let touch = format!(
            "UPDATE {} SET last_used_at = ?1 WHERE id = ?2;",
            Table::PersonalAccessTokens.as_str()
        );
        sqlx::query(&touch)
            .bind(Utc::now())
            .bind(token_id)
            .execute(self.pool())
            .await?;

        let query = format!("SELECT * FROM {} WHERE id = ?1;", Table::Users.as_str());
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(user.map(|user| Session { user, token_id }))
    }

    pub async fn revoke_token(&self, token_id: i64) -> Result<bool> {
        let query = format!(
            "DELETE FROM {} WHERE id = ?1;",
            Table::PersonalAccessTokens.as_str()
        );
        let result = sqlx::query(&query)
            .bind(token_id)
            .execute(self.pool())
            .await?;
        debug!("Revoked token {token_id}");
        Ok(result.rows_affected() > 0)
    }
}
