use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use palisade_common::{JwtConfig, PalisadeError, Secret};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Verified bearer-token payload. Opaque to the gate beyond the fields
/// its decision procedure needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: Uuid,
    pub username: String,
    pub roles: Vec<String>,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 mint/verify wrapper around the external JWT primitive.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl_seconds: u64,
    refresh_ttl_seconds: u64,
}

impl TokenIssuer {
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl_seconds: config.access_ttl_seconds,
            refresh_ttl_seconds: config.refresh_ttl_seconds,
        }
    }

    pub fn access_ttl_seconds(&self) -> u64 {
        self.access_ttl_seconds
    }

    pub fn mint(
        &self,
        user_id: Uuid,
        username: &str,
        roles: &[String],
        kind: TokenKind,
    ) -> Result<Secret<String>, PalisadeError> {
        self.mint_at(user_id, username, roles, kind, Utc::now())
    }

    pub fn mint_at(
        &self,
        user_id: Uuid,
        username: &str,
        roles: &[String],
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<Secret<String>, PalisadeError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl_seconds,
            TokenKind::Refresh => self.refresh_ttl_seconds,
        };
        let claims = TokenClaims {
            sub: user_id,
            username: username.to_owned(),
            roles: roles.to_vec(),
            kind,
            iat: now.timestamp(),
            exp: now.timestamp() + ttl as i64,
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(PalisadeError::other)?;
        Ok(Secret::new(token))
    }

    /// Signature and expiry verification; a token of the wrong kind is
    /// rejected the same as an invalid one so refresh tokens can never
    /// authorize API calls.
    pub fn verify(&self, token: &str, expected_kind: TokenKind) -> Option<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        let claims = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &validation)
            .ok()?
            .claims;
        if claims.kind != expected_kind {
            return None;
        }
        Some(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&JwtConfig {
            secret: Secret::new("0123456789abcdef0123456789abcdef".to_owned()),
            access_ttl_seconds: 900,
            refresh_ttl_seconds: 86400,
        })
    }

    #[test]
    fn mint_and_verify_roundtrip() {
        let issuer = issuer();
        let id = Uuid::new_v4();
        let token = issuer
            .mint(id, "alice", &["user".to_owned()], TokenKind::Access)
            .unwrap();
        let claims = issuer
            .verify(token.expose_secret(), TokenKind::Access)
            .unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.roles, vec!["user".to_owned()]);
    }

    #[test]
    fn refresh_token_rejected_as_access() {
        let issuer = issuer();
        let token = issuer
            .mint(Uuid::new_v4(), "alice", &[], TokenKind::Refresh)
            .unwrap();
        assert!(issuer
            .verify(token.expose_secret(), TokenKind::Access)
            .is_none());
        assert!(issuer
            .verify(token.expose_secret(), TokenKind::Refresh)
            .is_some());
    }

    #[test]
    fn expired_token_rejected() {
        let issuer = issuer();
        let past = Utc::now() - chrono::Duration::seconds(2000);
        let token = issuer
            .mint_at(Uuid::new_v4(), "alice", &[], TokenKind::Access, past)
            .unwrap();
        assert!(issuer
            .verify(token.expose_secret(), TokenKind::Access)
            .is_none());
    }

    #[test]
    fn tampered_token_rejected() {
        let issuer = issuer();
        let token = issuer
            .mint(Uuid::new_v4(), "alice", &[], TokenKind::Access)
            .unwrap();
        let mut tampered = token.expose_secret().clone();
        tampered.push('x');
        assert!(issuer.verify(&tampered, TokenKind::Access).is_none());
    }
}
