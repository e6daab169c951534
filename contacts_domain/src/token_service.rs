use crate::error::AuthError;
use crate::models::{TokenClaims, TokenScope};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, warn};

pub struct TokenConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub email_ttl: Duration,
}

impl TokenConfig {
    /// Config with the default lifetimes: access 15 minutes, refresh and
    /// email confirmation 7 days.
    pub fn new(secret: String, algorithm: Algorithm) -> Self {
        Self {
            secret,
            algorithm,
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
            email_ttl: Duration::days(7),
        }
    }
}

/// Token service for creating and validating scoped tokens
pub trait TokenService: Send + Sync {
    fn issue(&self, subject: &str, scope: TokenScope, ttl: Duration) -> Result<String, AuthError>;

    /// Returns the subject if the signature is good, the token has not
    /// expired and its scope is `expected_scope`.
    fn validate(&self, token: &str, expected_scope: TokenScope) -> Result<String, AuthError>;

    fn default_ttl(&self, scope: TokenScope) -> Duration;

    fn create_access_token(&self, subject: &str) -> Result<String, AuthError> {
        self.issue(subject, TokenScope::Access, self.default_ttl(TokenScope::Access))
    }

    fn create_refresh_token(&self, subject: &str) -> Result<String, AuthError> {
        self.issue(subject, TokenScope::Refresh, self.default_ttl(TokenScope::Refresh))
    }

    fn create_email_token(&self, subject: &str) -> Result<String, AuthError> {
        self.issue(subject, TokenScope::Email, self.default_ttl(TokenScope::Email))
    }
}

pub struct JwtTokenService {
    config: TokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtTokenService {
    pub fn new(config: TokenConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    fn encode(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        encode(&Header::new(self.config.algorithm), claims, &self.encoding_key)
            .map_err(|_| AuthError::TokenCreationError)
    }

    /// Decode and check signature and expiry. Scope is checked by the caller.
    pub fn decode_claims(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::new(self.config.algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|token_data| token_data.claims)
            .map_err(|e| {
                debug!("Token rejected: {}", e);
                AuthError::InvalidToken
            })?;

        // the library accepts exp == now, we do not
        if claims.exp <= Utc::now().timestamp() {
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }
}

impl TokenService for JwtTokenService {
    fn issue(&self, subject: &str, scope: TokenScope, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let expiry = now
            .checked_add_signed(ttl)
            .ok_or(AuthError::TokenCreationError)?;

        let claims = TokenClaims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expiry.timestamp(),
            scope,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        self.encode(&claims)
    }

    fn validate(&self, token: &str, expected_scope: TokenScope) -> Result<String, AuthError> {
        let claims = self.decode_claims(token)?;

        if claims.scope != expected_scope {
            warn!(
                "Token with scope {} presented where {} is required",
                claims.scope, expected_scope
            );
            return Err(AuthError::InvalidToken);
        }

        Ok(claims.sub)
    }

    fn default_ttl(&self, scope: TokenScope) -> Duration {
        match scope {
            TokenScope::Access => self.config.access_ttl,
            TokenScope::Refresh => self.config.refresh_ttl,
            TokenScope::Email => self.config.email_ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    fn service(secret: &str) -> JwtTokenService {
        JwtTokenService::new(TokenConfig::new(secret.to_owned(), Algorithm::HS256))
    }

    #[test]
    fn test_issue_and_validate_each_scope() {
        let tokens = service("secret");
        for scope in [TokenScope::Access, TokenScope::Refresh, TokenScope::Email] {
            let token = tokens
                .issue("a@x.com", scope, tokens.default_ttl(scope))
                .unwrap();
            assert_eq!(tokens.validate(&token, scope).unwrap(), "a@x.com");
        }
    }

    #[test]
    fn test_scope_mismatch_is_rejected() {
        let tokens = service("secret");
        let access = tokens.create_access_token("a@x.com").unwrap();
        let refresh = tokens.create_refresh_token("a@x.com").unwrap();

        assert!(matches!(
            tokens.validate(&access, TokenScope::Refresh),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            tokens.validate(&refresh, TokenScope::Access),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            tokens.validate(&access, TokenScope::Email),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let tokens = service("secret");
        let token = tokens
            .issue("a@x.com", TokenScope::Access, Duration::seconds(-5))
            .unwrap();
        assert!(matches!(
            tokens.validate(&token, TokenScope::Access),
            Err(AuthError::InvalidToken)
        ));

        let now = tokens
            .issue("a@x.com", TokenScope::Access, Duration::zero())
            .unwrap();
        assert!(tokens.validate(&now, TokenScope::Access).is_err());
    }

    #[test]
    fn test_foreign_signature_is_rejected() {
        let token = service("secret1").create_access_token("a@x.com").unwrap();
        assert!(service("secret2")
            .validate(&token, TokenScope::Access)
            .is_err());
        assert!(service("secret1")
            .validate("invalid.token.here", TokenScope::Access)
            .is_err());
    }

    #[test]
    fn test_missing_expiry_is_rejected() {
        #[derive(Serialize)]
        struct NoExpiry<'a> {
            sub: &'a str,
            iat: i64,
            scope: TokenScope,
            jti: &'a str,
        }

        let claims = NoExpiry {
            sub: "a@x.com",
            iat: Utc::now().timestamp(),
            scope: TokenScope::Access,
            jti: "jti",
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert!(service("secret")
            .validate(&token, TokenScope::Access)
            .is_err());
    }

    #[test]
    fn test_tokens_are_unique_within_a_second() {
        let tokens = service("secret");
        let first = tokens.create_access_token("a@x.com").unwrap();
        let second = tokens.create_access_token("a@x.com").unwrap();
        assert_ne!(first, second);

        let claims = tokens.decode_claims(&first).unwrap();
        assert_eq!(claims.scope, TokenScope::Access);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }
}
