use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use dico_types::{Player, PlayerId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Player id
    pub username: String,
    #[serde(default)]
    pub karma: i32,
    pub exp: u64,
    pub iss: Option<String>,
}

enum AuthMode {
    Jwt {
        key: DecodingKey,
        validation: Validation,
    },
    /// Accepts `id:username[:karma]` without any signature.
    Dev,
}

/// Turns bearer tokens into players.
pub struct AuthService {
    mode: AuthMode,
}

impl AuthService {
    pub fn new(secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            mode: AuthMode::Jwt {
                key: DecodingKey::from_secret(secret.as_bytes()),
                validation,
            },
        }
    }

    pub fn new_dev_mode() -> Self {
        Self { mode: AuthMode::Dev }
    }

    pub fn is_dev_mode(&self) -> bool {
        matches!(self.mode, AuthMode::Dev)
    }

    pub async fn validate_token(&self, token: &str) -> Result<Player, AuthError> {
        let token = token.trim();
        let token = token.strip_prefix("Bearer ").unwrap_or(token);

        match &self.mode {
            AuthMode::Dev => Self::validate_dev_token(token),
            AuthMode::Jwt { key, validation } => {
                let token_data = decode::<Claims>(token, key, validation).map_err(|e| {
                    tracing::warn!("JWT validation failed: {:?}", e);
                    match e.kind() {
                        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                        ErrorKind::InvalidIssuer => AuthError::IssuerMismatch,
                        _ => AuthError::InvalidToken,
                    }
                })?;

                let claims = token_data.claims;
                let id: PlayerId = claims.sub.parse().map_err(|_| AuthError::InvalidSubject)?;

                Ok(Player {
                    id,
                    username: claims.username,
                    karma: claims.karma,
                })
            }
        }
    }

    fn validate_dev_token(token: &str) -> Result<Player, AuthError> {
        let parts: Vec<&str> = token.split(':').collect();
        if !(2..=3).contains(&parts.len()) || parts[1].trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }

        let id: PlayerId = parts[0].parse().map_err(|_| AuthError::InvalidSubject)?;
        let karma = match parts.get(2) {
            Some(karma) => karma.trim().parse().map_err(|_| AuthError::InvalidToken)?,
            None => 0,
        };

        tracing::debug!("Accepted dev token for {}", id);
        Ok(Player {
            id,
            username: parts[1].trim().to_string(),
            karma,
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Issuer mismatch")]
    IssuerMismatch,
    #[error("Token subject is not a player id")]
    InvalidSubject,
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn issue(secret: &str, claims: &Claims) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(sub: &str, iss: Option<&str>, exp: u64) -> Claims {
        Claims {
            sub: sub.to_string(),
            username: "alice".to_string(),
            karma: 12,
            exp,
            iss: iss.map(str::to_string),
        }
    }

    fn in_an_hour() -> u64 {
        (chrono::Utc::now().timestamp() + 3600) as u64
    }

    #[tokio::test]
    async fn test_valid_jwt() {
        let auth_service = AuthService::new("secret", Some("dico"));
        let id = PlayerId::new();
        let token = issue("secret", &claims(&id.to_string(), Some("dico"), in_an_hour()));

        let player = auth_service
            .validate_token(&format!("Bearer {}", token))
            .await
            .unwrap();
        assert_eq!(player.id, id);
        assert_eq!(player.username, "alice");
        assert_eq!(player.karma, 12);
    }

    #[tokio::test]
    async fn test_jwt_failures() {
        let auth_service = AuthService::new("secret", Some("dico"));
        let id = PlayerId::new().to_string();

        let wrong_key = issue("other", &claims(&id, Some("dico"), in_an_hour()));
        assert_eq!(
            auth_service.validate_token(&wrong_key).await,
            Err(AuthError::InvalidToken)
        );

        let wrong_issuer = issue("secret", &claims(&id, Some("elsewhere"), in_an_hour()));
        assert_eq!(
            auth_service.validate_token(&wrong_issuer).await,
            Err(AuthError::IssuerMismatch)
        );

        let expired = issue("secret", &claims(&id, Some("dico"), 1_000));
        assert_eq!(
            auth_service.validate_token(&expired).await,
            Err(AuthError::TokenExpired)
        );

        let bad_subject = issue("secret", &claims("someone", Some("dico"), in_an_hour()));
        assert_eq!(
            auth_service.validate_token(&bad_subject).await,
            Err(AuthError::InvalidSubject)
        );

        assert_eq!(
            auth_service.validate_token("invalid-token").await,
            Err(AuthError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn test_dev_tokens() {
        let auth_service = AuthService::new_dev_mode();
        let id = PlayerId::new();

        let player = auth_service
            .validate_token(&format!("{}:bob", id))
            .await
            .unwrap();
        assert_eq!(player.id, id);
        assert_eq!(player.username, "bob");
        assert_eq!(player.karma, 0);

        let player = auth_service
            .validate_token(&format!("{}:bob:7", id))
            .await
            .unwrap();
        assert_eq!(player.karma, 7);

        assert!(auth_service.validate_token("bob").await.is_err());
        assert!(auth_service.validate_token("not-a-uuid:bob").await.is_err());
        assert!(auth_service.validate_token(&format!("{}:", id)).await.is_err());
    }
}
