//! JWT 认证模块
//!
//! 提供 JWT token 生成、验证，以及从请求中提取已认证用户

use application::{AuthError, IdentityVerifier};
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use config::JwtConfig;
use domain::UserId;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, state::AppState};

/// JWT Claims 结构
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub exp: i64, // 过期时间 (Unix timestamp)
}

/// JWT Token 服务
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_ref());
        let decoding_key = DecodingKey::from_secret(config.secret.as_ref());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// 生成 JWT token
    pub fn generate_token(&self, user_id: UserId) -> Result<String, jsonwebtoken::errors::Error> {
        let exp = chrono::Utc::now() + chrono::Duration::hours(self.config.expiration_hours);

        let claims = Claims {
            id: user_id.get(),
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
    }

    /// 验证并解析 JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|token_data| token_data.claims)
            .map_err(|err| AuthError::invalid(err.to_string()))
    }
}

#[async_trait]
impl IdentityVerifier for JwtService {
    async fn verify(&self, credential: &str) -> Result<UserId, AuthError> {
        let claims = self.verify_token(credential)?;
        Ok(UserId::new(claims.id))
    }
}

/// 从 `Authorization: Bearer <token>` 取出凭证
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(header) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = header
        .to_str()
        .map_err(|_| AuthError::invalid("authorization header is not valid ascii"))?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::invalid("invalid authorization header format"))?;
    Ok(Some(token))
}

/// 已认证的调用方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?.ok_or(AuthError::Unauthenticated)?;
        let user_id = state.identity.verify(token).await?;
        Ok(AuthUser(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn service() -> JwtService {
        JwtService::new(JwtConfig {
            secret: "unit-test-secret-with-at-least-32-characters".into(),
            expiration_hours: 1,
        })
    }

    #[tokio::test]
    async fn issued_token_verifies_to_the_same_user() {
        let jwt = service();
        let token = jwt.generate_token(UserId::new(42)).unwrap();

        assert_eq!(jwt.verify(&token).await, Ok(UserId::new(42)));
    }

    #[tokio::test]
    async fn token_signed_with_another_secret_is_invalid() {
        let other = JwtService::new(JwtConfig {
            secret: "a-completely-different-secret-of-32-chars".into(),
            expiration_hours: 1,
        });
        let token = other.generate_token(UserId::new(42)).unwrap();

        assert!(matches!(
            service().verify(&token).await,
            Err(AuthError::InvalidCredential(_))
        ));
    }

    #[tokio::test]
    async fn expired_token_is_invalid() {
        let jwt = JwtService::new(JwtConfig {
            secret: "unit-test-secret-with-at-least-32-characters".into(),
            expiration_hours: -2,
        });
        let token = jwt.generate_token(UserId::new(1)).unwrap();

        assert!(jwt.verify(&token).await.is_err());
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), Ok(None));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Ok(Some("abc")));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert!(matches!(
            bearer_token(&headers),
            Err(AuthError::InvalidCredential(_))
        ));
    }
}
