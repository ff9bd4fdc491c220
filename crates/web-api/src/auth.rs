//! JWT 认证模块
//!
//! 提供 token 生成、验证，以及从请求头还原调用方身份。

use axum::http::HeaderMap;
use config::AuthConfig;
use domain::{Identity, UserId};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// JWT Claims 结构
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub exp: i64, // 过期时间 (Unix timestamp)
}

/// JWT Token 服务
#[derive(Clone)]
pub struct JwtService {
    token_ttl: chrono::Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: &AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_ref());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_ref());

        Self {
            token_ttl: chrono::Duration::days(config.token_ttl_days),
            encoding_key,
            decoding_key,
        }
    }

    /// 生成 JWT token
    pub fn generate_token(&self, user_id: UserId) -> Result<String, ApiError> {
        let now = chrono::Utc::now();
        let exp = now + self.token_ttl;

        let claims = Claims {
            user_id: Uuid::from(user_id),
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|err| {
            ApiError::internal_server_error(format!("Token generation failed: {}", err))
        })
    }

    /// 验证并解析 JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|token_data| token_data.claims)
            .map_err(|err| ApiError::unauthorized(format!("Invalid token: {}", err)))
    }

    /// 从请求头还原调用方身份。
    ///
    /// 没有 Authorization 头视为匿名调用方；头存在但无法验证则报错，
    /// 绝不把带着坏令牌的请求降级成匿名。
    pub fn identity_from_headers(&self, headers: &HeaderMap) -> Result<Identity, ApiError> {
        let Some(auth_header) = headers.get(axum::http::header::AUTHORIZATION) else {
            return Ok(Identity::Anonymous);
        };

        let auth_header = auth_header
            .to_str()
            .map_err(|_| ApiError::unauthorized("Invalid authorization header format"))?;
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Invalid authorization header format"))?;

        let claims = self.verify_token(token)?;
        Ok(Identity::Verified(UserId::new(claims.user_id)))
    }

    /// 必须实名的端点用这个：匿名一律 401。
    pub fn require_user_from_headers(&self, headers: &HeaderMap) -> Result<UserId, ApiError> {
        match self.identity_from_headers(headers)? {
            Identity::Verified(user_id) => Ok(user_id),
            Identity::Anonymous => Err(ApiError::unauthorized("Missing authorization header")),
        }
    }
}

/// 注册 / 登录成功后的令牌响应。
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}
