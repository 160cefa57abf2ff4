//! SessionProvider port - 認証セッションの参照
//!
//! トークンの発行・更新は認証コラボレーターの責務です。ここでは現在の
//! bearer credential を読むだけです。

use async_trait::async_trait;

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Current bearer token, or `None` when signed out.
    async fn access_token(&self) -> Option<String>;
}

/// A session whose token never changes. Handy for services and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    token: Option<String>,
}

impl StaticSession {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn signed_out() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn access_token(&self) -> Option<String> {
        self.token.clone()
    }
}
