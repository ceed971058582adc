use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Bearer tokens issued by `/auth/refresh` or `/auth/register`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tokens {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// The token pair shared by every request of one backend client.
#[derive(Debug, Default)]
pub struct Credentials {
    tokens: RwLock<Tokens>,
}

impl Credentials {
    pub fn new(access_token: Option<String>, refresh_token: Option<String>) -> Self {
        Self {
            tokens: RwLock::new(Tokens {
                access_token,
                refresh_token,
            }),
        }
    }

    pub async fn access_token(&self) -> Option<String> {
        self.tokens.read().await.access_token.clone()
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.tokens.read().await.refresh_token.clone()
    }

    /// Replaces both tokens. A missing refresh token in `tokens` keeps the current one.
    pub async fn store(&self, tokens: Tokens) {
        let mut current = self.tokens.write().await;
        current.access_token = tokens.access_token;
        if tokens.refresh_token.is_some() {
            current.refresh_token = tokens.refresh_token;
        }
    }
}
