//! Upgrade-time authorization
//!
//! Decides whether a handshake may proceed to the WebSocket upgrade. Runs
//! before any room state is touched.

use assist_shared::{AssistError, AssistResult, Role};
use async_trait::async_trait;

use super::jwt::JwtManager;

/// What the authorizer gets to see of a handshake
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    pub role: Role,
    pub project_key: &'a str,
    pub token: Option<&'a str>,
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, request: AuthRequest<'_>) -> AssistResult<()>;
}

/// Admits every handshake
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn authorize(&self, _request: AuthRequest<'_>) -> AssistResult<()> {
        Ok(())
    }
}

/// Requires agents to present a token for the project they join
pub struct JwtAuthorizer {
    jwt: JwtManager,
}

impl JwtAuthorizer {
    pub fn new(jwt: JwtManager) -> Self {
        Self { jwt }
    }
}

#[async_trait]
impl Authorizer for JwtAuthorizer {
    async fn authorize(&self, request: AuthRequest<'_>) -> AssistResult<()> {
        if request.role == Role::Session {
            return Ok(());
        }

        let token = request
            .token
            .ok_or_else(|| AssistError::Unauthorized("agent token required".to_string()))?;
        let claims = self
            .jwt
            .validate_token(token)
            .map_err(|e| AssistError::Unauthorized(e.to_string()))?;

        if claims.project_key != request.project_key {
            tracing::warn!(
                subject = %claims.sub,
                token_project = %claims.project_key,
                project_key = %request.project_key,
                "Agent token issued for another project"
            );
            return Err(AssistError::Unauthorized(
                "token not valid for this project".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn authorizer() -> (JwtAuthorizer, JwtManager) {
        let jwt = JwtManager::new("test-secret-key-at-least-32-chars!", 1);
        (JwtAuthorizer::new(jwt.clone()), jwt)
    }

    fn agent<'a>(project_key: &'a str, token: Option<&'a str>) -> AuthRequest<'a> {
        AuthRequest {
            role: Role::Agent,
            project_key,
            token,
        }
    }

    #[tokio::test]
    async fn test_allow_all() {
        assert!(AllowAll.authorize(agent("projA", None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_sessions_need_no_token() {
        let (auth, _) = authorizer();
        let request = AuthRequest {
            role: Role::Session,
            project_key: "projA",
            token: None,
        };
        assert!(auth.authorize(request).await.is_ok());
    }

    #[tokio::test]
    async fn test_agent_token_checks() {
        let (auth, jwt) = authorizer();
        let token = jwt.generate_agent_token("agent-1", "projA").unwrap();

        assert!(auth.authorize(agent("projA", Some(&token))).await.is_ok());
        assert!(matches!(
            auth.authorize(agent("projB", Some(&token))).await,
            Err(AssistError::Unauthorized(_))
        ));
        assert!(matches!(
            auth.authorize(agent("projA", None)).await,
            Err(AssistError::Unauthorized(_))
        ));
        assert!(auth.authorize(agent("projA", Some("junk"))).await.is_err());
    }
}
