//! Authentication module for the assist relay

pub mod authorizer;
pub mod jwt;

pub use authorizer::{AllowAll, AuthRequest, Authorizer, JwtAuthorizer};
pub use jwt::{AgentClaims, JwtError, JwtManager};
