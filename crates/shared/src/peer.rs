//! Peer identity parsing
//!
//! Every connection carries a peer token of the form
//! `projectKey-sessionId[-tabId]`. The room a connection joins is derived from
//! the project and session components only, so all tabs of one logical session
//! share a room with the agents assisting it.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{AssistError, AssistResult};

const DELIMITER: char = '-';
const GENERATED_TAB_LEN: usize = 11;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Structured identity parsed from a peer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddress {
    pub project_key: String,
    pub session_id: String,
    pub tab_id: Option<String>,
}

impl PeerAddress {
    /// Parse a peer token into its components
    pub fn parse(token: &str) -> AssistResult<Self> {
        let parts: Vec<&str> = token.split(DELIMITER).collect();
        if !(2..=3).contains(&parts.len()) || parts.iter().any(|p| p.is_empty()) {
            return Err(AssistError::MalformedPeerId(token.to_string()));
        }

        Ok(Self {
            project_key: parts[0].to_string(),
            session_id: parts[1].to_string(),
            tab_id: parts.get(2).map(|t| t.to_string()),
        })
    }

    /// Room id for this address (tab-independent)
    pub fn room_id(&self) -> String {
        format!("{}{}{}", self.project_key, DELIMITER, self.session_id)
    }
}

/// Room id for a raw peer token
pub fn room_id(token: &str) -> AssistResult<String> {
    PeerAddress::parse(token).map(|addr| addr.room_id())
}

/// Peer address after admission defaults have been applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPeer {
    pub peer_id: String,
    pub project_key: String,
    pub session_id: String,
    pub room_id: String,
    pub tab_id: String,
    /// True when the tab id was generated rather than supplied
    pub generated_tab: bool,
}

/// Applies admission policy to peer tokens: optional project key length and
/// the default tab id for clients that predate multi-tab support.
pub struct AddressResolver {
    project_key_length: Option<usize>,
    rng: Mutex<StdRng>,
}

impl AddressResolver {
    pub fn new(project_key_length: Option<usize>) -> Self {
        Self {
            project_key_length,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic resolver for tests
    pub fn seeded(project_key_length: Option<usize>, seed: u64) -> Self {
        Self {
            project_key_length,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Parse and validate a peer token without applying defaults
    pub fn parse(&self, token: &str) -> AssistResult<PeerAddress> {
        let addr = PeerAddress::parse(token)?;
        if let Some(len) = self.project_key_length {
            if addr.project_key.len() != len {
                return Err(AssistError::MalformedPeerId(token.to_string()));
            }
        }
        Ok(addr)
    }

    /// Parse a token and fill in a generated tab id when it has none
    pub fn resolve(&self, token: &str) -> AssistResult<ResolvedPeer> {
        let addr = self.parse(token)?;
        Ok(self.with_default_tab(token, addr))
    }

    pub fn with_default_tab(&self, token: &str, addr: PeerAddress) -> ResolvedPeer {
        let room_id = addr.room_id();
        let (tab_id, generated_tab) = match addr.tab_id {
            Some(tab) => (tab, false),
            None => (self.generate_tab_id(), true),
        };

        ResolvedPeer {
            peer_id: token.to_string(),
            project_key: addr.project_key,
            session_id: addr.session_id,
            room_id,
            tab_id,
            generated_tab,
        }
    }

    /// Random base-36 token, not meant to be human readable
    pub fn generate_tab_id(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        (0..GENERATED_TAB_LEN)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect()
    }
}

impl Default for AddressResolver {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_token() {
        let addr = PeerAddress::parse("projA-sess1-tab9").unwrap();
        assert_eq!(addr.project_key, "projA");
        assert_eq!(addr.session_id, "sess1");
        assert_eq!(addr.tab_id.as_deref(), Some("tab9"));
    }

    #[test]
    fn test_parse_without_tab() {
        let addr = PeerAddress::parse("projA-sess1").unwrap();
        assert_eq!(addr.tab_id, None);
        assert_eq!(addr.room_id(), "projA-sess1");
    }

    #[test]
    fn test_malformed_tokens() {
        for token in ["", "projA", "projA-", "-sess1", "a-b-c-d", "a--c"] {
            assert!(
                matches!(PeerAddress::parse(token), Err(AssistError::MalformedPeerId(_))),
                "token {:?} should be rejected",
                token
            );
        }
    }

    #[test]
    fn test_room_id_ignores_tab() {
        let rooms: Vec<String> = ["projA-sess1", "projA-sess1-t1", "projA-sess1-t2"]
            .iter()
            .map(|t| room_id(t).unwrap())
            .collect();
        assert!(rooms.iter().all(|r| r == "projA-sess1"));
    }

    #[test]
    fn test_project_key_length_policy() {
        let resolver = AddressResolver::seeded(Some(5), 1);
        assert!(resolver.parse("projA-sess1").is_ok());
        assert!(matches!(
            resolver.parse("proj-sess1"),
            Err(AssistError::MalformedPeerId(_))
        ));
    }

    #[test]
    fn test_default_tab_is_generated() {
        let resolver = AddressResolver::seeded(None, 7);
        let peer = resolver.resolve("projA-sess1").unwrap();
        assert!(peer.generated_tab);
        assert_eq!(peer.tab_id.len(), GENERATED_TAB_LEN);
        assert!(peer.tab_id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(peer.room_id, "projA-sess1");
        assert_eq!(peer.peer_id, "projA-sess1");
    }

    #[test]
    fn test_supplied_tab_is_kept() {
        let resolver = AddressResolver::seeded(None, 7);
        let peer = resolver.resolve("projA-sess1-tab1").unwrap();
        assert!(!peer.generated_tab);
        assert_eq!(peer.tab_id, "tab1");
    }

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let a = AddressResolver::seeded(None, 42);
        let b = AddressResolver::seeded(None, 42);
        assert_eq!(a.generate_tab_id(), b.generate_tab_id());
        assert_ne!(a.generate_tab_id(), a.generate_tab_id());
    }
}
