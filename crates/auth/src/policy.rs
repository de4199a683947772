use ipnet::IpNet;
use std::net::IpAddr;

/// Decides which peers may use simplified token-only authentication.
#[derive(Debug, Clone)]
pub struct NetworkPolicy {
    token_only: Vec<IpNet>,
}

impl NetworkPolicy {
    pub fn new(token_only: Vec<IpNet>) -> Self {
        Self { token_only }
    }

    /// True when the peer falls inside any trusted range.
    pub fn is_token_only(&self, peer: IpAddr) -> bool {
        self.token_only.iter().any(|net| net.contains(&peer))
    }
}
