//! Net-probe: yields a sequence of HTTP clients, each constrained to a
//! different IP address family, in preference order.
//!
//! The platform client works through this sequence one dial strategy at a
//! time; a connection failure classifiable as an address-family error
//! advances to the next strategy, and a success short-circuits it. The
//! probe is single-use per request and caches nothing across calls.

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Address-family constraint for a single dial attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkType {
    Ipv4Only,
    Ipv6Only,
    Unconstrained,
}

impl NetworkType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ipv4" => Some(Self::Ipv4Only),
            "ipv6" => Some(Self::Ipv6Only),
            "unconstrained" | "any" => Some(Self::Unconstrained),
            _ => None,
        }
    }
}

/// Produces a sequence of [`reqwest::Client`]s, one per preference, each
/// with a DNS resolver constrained to the matching address family.
pub struct NetProbe {
    preferences: Vec<NetworkType>,
}

impl NetProbe {
    /// `preferences` is the ordered preference list from task config. An
    /// empty list behaves as `[Unconstrained]`.
    pub fn new(preferences: Vec<NetworkType>) -> Self {
        let preferences = if preferences.is_empty() {
            vec![NetworkType::Unconstrained]
        } else {
            preferences
        };
        NetProbe { preferences }
    }

    /// Build the ordered list of dial strategies. Each entry pairs the
    /// family constraint with a [`reqwest::Client`] configured to honor it.
    /// All clients share `cookie_jar`, so a cookie learned via one family's
    /// client is visible to the others.
    pub fn dial_strategies(
        &self,
        user_agent: &str,
        cookie_jar: &Arc<reqwest::cookie::Jar>,
    ) -> Result<Vec<DialStrategy>, NetProbeError> {
        self.preferences
            .iter()
            .map(|&family| {
                build_client(family, user_agent, cookie_jar)
                    .map(|client| DialStrategy { family, client })
            })
            .collect()
    }
}

pub struct DialStrategy {
    pub family: NetworkType,
    pub client: reqwest::Client,
}

fn build_client(
    family: NetworkType,
    user_agent: &str,
    cookie_jar: &Arc<reqwest::cookie::Jar>,
) -> Result<reqwest::Client, NetProbeError> {
    let builder = reqwest::Client::builder()
        .user_agent(user_agent.to_owned())
        .cookie_provider(cookie_jar.clone());

    let builder = match family {
        NetworkType::Unconstrained => builder,
        NetworkType::Ipv4Only => builder.dns_resolver(Arc::new(FamilyResolver { wants_v6: false })),
        NetworkType::Ipv6Only => builder.dns_resolver(Arc::new(FamilyResolver { wants_v6: true })),
    };

    builder
        .build()
        .map_err(|e| NetProbeError::ClientBuild(e.to_string()))
}

/// A [`Resolve`] implementation that performs a normal DNS lookup and then
/// filters the results down to one address family.
struct FamilyResolver {
    wants_v6: bool,
}

impl Resolve for FamilyResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let wants_v6 = self.wants_v6;
        Box::pin(async move {
            let host = name.as_str().to_owned();
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?
                .filter(|addr| matches!(addr.ip(), IpAddr::V6(_)) == wants_v6)
                .collect();

            if addrs.is_empty() {
                return Err(Box::new(std::io::Error::other(format!(
                    "no {} addresses for '{host}'",
                    if wants_v6 { "IPv6" } else { "IPv4" }
                ))) as Box<dyn std::error::Error + Send + Sync>);
            }

            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }
}

/// Whether `err` looks like an address-family / dial-level failure, as
/// opposed to an HTTP-level or protocol-level one. Used by the platform
/// client to decide whether to advance to the next dial strategy.
pub fn is_family_dial_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_request()
}

#[derive(Debug)]
pub enum NetProbeError {
    ClientBuild(String),
}

impl std::fmt::Display for NetProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetProbeError::ClientBuild(s) => write!(f, "failed to build HTTP client: {s}"),
        }
    }
}

impl std::error::Error for NetProbeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_preferences_become_unconstrained() {
        let probe = NetProbe::new(Vec::new());
        assert_eq!(probe.preferences, vec![NetworkType::Unconstrained]);
    }

    #[test]
    fn network_type_parses_known_tags() {
        assert_eq!(NetworkType::parse("ipv4"), Some(NetworkType::Ipv4Only));
        assert_eq!(NetworkType::parse("ipv6"), Some(NetworkType::Ipv6Only));
        assert_eq!(
            NetworkType::parse("unconstrained"),
            Some(NetworkType::Unconstrained)
        );
        assert_eq!(NetworkType::parse("bogus"), None);
    }

    #[test]
    fn dial_strategies_preserves_preference_order() {
        let probe = NetProbe::new(vec![NetworkType::Ipv6Only, NetworkType::Ipv4Only]);
        let jar = Arc::new(reqwest::cookie::Jar::default());
        let strategies = probe.dial_strategies("recorder/test", &jar).unwrap();
        assert_eq!(strategies.len(), 2);
        assert_eq!(strategies[0].family, NetworkType::Ipv6Only);
        assert_eq!(strategies[1].family, NetworkType::Ipv4Only);
    }
}
