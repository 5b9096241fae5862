use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A chain the bridge can forward RPC calls to.
///
/// `hex_id` is always recomputed from `id`, never stored independently, so
/// the two can't drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub id: u64,
    pub name: String,
    pub rpc: String,
}

impl Chain {
    pub fn new(id: u64, name: impl Into<String>, rpc: impl Into<String>) -> Result<Self> {
        let rpc = rpc.into();
        if id == 0 {
            return Err(Error::InvalidInput("chain id must be positive".into()));
        }
        if !(rpc.starts_with("http://") || rpc.starts_with("https://")) {
            return Err(Error::InvalidInput(format!(
                "chain rpc must be an http(s) url: {rpc}"
            )));
        }
        Ok(Self {
            id,
            name: name.into(),
            rpc,
        })
    }

    /// `"0x" + lowercase hex(id)`, as returned from `eth_chainId`.
    pub fn hex_id(&self) -> String {
        format!("0x{:x}", self.id)
    }

    /// Decimal string, as returned from `net_version`.
    pub fn decimal_id(&self) -> String {
        self.id.to_string()
    }
}

/// The static table of well-known chains plus custom-chain construction.
pub struct ChainRegistry;

impl ChainRegistry {
    pub fn all() -> Vec<Chain> {
        vec![
            Chain::new(1, "Ethereum", "https://eth.llamarpc.com").unwrap(),
            Chain::new(42161, "Arbitrum", "https://arb1.arbitrum.io/rpc").unwrap(),
            Chain::new(8453, "Base", "https://mainnet.base.org").unwrap(),
            Chain::new(137, "Polygon", "https://polygon-rpc.com").unwrap(),
            Chain::new(10, "Optimism", "https://mainnet.optimism.io").unwrap(),
            Chain::new(56, "BNB Chain", "https://bsc-dataseed.binance.org").unwrap(),
            Chain::new(
                43114,
                "Avalanche",
                "https://api.avax.network/ext/bc/C/rpc",
            )
            .unwrap(),
        ]
    }

    pub fn find_by_id(id: u64) -> Option<Chain> {
        Self::all().into_iter().find(|chain| chain.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_id_tracks_id() {
        let chain = Chain::new(137, "Polygon", "https://polygon-rpc.com").unwrap();
        assert_eq!(chain.hex_id(), "0x89");
        assert_eq!(chain.decimal_id(), "137");
    }

    #[test]
    fn rejects_non_positive_id() {
        assert!(Chain::new(0, "Bad", "https://example.com").is_err());
    }

    #[test]
    fn rejects_non_http_rpc() {
        assert!(Chain::new(1, "Bad", "ftp://example.com").is_err());
    }

    #[test]
    fn builtin_table_has_known_chains() {
        let ids: Vec<u64> = ChainRegistry::all().iter().map(|c| c.id).collect();
        for expected in [1, 42161, 8453, 137, 10, 56, 43114] {
            assert!(ids.contains(&expected), "missing chain {expected}");
        }
        assert_eq!(ChainRegistry::find_by_id(137).unwrap().name, "Polygon");
        assert!(ChainRegistry::find_by_id(999_999).is_none());
    }
}
