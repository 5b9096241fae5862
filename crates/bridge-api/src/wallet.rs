use alloy::signers::local::PrivateKeySigner;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A named key pair, persisted verbatim in the wallet store file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub name: String,
    pub address: String,
    #[serde(rename = "privateKey")]
    pub private_key: String,
}

impl WalletRecord {
    /// Builds a record from a name and private key, deriving the address so
    /// the two can never disagree.
    pub fn from_private_key(name: impl Into<String>, private_key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| Error::InvalidInput(format!("invalid private key: {e}")))?;
        Ok(Self {
            name: name.into(),
            address: format!("{:#x}", signer.address()),
            private_key: normalize_private_key(private_key),
        })
    }

    pub fn generate(name: impl Into<String>) -> Self {
        let signer = PrivateKeySigner::random();
        Self {
            name: name.into(),
            address: format!("{:#x}", signer.address()),
            private_key: format!("0x{}", hex::encode(signer.to_bytes())),
        }
    }

    pub fn signer(&self) -> Result<PrivateKeySigner> {
        self.private_key
            .parse()
            .map_err(|e| Error::InvalidInput(format!("invalid private key: {e}")))
    }
}

fn normalize_private_key(key: &str) -> String {
    let lower = key.to_ascii_lowercase();
    if lower.starts_with("0x") {
        lower
    } else {
        format!("0x{lower}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_derived_from_private_key() {
        assert!(WalletRecord::from_private_key("bad", "0xnotahexkey").is_err());

        let valid = "0000000000000000000000000000000000000000000000000000000000000001";
        let record = WalletRecord::from_private_key("w", &format!("0x{valid}")).unwrap();
        assert!(record.address.starts_with("0x"));
        assert_eq!(record.private_key, format!("0x{valid}"));
    }

    #[test]
    fn generated_wallet_has_matching_signer() {
        let record = WalletRecord::generate("eph");
        let signer = record.signer().unwrap();
        assert_eq!(format!("{:#x}", signer.address()), record.address);
    }
}
