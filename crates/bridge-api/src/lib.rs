pub mod chain;
pub mod display;
pub mod error;
pub mod method;
pub mod wallet;

pub use chain::{Chain, ChainRegistry};
pub use error::{Error, Result};
pub use method::{MethodClass, classify};
pub use wallet::WalletRecord;
