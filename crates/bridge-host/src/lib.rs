pub mod approver_bus;
pub mod browser_runtime;
pub mod capture_assistant;
pub mod capture_bridge;
pub mod config;
pub mod dispatcher;
pub mod env_probe;
pub mod provider_script;
pub mod session_log;
pub mod wallet_store;

pub use approver_bus::{ApproverBus, TxRequest};
pub use browser_runtime::{BrowserRuntime, CaptureTrigger, RuntimeEvent};
pub use capture_bridge::{CaptureBridge, CaptureEvent};
pub use config::CaptureConfig;
pub use dispatcher::RpcDispatcher;
pub use wallet_store::WalletStore;
