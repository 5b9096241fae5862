use std::sync::Arc;

use alloy::dyn_abi::TypedData;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::SignerSync;
use bridge_api::{Chain, Error, MethodClass, Result, WalletRecord, classify, display};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::approver_bus::ApproverBus;

/// Routes a single JSON-RPC call from the page to one of the three method
/// classes. One dispatcher per active tab session; it owns the wallet and
/// chain for the lifetime of that session.
pub struct RpcDispatcher {
    wallet: WalletRecord,
    chain: Chain,
    approver: Arc<ApproverBus>,
    http: reqwest::Client,
}

impl RpcDispatcher {
    pub fn new(wallet: WalletRecord, chain: Chain, approver: Arc<ApproverBus>) -> Self {
        Self {
            wallet,
            chain,
            approver,
            http: reqwest::Client::new(),
        }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn wallet_address(&self) -> &str {
        &self.wallet.address
    }

    pub async fn dispatch(&self, method: &str, params: &Value) -> Result<Value> {
        match classify(method) {
            MethodClass::AnswerLocal => self.answer_local(method, params),
            MethodClass::SignLocal => self.sign_local(method, params).await,
            MethodClass::Forward => self.forward(method, params).await,
        }
    }

    fn answer_local(&self, method: &str, params: &Value) -> Result<Value> {
        match method {
            "eth_accounts" | "eth_requestAccounts" => Ok(json!([self.wallet.address])),
            "eth_chainId" => Ok(json!(self.chain.hex_id())),
            "net_version" => Ok(json!(self.chain.decimal_id())),
            "wallet_getPermissions" | "wallet_requestPermissions" => Ok(json!([{
                "parentCapability": "eth_accounts",
                "caveats": [{
                    "type": "restrictReturnedAccounts",
                    "value": [self.wallet.address],
                }],
            }])),
            "wallet_switchEthereumChain" => {
                let requested = params
                    .get(0)
                    .and_then(|p| p.get("chainId"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::InvalidInput("missing chainId".into()))?;
                if requested != self.chain.hex_id() {
                    warn!(
                        requested,
                        active = %self.chain.hex_id(),
                        "ignoring chain switch to an unconfigured chain"
                    );
                }
                Ok(Value::Null)
            }
            "wallet_addEthereumChain" => Ok(Value::Null),
            other => Err(Error::InvalidInput(format!("unhandled local method: {other}"))),
        }
    }

    async fn sign_local(&self, method: &str, params: &Value) -> Result<Value> {
        if self.approver.listener_count() == 0 {
            return self.sign_now(method, params).await.map(|s| json!(s));
        }

        let display = self.display_for(method, params)?;
        let outcome = self
            .approver
            .request_approval(method, params.clone(), display)
            .await?;

        match outcome {
            Some(value) => Ok(json!(value)),
            None => self.sign_now(method, params).await.map(|s| json!(s)),
        }
    }

    fn display_for(&self, method: &str, params: &Value) -> Result<display::DisplayFields> {
        match method {
            "personal_sign" => {
                let message = params
                    .get(0)
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::InvalidInput("missing message".into()))?;
                Ok(display::personal_sign_display(message))
            }
            "eth_signTypedData_v4" => {
                let typed_data_str = params
                    .get(1)
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::InvalidInput("missing typed data".into()))?;
                let typed_data: Value = serde_json::from_str(typed_data_str)
                    .map_err(|e| Error::InvalidInput(format!("invalid typed data json: {e}")))?;
                let domain_name = typed_data
                    .get("domain")
                    .and_then(|d| d.get("name"))
                    .and_then(Value::as_str);
                let primary_type = typed_data.get("primaryType").and_then(Value::as_str);
                let message = typed_data.get("message").cloned().unwrap_or(Value::Null);
                Ok(display::typed_data_display(domain_name, primary_type, &message))
            }
            "eth_sendTransaction" => {
                let tx = params
                    .get(0)
                    .ok_or_else(|| Error::InvalidInput("missing transaction".into()))?;
                Ok(display::send_transaction_display(
                    tx.get("to").and_then(Value::as_str),
                    tx.get("value").and_then(Value::as_str),
                    tx.get("data").and_then(Value::as_str),
                    tx.get("gas").and_then(Value::as_str),
                ))
            }
            other => Err(Error::InvalidInput(format!("unhandled sign method: {other}"))),
        }
    }

    async fn sign_now(&self, method: &str, params: &Value) -> Result<String> {
        let signer = self.wallet.signer()?;
        match method {
            "personal_sign" => {
                let message = params
                    .get(0)
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::InvalidInput("missing message".into()))?;
                let bytes = decode_hex(message)?;
                let sig = signer
                    .sign_message_sync(&bytes)
                    .map_err(|e| Error::SigningRejected(e.to_string()))?;
                Ok(format!("0x{}", hex::encode(sig.as_bytes())))
            }
            "eth_signTypedData_v4" => {
                let typed_data_str = params
                    .get(1)
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::InvalidInput("missing typed data".into()))?;
                let typed_data: TypedData = serde_json::from_str(typed_data_str)
                    .map_err(|e| Error::InvalidInput(format!("invalid typed data json: {e}")))?;
                let hash = typed_data
                    .eip712_signing_hash()
                    .map_err(|e| Error::InvalidInput(format!("invalid typed data: {e}")))?;
                let sig = signer
                    .sign_hash_sync(&hash)
                    .map_err(|e| Error::SigningRejected(e.to_string()))?;
                Ok(format!("0x{}", hex::encode(sig.as_bytes())))
            }
            "eth_sendTransaction" => {
                let tx_json = params
                    .get(0)
                    .ok_or_else(|| Error::InvalidInput("missing transaction".into()))?;
                let raw = self.build_signed_transaction(tx_json, signer).await?;
                self.submit_raw_transaction(&raw).await
            }
            other => Err(Error::InvalidInput(format!("unhandled sign method: {other}"))),
        }
    }

    async fn build_signed_transaction(
        &self,
        tx_json: &Value,
        signer: alloy::signers::local::PrivateKeySigner,
    ) -> Result<String> {
        let mut request = TransactionRequest::default();
        if let Some(to) = tx_json.get("to").and_then(Value::as_str) {
            let addr: alloy::primitives::Address = to
                .parse()
                .map_err(|_| Error::InvalidInput(format!("invalid to address: {to}")))?;
            request = request.with_to(addr);
        }
        if let Some(value) = tx_json.get("value").and_then(Value::as_str) {
            let value = alloy::primitives::U256::from_str_radix(
                value.strip_prefix("0x").unwrap_or(value),
                16,
            )
            .map_err(|_| Error::InvalidInput(format!("invalid value: {value}")))?;
            request = request.with_value(value);
        }
        if let Some(data) = tx_json.get("data").and_then(Value::as_str) {
            request = request.with_input(decode_hex(data)?);
        }
        request = request.with_chain_id(self.chain.id);

        let wallet = EthereumWallet::from(signer);
        let envelope = request
            .build(&wallet)
            .await
            .map_err(|e| Error::SigningRejected(e.to_string()))?;
        use alloy::eips::eip2718::Encodable2718;
        Ok(format!("0x{}", hex::encode(envelope.encoded_2718())))
    }

    async fn submit_raw_transaction(&self, raw_signed_tx: &str) -> Result<String> {
        let response: Value = self.forward("eth_sendRawTransaction", &json!([raw_signed_tx])).await?;
        response
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::UpstreamRpcFailed("malformed eth_sendRawTransaction response".into()))
    }

    async fn forward(&self, method: &str, params: &Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        info!(method, rpc = %self.chain.rpc, "forwarding rpc call upstream");
        let response = self
            .http
            .post(&self.chain.rpc)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::UpstreamRpcFailed(e.to_string()))?;
        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::UpstreamRpcFailed(e.to_string()))?;
        if let Some(error) = payload.get("error") {
            return Err(Error::UpstreamRpcFailed(error.to_string()));
        }
        payload
            .get("result")
            .cloned()
            .ok_or_else(|| Error::UpstreamRpcFailed("missing result field".into()))
    }
}

fn decode_hex(hex_payload: &str) -> Result<Vec<u8>> {
    let stripped = hex_payload.strip_prefix("0x").unwrap_or(hex_payload);
    hex::decode(stripped).map_err(|e| Error::InvalidInput(format!("invalid hex: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use wiremock::matchers::method as http_method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_wallet() -> WalletRecord {
        WalletRecord::from_private_key("test", &format!("0x{}", "11".repeat(32))).unwrap()
    }

    #[tokio::test]
    async fn eth_accounts_answers_locally_with_no_approver() {
        let wallet = test_wallet();
        let chain = Chain::new(1, "Ethereum", "https://eth.llamarpc.com").unwrap();
        let dispatcher = RpcDispatcher::new(wallet.clone(), chain, Arc::new(ApproverBus::new()));

        let result = dispatcher.dispatch("eth_accounts", &json!([])).await.unwrap();
        assert_eq!(result, json!([wallet.address]));
    }

    #[tokio::test]
    async fn eth_chain_id_reflects_configured_chain() {
        let dispatcher = RpcDispatcher::new(
            test_wallet(),
            Chain::new(137, "Polygon", "https://polygon-rpc.com").unwrap(),
            Arc::new(ApproverBus::new()),
        );
        let result = dispatcher.dispatch("eth_chainId", &json!([])).await.unwrap();
        assert_eq!(result, json!("0x89"));
    }

    #[tokio::test]
    async fn personal_sign_signs_immediately_with_no_approver_attached() {
        let dispatcher = RpcDispatcher::new(
            test_wallet(),
            Chain::new(1, "Ethereum", "https://eth.llamarpc.com").unwrap(),
            Arc::new(ApproverBus::new()),
        );
        let result = dispatcher
            .dispatch("personal_sign", &json!(["0x68656c6c6f", "0xabc"]))
            .await
            .unwrap();
        assert!(result.as_str().unwrap().starts_with("0x"));
    }

    #[tokio::test]
    async fn personal_sign_signs_after_approval() {
        let approver = Arc::new(ApproverBus::new());
        let mut receiver = approver.attach();
        let dispatcher = RpcDispatcher::new(
            test_wallet(),
            Chain::new(1, "Ethereum", "https://eth.llamarpc.com").unwrap(),
            approver,
        );

        let call = tokio::spawn(async move {
            dispatcher
                .dispatch("personal_sign", &json!(["0x68656c6c6f", "0xabc"]))
                .await
        });

        let request = receiver.next().await.expect("approval request emitted");
        assert_eq!(request.display[0], ("message".to_string(), "hello".to_string()));
        request.approve();

        let result = call.await.unwrap().unwrap();
        assert!(result.as_str().unwrap().starts_with("0x"));
    }

    #[tokio::test]
    async fn unknown_method_forwards_upstream() {
        let server = MockServer::start().await;
        Mock::given(http_method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": "0x10",
            })))
            .mount(&server)
            .await;

        let dispatcher = RpcDispatcher::new(
            test_wallet(),
            Chain::new(1, "Ethereum", &server.uri()).unwrap(),
            Arc::new(ApproverBus::new()),
        );
        let result = dispatcher.dispatch("eth_blockNumber", &json!([])).await.unwrap();
        assert_eq!(result, json!("0x10"));
    }

    #[tokio::test]
    async fn upstream_rpc_error_surfaces_as_upstream_rpc_failed() {
        let server = MockServer::start().await;
        Mock::given(http_method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32000, "message": "nope"},
            })))
            .mount(&server)
            .await;

        let dispatcher = RpcDispatcher::new(
            test_wallet(),
            Chain::new(1, "Ethereum", &server.uri()).unwrap(),
            Arc::new(ApproverBus::new()),
        );
        let err = dispatcher.dispatch("eth_getLogs", &json!([])).await.unwrap_err();
        assert!(matches!(err, Error::UpstreamRpcFailed(_)));
    }
}
