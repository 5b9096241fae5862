use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use bridge_api::{Error, display::DisplayFields};
use futures::channel::{mpsc, oneshot};
use serde_json::Value;
use tracing::warn;

static SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// A signing call suspended pending external approval. Exactly one of
/// `resolve`/`reject` takes effect; further calls are silently ignored.
#[derive(Debug)]
pub struct TxRequest {
    pub sequence_id: u64,
    pub method: String,
    pub raw_params: Value,
    pub display: DisplayFields,
    reply: Mutex<Option<oneshot::Sender<Result<Option<String>, String>>>>,
}

impl TxRequest {
    fn new(
        method: impl Into<String>,
        raw_params: Value,
        display: DisplayFields,
    ) -> (Self, oneshot::Receiver<Result<Option<String>, String>>) {
        let (sender, receiver) = oneshot::channel();
        let request = Self {
            sequence_id: SEQUENCE.fetch_add(1, Ordering::SeqCst),
            method: method.into(),
            raw_params,
            display,
            reply: Mutex::new(Some(sender)),
        };
        (request, receiver)
    }

    /// Approves the request. The host performs the signing itself.
    pub fn approve(&self) {
        if let Some(sender) = self.reply.lock().unwrap().take() {
            let _ = sender.send(Ok(None));
        }
    }

    /// Approves the request and supplies the final value directly, bypassing
    /// local signing (used when the approver itself holds the key material).
    pub fn resolve(&self, value: String) {
        if let Some(sender) = self.reply.lock().unwrap().take() {
            let _ = sender.send(Ok(Some(value)));
        }
    }

    pub fn reject(&self, error: String) {
        if let Some(sender) = self.reply.lock().unwrap().take() {
            let _ = sender.send(Err(error));
        }
    }
}

/// A single in-process publish/subscribe channel on the `tx:request`
/// subject. At most one approver is attached at a time; the dispatcher only
/// ever learns whether a listener is present, never who it is.
pub struct ApproverBus {
    sender: Mutex<Option<mpsc::UnboundedSender<Arc<TxRequest>>>>,
}

impl Default for ApproverBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ApproverBus {
    pub fn new() -> Self {
        Self {
            sender: Mutex::new(None),
        }
    }

    /// Attaches a listener, replacing any previously attached one.
    pub fn attach(&self) -> mpsc::UnboundedReceiver<Arc<TxRequest>> {
        let (sender, receiver) = mpsc::unbounded();
        *self.sender.lock().unwrap() = Some(sender);
        receiver
    }

    pub fn detach(&self) {
        *self.sender.lock().unwrap() = None;
    }

    pub fn listener_count(&self) -> usize {
        usize::from(self.sender.lock().unwrap().is_some())
    }

    /// Emits a signing request on the bus and awaits its resolution. `Ok(None)`
    /// means the request was approved and the caller should sign locally;
    /// `Ok(Some(value))` means the approver supplied the final value itself.
    pub async fn request_approval(
        &self,
        method: impl Into<String>,
        raw_params: Value,
        display: DisplayFields,
    ) -> Result<Option<String>, Error> {
        let (request, receiver) = TxRequest::new(method, raw_params, display);
        let request = Arc::new(request);

        let sender = self.sender.lock().unwrap().clone();
        let Some(sender) = sender else {
            return Err(Error::InvalidInput("no approver attached".into()));
        };
        if sender.unbounded_send(request).is_err() {
            warn!("approver bus listener dropped before receiving request");
            return Err(Error::SigningRejected("approver disconnected".into()));
        }

        match receiver.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(Error::SigningRejected(message)),
            Err(_) => Err(Error::SigningRejected("approver disconnected".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn resolves_through_attached_listener() {
        let bus = ApproverBus::new();
        assert_eq!(bus.listener_count(), 0);

        let mut receiver = bus.attach();
        assert_eq!(bus.listener_count(), 1);

        let approval = tokio::spawn(async move {
            bus.request_approval("personal_sign", json!(["0x68656c6c6f"]), vec![])
                .await
        });

        let request = receiver.next().await.expect("request emitted");
        assert_eq!(request.method, "personal_sign");
        request.resolve("0xSIG".to_string());

        assert_eq!(approval.await.unwrap().unwrap(), Some("0xSIG".to_string()));
    }

    #[tokio::test]
    async fn approve_without_value_signals_local_signing() {
        let bus = ApproverBus::new();
        let mut receiver = bus.attach();

        let approval =
            tokio::spawn(async move { bus.request_approval("personal_sign", json!([]), vec![]).await });

        let request = receiver.next().await.unwrap();
        request.approve();

        assert_eq!(approval.await.unwrap().unwrap(), None);
    }

    #[tokio::test]
    async fn reject_surfaces_as_signing_rejected() {
        let bus = ApproverBus::new();
        let mut receiver = bus.attach();

        let approval =
            tokio::spawn(async move { bus.request_approval("personal_sign", json!([]), vec![]).await });

        let request = receiver.next().await.unwrap();
        request.reject("user declined".to_string());

        let err = approval.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::SigningRejected(msg) if msg == "user declined"));
    }

    #[tokio::test]
    async fn double_resolve_is_ignored() {
        let bus = ApproverBus::new();
        let mut receiver = bus.attach();

        let approval =
            tokio::spawn(async move { bus.request_approval("personal_sign", json!([]), vec![]).await });

        let request = receiver.next().await.unwrap();
        request.resolve("0xFIRST".to_string());
        request.resolve("0xSECOND".to_string());

        assert_eq!(approval.await.unwrap().unwrap(), Some("0xFIRST".to_string()));
    }
}
