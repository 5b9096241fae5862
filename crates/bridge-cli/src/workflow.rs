//! Interactive terminal workflow: collects wallet/chain/url/destination,
//! then launches a session. `clap` for invocation flags, `dialoguer` for
//! the prompts, following `0xwonj-websh`'s `websh-cli` crate (a
//! `clap`-based binary layered over a core/host library split).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use bridge_api::{Chain, ChainRegistry, WalletRecord};
use bridge_host::capture_assistant::{CaptureIdAssistant, SubprocessCaptureIdAssistant};
use bridge_host::{
    ApproverBus, BrowserRuntime, CaptureBridge, CaptureConfig, CaptureTrigger, RpcDispatcher, WalletStore,
};
use bridge_host::session_log::SessionLog;
use chrono::Utc;
use dialoguer::{Input, Select};
use dialoguer::theme::ColorfulTheme;
use tracing::info;

pub struct WorkflowArgs {
    pub config_dir: PathBuf,
}

pub fn run(args: WorkflowArgs) -> Result<()> {
    std::fs::create_dir_all(&args.config_dir).context("failed to create config directory")?;

    let wallet_store = WalletStore::new(&args.config_dir);
    let wallet = select_wallet(&wallet_store)?;
    let chain = select_chain()?;
    let url: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Target URL")
        .default("https://example.com".to_string())
        .interact_text()
        .context("failed to read target url")?;

    let capture_id = SubprocessCaptureIdAssistant::new("uuidgen", vec![])
        .next_capture_id()
        .unwrap_or_else(|_| format!("u-{}", Utc::now().timestamp_millis()));

    let config = CaptureConfig::new(wallet.clone(), chain.clone(), url.clone(), capture_id.clone());

    let logs_dir = args.config_dir.join("logs");
    let mut log = SessionLog::start(&logs_dir, Utc::now()).context("failed to start session log")?;
    log.log(
        Utc::now(),
        &format!(
            "wallet {} on chain {} (capture {}, endpoint {})",
            config.wallet.address, config.chain.name, config.capture_id, config.figma_endpoint
        ),
    )?;

    let approver = Arc::new(ApproverBus::new());

    let dispatcher = Arc::new(RpcDispatcher::new(wallet, chain, approver.clone()));
    let capture = Arc::new(CaptureBridge::new());

    let log_events = Arc::new(std::sync::Mutex::new(log));

    info!(url = %config.url, "starting browser session");
    let events_for_runtime = log_events.clone();
    let result = BrowserRuntime::launch(
        &config.url,
        dispatcher,
        capture,
        config.capture_id.clone(),
        move |event| {
            info!(?event, "runtime event");
            if let Ok(mut log) = events_for_runtime.lock() {
                let _ = log.log(Utc::now(), &format!("{event:?}"));
            }
        },
        move |trigger| spawn_terminal_controller(approver, trigger),
    );

    let log = Arc::try_unwrap(log_events)
        .map_err(|_| anyhow::anyhow!("session log still referenced after browser close"))?
        .into_inner()
        .map_err(|_| anyhow::anyhow!("session log mutex poisoned"))?;
    log.finish(Utc::now())?;
    result.map_err(|e| anyhow::anyhow!("browser session failed: {e}"))
}

fn select_wallet(store: &WalletStore) -> Result<WalletRecord> {
    let existing = store.load().context("failed to load wallet store")?;

    let mut options: Vec<String> = existing
        .iter()
        .map(|w| format!("{} ({})", w.name, w.address))
        .collect();
    options.push("Create a new wallet".to_string());
    options.push("Import a private key".to_string());
    options.push("Use an ephemeral (unsaved) wallet".to_string());

    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a wallet")
        .items(&options)
        .default(0)
        .interact()
        .context("failed to read wallet selection")?;

    if choice < existing.len() {
        return Ok(existing[choice].clone());
    }

    match choice - existing.len() {
        0 => {
            let name: String = Input::with_theme(&ColorfulTheme::default())
                .with_prompt("Wallet name")
                .interact_text()?;
            store.create(name).map_err(|e| anyhow::anyhow!(e))
        }
        1 => {
            let name: String = Input::with_theme(&ColorfulTheme::default())
                .with_prompt("Wallet name")
                .interact_text()?;
            let key: String = Input::with_theme(&ColorfulTheme::default())
                .with_prompt("Private key (0x-prefixed)")
                .interact_text()?;
            store.import(name, &key).map_err(|e| anyhow::anyhow!(e))
        }
        2 => Ok(store.create_ephemeral("ephemeral")),
        _ => bail!("unreachable wallet selection"),
    }
}

fn select_chain() -> Result<Chain> {
    let builtin = ChainRegistry::all();
    let mut options: Vec<String> = builtin.iter().map(|c| format!("{} ({})", c.name, c.hex_id())).collect();
    options.push("Custom chain".to_string());

    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a chain")
        .items(&options)
        .default(0)
        .interact()
        .context("failed to read chain selection")?;

    if choice < builtin.len() {
        return Ok(builtin[choice].clone());
    }

    let id: u64 = Input::<u64>::with_theme(&ColorfulTheme::default())
        .with_prompt("Chain id")
        .interact_text()?;
    let name: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Chain name")
        .interact_text()?;
    let rpc: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("RPC URL")
        .interact_text()?;
    Chain::new(id, name, rpc).map_err(|e| anyhow::anyhow!(e))
}

/// Drives both the approval prompt and the capture-injection trigger from
/// a single stdin reader, so the two don't race over terminal input: a
/// background thread forwards lines to this task, which treats a line as
/// an approve/reject answer whenever a request is outstanding, and as a
/// `capture` command otherwise. Satisfies the approver bus's
/// single-listener contract (`attach()` replaces any previous listener).
fn spawn_terminal_controller(bus: Arc<ApproverBus>, trigger: CaptureTrigger) {
    use futures::StreamExt;

    let (line_tx, mut line_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        use std::io::BufRead;
        let stdin = std::io::stdin();
        for line in stdin.lock().lines().map_while(std::result::Result::ok) {
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    let mut requests = bus.attach();
    tokio::spawn(async move {
        println!("Type `capture` at any time to inject the capture script.");
        loop {
            tokio::select! {
                request = requests.next() => {
                    let Some(request) = request else { break };
                    println!("\nApproval requested for {}", request.method);
                    for (key, value) in &request.display {
                        println!("  {key}: {value}");
                    }
                    println!("Approve? [y/N]");
                    match line_rx.recv().await.as_deref() {
                        Some(answer) if answer.trim().eq_ignore_ascii_case("y") => request.approve(),
                        _ => request.reject("user declined".to_string()),
                    }
                }
                line = line_rx.recv() => {
                    if matches!(line, Some(text) if text.trim().eq_ignore_ascii_case("capture")) {
                        trigger.fire();
                    }
                }
            }
        }
    });
}
