//! Late-bound injection of the third-party capture script plus the fetch
//! interposer that reroutes its submissions through the host. Grounded in
//! `aegis-rpc`'s `reqwest`-based forwarding shape for the HTTP leg and the
//! workspace's `regex` dependency (the same crate `0xwonj-websh` carries)
//! for the best-effort claim-URL scan.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, warn};

use bridge_api::{Error, Result};

static FIGMA_URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://(www\.)?figma\.com/[^\s"'<>]*"#).unwrap());

/// Well-known host for both the capture script and its submit endpoint.
pub const CAPTURE_BASE_ENDPOINT: &str = "https://mcp.figma.com";
/// Well-known source URL for the foreign capture script fetched in Stage B.
pub const CAPTURE_SCRIPT_URL: &str = "https://mcp.figma.com/capture.js";

/// One of the four capture-side events the surrounding workflow observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    Submitted(String),
    ClaimUrl(String),
    NextId(String),
    FigmaUrl(String),
}

/// Parses the raw capture-submission response text into the derived
/// events it carries, per the JSON-then-regex fallback cascade.
pub fn parse_submission(raw_body: &str) -> Vec<CaptureEvent> {
    let mut events = vec![CaptureEvent::Submitted(raw_body.to_string())];

    match serde_json::from_str::<Value>(raw_body) {
        Ok(Value::Object(map)) => {
            if let Some(claim_url) = map.get("claimUrl").and_then(Value::as_str) {
                events.push(CaptureEvent::ClaimUrl(claim_url.to_string()));
            }
            if let Some(next_id) = map.get("nextCaptureId").and_then(Value::as_str) {
                events.push(CaptureEvent::NextId(next_id.to_string()));
            }
        }
        _ => {
            if let Some(found) = FIGMA_URL_PATTERN.find(raw_body) {
                events.push(CaptureEvent::ClaimUrl(found.as_str().to_string()));
            }
        }
    }
    events
}

/// Host-side half of the capture bridge: fetches the foreign script and
/// proxies its submissions, emitting derived events to any subscriber.
pub struct CaptureBridge {
    http: reqwest::Client,
    events: broadcast::Sender<CaptureEvent>,
}

impl Default for CaptureBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBridge {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            http: reqwest::Client::new(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.events.subscribe()
    }

    /// Fetches the capture script text from its well-known source URL
    /// through the host's HTTP client.
    pub async fn fetch_capture_script(&self, script_url: &str) -> Result<String> {
        let response = self
            .http
            .get(script_url)
            .send()
            .await
            .map_err(|e| Error::ScriptFetchFailed(e.to_string()))?;
        response
            .text()
            .await
            .map_err(|e| Error::ScriptFetchFailed(e.to_string()))
    }

    /// The host-callable `__submitCapture(targetUrl, bodyString)` function:
    /// forwards the body to the upstream submit endpoint, emits the derived
    /// events, and returns the raw response text to the in-page caller.
    pub async fn submit_capture(&self, target_url: &str, body: &str) -> Result<String> {
        let response = self
            .http
            .post(target_url)
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| Error::UpstreamRpcFailed(e.to_string()))?;
        let text = response
            .text()
            .await
            .map_err(|e| Error::UpstreamRpcFailed(e.to_string()))?;

        for event in parse_submission(&text) {
            info!(?event, "capture event");
            if self.events.send(event).is_err() {
                warn!("no capture event subscriber attached");
            }
        }
        Ok(text)
    }

    /// Called by the popup/navigation observer when a new page or
    /// subsequent navigation resolves to a non-blank figma.com URL.
    pub fn observe_navigation(&self, url: &str) {
        if url == "about:blank" {
            return;
        }
        if url.contains("figma.com") {
            let _ = self.events.send(CaptureEvent::FigmaUrl(url.to_string()));
        }
    }
}

/// Stage B steps 1-2: evaluates the fetched foreign script in the page.
/// Guarded so re-triggering capture on the same page doesn't re-run it.
pub fn render_foreign_script_injection(capture_script_text: &str) -> String {
    format!(
        r#"
(() => {{
  if (window.__captureScriptLoaded) return;
  window.__captureScriptLoaded = true;
  {capture_script_text}
}})();
"#
    )
}

/// Stage B steps 4-5: installs the fetch interposer and invokes
/// `captureForDesign`. Evaluated after a one-second pause following
/// `render_foreign_script_injection`, so the foreign script has finished
/// self-initialising before its API is called.
pub fn render_capture_install_script(capture_id: &str, base_endpoint: &str) -> String {
    let endpoint = format!("{base_endpoint}/capture/{capture_id}/submit");
    format!(
        r#"
(() => {{
  if (!window.__submitCapture) {{
    window.__submitCapture = (targetUrl, body) =>
      window.__bridgeCallHost("capture", {{ targetUrl, body }});
  }}

  if (!window.__bridgeFetchWrapped) {{
    window.__bridgeFetchWrapped = true;
    const originalFetch = window.fetch.bind(window);
    window.fetch = async (input, init) => {{
      const url = typeof input === "string" ? input : input.url;
      if (url && url.includes("mcp.figma.com")) {{
        const body = init && init.body ? init.body : "";
        const text = await window.__submitCapture(url, body);
        return new Response(text, {{
          status: 200,
          headers: {{ "Content-Type": "application/json" }},
        }});
      }}
      return originalFetch(input, init);
    }};
  }}

  try {{
    window.captureForDesign({{
      captureId: "{capture_id}",
      endpoint: "{endpoint}",
      selector: "body",
    }});
  }} catch (_) {{}}
}})();
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method as http_method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parses_json_claim_url_and_next_id() {
        let body = r#"{"claimUrl":"https://figma.com/file/XYZ","nextCaptureId":"u-2"}"#;
        let events = parse_submission(body);
        assert_eq!(events[0], CaptureEvent::Submitted(body.to_string()));
        assert!(events.contains(&CaptureEvent::ClaimUrl("https://figma.com/file/XYZ".to_string())));
        assert!(events.contains(&CaptureEvent::NextId("u-2".to_string())));
    }

    #[test]
    fn falls_back_to_regex_scan_on_non_json_body() {
        let body = "thanks for capturing! see https://www.figma.com/file/ABC123 for your design";
        let events = parse_submission(body);
        assert!(events
            .iter()
            .any(|e| matches!(e, CaptureEvent::ClaimUrl(u) if u.contains("figma.com/file/ABC123"))));
    }

    #[test]
    fn non_json_body_without_url_emits_only_submitted() {
        let events = parse_submission("no url here");
        assert_eq!(events, vec![CaptureEvent::Submitted("no url here".to_string())]);
    }

    #[tokio::test]
    async fn submit_capture_emits_derived_events() {
        let server = MockServer::start().await;
        Mock::given(http_method("POST"))
            .and(path("/capture/u-1/submit"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"claimUrl":"https://figma.com/file/XYZ","nextCaptureId":"u-2"}"#,
            ))
            .mount(&server)
            .await;

        let bridge = CaptureBridge::new();
        let mut events = bridge.subscribe();
        let url = format!("{}/capture/u-1/submit", server.uri());
        let text = bridge.submit_capture(&url, "{}").await.unwrap();
        assert!(text.contains("claimUrl"));

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(events.recv().await.unwrap());
        }
        assert!(seen.iter().any(|e| matches!(e, CaptureEvent::Submitted(_))));
        assert!(seen.iter().any(|e| matches!(e, CaptureEvent::ClaimUrl(_))));
        assert!(seen.iter().any(|e| matches!(e, CaptureEvent::NextId(_))));
    }

    #[test]
    fn observe_navigation_ignores_about_blank() {
        let bridge = CaptureBridge::new();
        let mut events = bridge.subscribe();
        bridge.observe_navigation("about:blank");
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn observe_navigation_emits_figma_url() {
        let bridge = CaptureBridge::new();
        let mut events = bridge.subscribe();
        bridge.observe_navigation("https://figma.com/file/DEF");
        assert_eq!(
            events.try_recv().unwrap(),
            CaptureEvent::FigmaUrl("https://figma.com/file/DEF".to_string())
        );
    }

    #[test]
    fn foreign_script_injection_guards_against_double_load() {
        let script = render_foreign_script_injection("/* foreign */");
        assert!(script.contains("__captureScriptLoaded"));
        assert!(script.contains("/* foreign */"));
    }

    #[test]
    fn install_script_wraps_fetch_and_invokes_capture() {
        let script = render_capture_install_script("u-1", "https://mcp.figma.com");
        assert!(script.contains("__bridgeFetchWrapped"));
        assert!(script.contains("mcp.figma.com"));
        assert!(script.contains("captureForDesign"));
        assert!(script.contains("https://mcp.figma.com/capture/u-1/submit"));
    }
}
