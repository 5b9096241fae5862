//! Builds the JavaScript text installed into every page before first
//! script evaluation. Pure string templating, no I/O — grounded in
//! `other_examples/vibefi-client`'s `INIT_SCRIPT` (callback-registry +
//! resolve pattern) and extended with the EIP-6963 multi-provider
//! announcement the page-facing contract requires.

const TEMPLATE: &str = r#"
(() => {
  if (window.__bridgeProviderInstalled) return;
  window.__bridgeProviderInstalled = true;

  const ADDRESS = "__ADDRESS__";
  const CHAIN_HEX_ID = "__CHAIN_HEX_ID__";
  const NUMERIC_CHAIN_ID = "__NUMERIC_CHAIN_ID__";

  const listenersByEvent = new Map();

  function on(event, fn) {
    const set = listenersByEvent.get(event) ?? new Set();
    set.add(fn);
    listenersByEvent.set(event, set);
    return provider;
  }

  function once(event, fn) {
    const wrapper = (...args) => {
      removeListener(event, wrapper);
      fn(...args);
    };
    return on(event, wrapper);
  }

  function removeListener(event, fn) {
    listenersByEvent.get(event)?.delete(fn);
    return provider;
  }

  function removeAllListeners(event) {
    if (event) {
      listenersByEvent.delete(event);
    } else {
      listenersByEvent.clear();
    }
    return provider;
  }

  function emit(event, ...args) {
    const set = listenersByEvent.get(event);
    if (!set) return false;
    for (const fn of Array.from(set)) {
      try {
        fn(...args);
      } catch (_) {}
    }
    return true;
  }

  function listenerCount(event) {
    return listenersByEvent.get(event)?.size ?? 0;
  }

  function listeners(event) {
    return Array.from(listenersByEvent.get(event) ?? []);
  }

  // Shared host-call plumbing, reused by the capture bridge's
  // __submitCapture once it's injected into the same page.
  if (!window.__bridgePending) {
    window.__bridgePending = new Map();
    window.__bridgeNextId = 1;
    window.__bridgeResolve = (id, result, error) => {
      const callbacks = window.__bridgePending.get(id);
      if (!callbacks) return;
      window.__bridgePending.delete(id);
      if (error) callbacks.reject(new Error(error));
      else callbacks.resolve(result);
    };
    window.__bridgeCallHost = (kind, payload) => new Promise((resolve, reject) => {
      const id = window.__bridgeNextId++;
      window.__bridgePending.set(id, { resolve, reject });
      window.ipc.postMessage(JSON.stringify({ id, kind, ...payload }));
    });
  }

  function request({ method, params }) {
    return window.__bridgeCallHost("rpc", { method, params: params || [] });
  }

  function sendAsync(payload, callback) {
    request(payload).then(
      (result) => callback(null, { id: payload.id, jsonrpc: "2.0", result }),
      (error) => callback(error),
    );
  }

  function send(methodOrPayload, paramsOrCallback) {
    if (typeof methodOrPayload === "string") {
      return request({ method: methodOrPayload, params: paramsOrCallback });
    }
    return sendAsync(methodOrPayload, paramsOrCallback);
  }

  function enable() {
    return request({ method: "eth_requestAccounts", params: [] });
  }

  const provider = {
    isMetaMask: true,
    chainId: CHAIN_HEX_ID,
    networkVersion: NUMERIC_CHAIN_ID,
    selectedAddress: ADDRESS,
    isConnected: () => true,
    on,
    once,
    removeListener,
    removeAllListeners,
    emit,
    listenerCount,
    listeners,
    request,
    sendAsync,
    send,
    enable,
  };

  window.ethereum = provider;

  const ANNOUNCE_INFO = {
    uuid: "9d6b1e70-5c9c-4b86-8c0f-9f5a2d4f6e11",
    name: "MetaMask",
    icon:
      "data:image/svg+xml;base64,PHN2ZyB4bWxucz0iaHR0cDovL3d3dy53My5vcmcvMjAwMC9zdmciLz4=",
    rdns: "io.metamask",
  };

  function announceProvider() {
    const detail = Object.freeze({ info: Object.freeze(ANNOUNCE_INFO), provider });
    window.dispatchEvent(
      new CustomEvent("eip6963:announceProvider", { detail }),
    );
  }

  window.addEventListener("eip6963:requestProvider", announceProvider);
  window.addEventListener("load", () => announceProvider());
  announceProvider();
})();
"#;

/// Fills in the per-session address and chain fields of the injected
/// provider script.
pub fn render(address: &str, chain_hex_id: &str, numeric_chain_id: &str) -> String {
    TEMPLATE
        .replace("__ADDRESS__", address)
        .replace("__CHAIN_HEX_ID__", chain_hex_id)
        .replace("__NUMERIC_CHAIN_ID__", numeric_chain_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_all_placeholders() {
        let script = render("0xabc", "0x89", "137");
        assert!(script.contains("\"0xabc\""));
        assert!(script.contains("\"0x89\""));
        assert!(script.contains("\"137\""));
        assert!(!script.contains("__ADDRESS__"));
        assert!(!script.contains("__CHAIN_HEX_ID__"));
        assert!(!script.contains("__NUMERIC_CHAIN_ID__"));
    }

    #[test]
    fn installs_exactly_once_guard() {
        let script = render("0xabc", "0x89", "137");
        assert!(script.contains("__bridgeProviderInstalled"));
    }

    #[test]
    fn declares_full_capability_surface() {
        let script = render("0xabc", "0x89", "137");
        for member in [
            "isMetaMask", "isConnected", "chainId", "networkVersion", "selectedAddress",
            "on", "once", "removeListener", "removeAllListeners", "emit", "listenerCount",
            "listeners", "request", "sendAsync", "send", "enable",
        ] {
            assert!(script.contains(member), "missing provider member {member}");
        }
    }

    #[test]
    fn announces_both_on_request_and_on_load() {
        let script = render("0xabc", "0x89", "137");
        assert!(script.contains("eip6963:requestProvider"));
        assert!(script.contains("eip6963:announceProvider"));
        assert!(script.contains("window.addEventListener(\"load\""));
    }
}
