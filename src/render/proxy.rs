//! Proxy engine inbound topology.
//!
//! One edge listener accepts TCP from the tunnel and falls back by path to
//! four loopback listeners. Field order follows the engine's documented
//! schema so the serialized document is stable.

use serde::Serialize;

/// Loopback port of the plain TCP listener.
pub const PLAIN_PORT: u16 = 3001;
/// Loopback port of the first WebSocket listener.
pub const VLESS_WS_PORT: u16 = 3002;
/// Loopback port of the second WebSocket listener.
pub const VMESS_WS_PORT: u16 = 3003;
/// Loopback port of the third WebSocket listener.
pub const TROJAN_WS_PORT: u16 = 3004;
/// Upgrade path routed to [`VLESS_WS_PORT`].
pub const VLESS_PATH: &str = "/vless-argo";
/// Upgrade path routed to [`VMESS_WS_PORT`].
pub const VMESS_PATH: &str = "/vmess-argo";
/// Upgrade path routed to [`TROJAN_WS_PORT`].
pub const TROJAN_PATH: &str = "/trojan-argo";

const LOOPBACK: &str = "127.0.0.1";
const DISCARD: &str = "/dev/null";
const DNS_SERVER: &str = "https+local://8.8.8.8/dns-query";

/// Complete proxy engine configuration.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ProxyInboundSpec {
    log: LogSection,
    inbounds: Vec<Inbound>,
    dns: DnsSection,
    outbounds: Vec<Outbound>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
struct LogSection {
    access: &'static str,
    error: &'static str,
    loglevel: &'static str,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct Inbound {
    port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    listen: Option<&'static str>,
    protocol: &'static str,
    settings: InboundSettings,
    stream_settings: StreamSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    sniffing: Option<Sniffing>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
struct InboundSettings {
    clients: Vec<ClientEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    decryption: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fallbacks: Vec<Fallback>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    flow: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alter_id: Option<u8>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
struct Fallback {
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'static str>,
    dest: u16,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct StreamSettings {
    network: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    security: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ws_settings: Option<WsSettings>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
struct WsSettings {
    path: &'static str,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct Sniffing {
    enabled: bool,
    dest_override: [&'static str; 3],
    metadata_only: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
struct DnsSection {
    servers: [&'static str; 1],
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
struct Outbound {
    protocol: &'static str,
    tag: &'static str,
}

const fn sniffing() -> Option<Sniffing> {
    Some(Sniffing {
        enabled: true,
        dest_override: ["http", "tls", "quic"],
        metadata_only: false,
    })
}

const fn websocket(security: Option<&'static str>, path: &'static str) -> StreamSettings {
    StreamSettings {
        network: "ws",
        security,
        ws_settings: Some(WsSettings { path }),
    }
}

impl ProxyInboundSpec {
    /// Builds the fixed topology with every listener bound to `uuid` and the
    /// edge listener on `edge_port`.
    #[must_use]
    pub fn new(uuid: &str, edge_port: u16) -> Self {
        let id = || Some(uuid.to_owned());

        let edge = Inbound {
            port: edge_port,
            listen: None,
            protocol: "vless",
            settings: InboundSettings {
                clients: vec![ClientEntry {
                    id: id(),
                    flow: Some("xtls-rprx-vision"),
                    ..ClientEntry::default()
                }],
                decryption: Some("none"),
                fallbacks: vec![
                    Fallback {
                        path: None,
                        dest: PLAIN_PORT,
                    },
                    Fallback {
                        path: Some(VLESS_PATH),
                        dest: VLESS_WS_PORT,
                    },
                    Fallback {
                        path: Some(VMESS_PATH),
                        dest: VMESS_WS_PORT,
                    },
                    Fallback {
                        path: Some(TROJAN_PATH),
                        dest: TROJAN_WS_PORT,
                    },
                ],
            },
            stream_settings: StreamSettings {
                network: "tcp",
                security: None,
                ws_settings: None,
            },
            sniffing: None,
        };

        let plain = Inbound {
            port: PLAIN_PORT,
            listen: Some(LOOPBACK),
            protocol: "vless",
            settings: InboundSettings {
                clients: vec![ClientEntry {
                    id: id(),
                    ..ClientEntry::default()
                }],
                decryption: Some("none"),
                fallbacks: Vec::new(),
            },
            stream_settings: StreamSettings {
                network: "tcp",
                security: Some("none"),
                ws_settings: None,
            },
            sniffing: None,
        };

        let vless_ws = Inbound {
            port: VLESS_WS_PORT,
            listen: Some(LOOPBACK),
            protocol: "vless",
            settings: InboundSettings {
                clients: vec![ClientEntry {
                    id: id(),
                    level: Some(0),
                    ..ClientEntry::default()
                }],
                decryption: Some("none"),
                fallbacks: Vec::new(),
            },
            stream_settings: websocket(Some("none"), VLESS_PATH),
            sniffing: sniffing(),
        };

        let vmess_ws = Inbound {
            port: VMESS_WS_PORT,
            listen: Some(LOOPBACK),
            protocol: "vmess",
            settings: InboundSettings {
                clients: vec![ClientEntry {
                    id: id(),
                    alter_id: Some(0),
                    ..ClientEntry::default()
                }],
                decryption: None,
                fallbacks: Vec::new(),
            },
            stream_settings: websocket(None, VMESS_PATH),
            sniffing: sniffing(),
        };

        let trojan_ws = Inbound {
            port: TROJAN_WS_PORT,
            listen: Some(LOOPBACK),
            protocol: "trojan",
            settings: InboundSettings {
                clients: vec![ClientEntry {
                    password: Some(uuid.to_owned()),
                    ..ClientEntry::default()
                }],
                decryption: None,
                fallbacks: Vec::new(),
            },
            stream_settings: websocket(Some("none"), TROJAN_PATH),
            sniffing: sniffing(),
        };

        Self {
            log: LogSection {
                access: DISCARD,
                error: DISCARD,
                loglevel: "none",
            },
            inbounds: vec![edge, plain, vless_ws, vmess_ws, trojan_ws],
            dns: DnsSection {
                servers: [DNS_SERVER],
            },
            outbounds: vec![
                Outbound {
                    protocol: "freedom",
                    tag: "direct",
                },
                Outbound {
                    protocol: "blackhole",
                    tag: "block",
                },
            ],
        }
    }

    /// Ports of every listener, edge first.
    #[must_use]
    pub fn ports(&self) -> Vec<u16> {
        self.inbounds.iter().map(|inbound| inbound.port).collect()
    }

    /// Serializes the document as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
