use serde::Serialize;

use crate::{conf::Conf, ping, query, share::epoch_millis, McstatError};

/// Normalized status record produced by every probe method.
///
/// Fields a protocol does not report stay `None` so "no data" is never
/// mistaken for "zero players". Only [latency_ms](Self::latency_ms) is
/// guaranteed to be present: it is measured on every probe, including
/// otherwise degenerate responses.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerStatus {
    /// Message of the day. The modern ping passes structured chat
    /// components through as their JSON text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gametype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Round-trip latency in milliseconds. Which round trip is measured is
    /// protocol-dependent; see the individual probe methods.
    pub latency_ms: u64,
    /// Online player names, possibly empty. Modern ping and full query only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub players: Option<Vec<String>>,
    /// Installed plugins. Full query only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugins: Option<Vec<String>>,
    /// Raw request/response bytes, present when debug mode was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugPayload>,
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?
        )
    }
}

/// Raw wire bytes of one probe, for debugging against live servers.
#[derive(Debug, Clone, Serialize)]
pub struct DebugPayload {
    pub request: Vec<u8>,
    pub response: Vec<u8>,
}

/// The four supported probe protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProbeMethod {
    /// Pre-1.7 Server List Ping over TCP.
    LegacyPing,
    /// 1.7+ Server List Ping over TCP.
    ModernPing,
    /// UT3 basic stat query over UDP.
    BasicQuery,
    /// UT3 full stat query over UDP.
    FullQuery,
}

impl ProbeMethod {
    /// Human-readable method label recorded in probe history.
    pub fn name(self) -> &'static str {
        match self {
            Self::LegacyPing => "Server List Ping",
            Self::ModernPing => "Server List Ping 1.7",
            Self::BasicQuery => "Basic Query",
            Self::FullQuery => "Full Query",
        }
    }

    fn execute(self, conf: &Conf) -> Result<ServerStatus, McstatError> {
        match self {
            Self::LegacyPing => ping::legacy::ping(conf),
            Self::ModernPing => ping::modern::ping(conf),
            Self::BasicQuery => query::basic_query(conf),
            Self::FullQuery => query::full_query(conf),
        }
    }
}

impl std::fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Run one probe against the target, failing loudly on any protocol error.
///
/// This is the raw entry point; [Status] wraps it with history keeping and
/// the never-fails-past-the-dispatcher boundary.
pub fn probe(conf: &Conf, method: ProbeMethod) -> Result<ServerStatus, McstatError> {
    method.execute(conf)
}

/// One history entry per probe attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeRecord {
    pub timestamp_ms: u64,
    pub method: ProbeMethod,
    pub hostname: String,
    pub port: u16,
    pub outcome: ProbeOutcome,
}

/// What a recorded probe attempt produced.
#[derive(Debug, Clone, Serialize)]
pub enum ProbeOutcome {
    Success(ServerStatus),
    Failure {
        kind: &'static str,
        message: String,
    },
}

/// Probe dispatcher for monitoring callers.
///
/// Converts protocol failures into a `None` sentinel plus a recorded last
/// error, so callers branch on a single value instead of error types.
/// History is append-only and bounded only by the dispatcher's lifetime;
/// callers needing bounded memory recycle the instance. Not internally
/// synchronized: share one instance across threads only behind a lock.
pub struct Status {
    conf: Conf,
    last_error: Option<String>,
    history: Vec<ProbeRecord>,
}

impl Status {
    pub fn new(hostname: &str, port: u16) -> Self {
        Self::with_conf(Conf::create_with_port(hostname, port))
    }

    pub fn with_conf(conf: Conf) -> Self {
        Self {
            conf,
            last_error: None,
            history: Vec::new(),
        }
    }

    /// Run the given probe method and record the outcome.
    ///
    /// Returns `None` on any failure; the failure's message is then
    /// available from [last_error](Self::last_error).
    pub fn probe(&mut self, method: ProbeMethod) -> Option<ServerStatus> {
        let result = probe(&self.conf, method);
        let outcome = match &result {
            Ok(status) => ProbeOutcome::Success(status.clone()),
            Err(err) => ProbeOutcome::Failure {
                kind: err.kind(),
                message: err.to_string(),
            },
        };

        self.history.push(ProbeRecord {
            timestamp_ms: epoch_millis(),
            method,
            hostname: self.conf.host.clone(),
            port: self.conf.port,
            outcome,
        });

        match result {
            Ok(status) => Some(status),
            Err(err) => {
                tracing::debug!(method = method.name(), error = %err, "probe failed");
                self.last_error = Some(err.to_string());

                None
            }
        }
    }

    /// Server List Ping; `legacy` selects the pre-1.7 protocol.
    pub fn ping(&mut self, legacy: bool) -> Option<ServerStatus> {
        if legacy {
            self.probe(ProbeMethod::LegacyPing)
        } else {
            self.probe(ProbeMethod::ModernPing)
        }
    }

    /// UT3 query; `full` selects the full stat variant.
    pub fn query(&mut self, full: bool) -> Option<ServerStatus> {
        if full {
            self.probe(ProbeMethod::FullQuery)
        } else {
            self.probe(ProbeMethod::BasicQuery)
        }
    }

    /// Message of the most recent failure, overwritten on each new one.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn history(&self) -> &[ProbeRecord] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_labels_are_stable() {
        assert_eq!(ProbeMethod::LegacyPing.name(), "Server List Ping");
        assert_eq!(ProbeMethod::ModernPing.name(), "Server List Ping 1.7");
        assert_eq!(ProbeMethod::BasicQuery.name(), "Basic Query");
        assert_eq!(ProbeMethod::FullQuery.name(), "Full Query");
    }

    #[test]
    fn absent_fields_are_skipped_in_json() {
        let status = ServerStatus {
            player_count: Some(3),
            latency_ms: 12,
            ..ServerStatus::default()
        };
        let json = serde_json::to_value(&status).unwrap();

        assert_eq!(json["player_count"], 3);
        assert_eq!(json["latency_ms"], 12);
        assert!(json.get("player_max").is_none());
        assert!(json.get("motd").is_none());
    }
}
