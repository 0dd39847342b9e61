use std::fmt;

use crate::value::ProbeValue;

/// Role of the server the collector is connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopologyRole {
    Standalone,
    ReplicatedPrimary,
    ReplicatedSecondary,
    /// Replica set member in any other state (arbiter, recovering, ...).
    ReplicatedOther,
    RoutingTier,
    ConfigServer,
}

impl TopologyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standalone => "standalone",
            Self::ReplicatedPrimary => "replicatedPrimary",
            Self::ReplicatedSecondary => "replicatedSecondary",
            Self::ReplicatedOther => "replicatedOther",
            Self::RoutingTier => "routingTier",
            Self::ConfigServer => "configServer",
        }
    }
}

impl fmt::Display for TopologyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopologyClassification {
    pub role: TopologyRole,
    /// State string the role was derived from, e.g. `"SECONDARY"` or `"mongos"`.
    pub state: String,
    pub raw: ProbeValue,
}

impl TopologyClassification {
    pub fn standalone() -> Self {
        Self {
            role: TopologyRole::Standalone,
            state: "standalone".into(),
            raw: ProbeValue::Null,
        }
    }

    /// Value recorded in the report for the classification probe.
    pub fn to_value(&self) -> ProbeValue {
        ProbeValue::document([
            ("role", ProbeValue::from(self.role.as_str())),
            ("state", ProbeValue::from(self.state.as_str())),
            ("raw", self.raw.clone()),
        ])
    }
}

/// Classify from a replica-set status reply.
///
/// With `ok` set, the `stateStr` of the member flagged `self` wins, then
/// `myState`. Without it, a short `info` string (`"mongos"`, `"configsvr"`)
/// is the state; anything else is a standalone server.
pub fn classify_status(raw: ProbeValue) -> TopologyClassification {
    let state = if raw.get("ok").is_some_and(ProbeValue::is_truthy) {
        self_state_str(&raw)
            .or_else(|| raw.get("myState").and_then(state_from_code))
            .unwrap_or_default()
    } else {
        raw.get("info")
            .and_then(ProbeValue::as_str)
            .filter(|info| !info.is_empty() && info.chars().count() < 20)
            .map(str::to_string)
            .unwrap_or_else(|| "standalone".to_string())
    };

    let role = match state.as_str() {
        "mongos" => TopologyRole::RoutingTier,
        "configsvr" => TopologyRole::ConfigServer,
        "PRIMARY" => TopologyRole::ReplicatedPrimary,
        "SECONDARY" => TopologyRole::ReplicatedSecondary,
        "STARTUP" | "STARTUP2" | "RECOVERING" | "ARBITER" | "DOWN" | "ROLLBACK" | "REMOVED"
        | "UNKNOWN" => TopologyRole::ReplicatedOther,
        other => {
            if other != "standalone" {
                tracing::debug!(state = %other, "Unrecognised topology state, assuming standalone");
            }
            TopologyRole::Standalone
        }
    };

    TopologyClassification { role, state, raw }
}

fn self_state_str(raw: &ProbeValue) -> Option<String> {
    raw.get("members")?
        .as_array()?
        .iter()
        .find(|m| m.get("self").is_some_and(ProbeValue::is_truthy))?
        .get("stateStr")?
        .as_str()
        .map(str::to_string)
}

fn state_from_code(code: &ProbeValue) -> Option<String> {
    let name = match code.as_i64()? {
        0 => "STARTUP",
        1 => "PRIMARY",
        2 => "SECONDARY",
        3 => "RECOVERING",
        5 => "STARTUP2",
        6 => "UNKNOWN",
        7 => "ARBITER",
        8 => "DOWN",
        9 => "ROLLBACK",
        10 => "REMOVED",
        _ => return None,
    };
    Some(name.to_string())
}
