//! Node annotation keys
//!
//! The daemon tracks config rollout on the Node object itself: the config the
//! node is running, the config it should be running, and where it is in
//! between.

use std::fmt;
use std::str::FromStr;

/// Name of the `MachineConfig` the node is currently running
pub const CURRENT_CONFIG_ANNOTATION: &str = "dcops.microscaler.io/currentConfig";

/// Name of the `MachineConfig` the node should be running
pub const DESIRED_CONFIG_ANNOTATION: &str = "dcops.microscaler.io/desiredConfig";

/// Rollout state reported by the daemon
pub const STATE_ANNOTATION: &str = "dcops.microscaler.io/state";

/// Rollout state stored under [`STATE_ANNOTATION`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeConfigState {
    /// Current config matches desired config
    #[default]
    Done,

    /// An update is in progress
    Working,

    /// The last update failed and needs operator attention
    Degraded,
}

impl NodeConfigState {
    /// Annotation value for this state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Done => "Done",
            Self::Working => "Working",
            Self::Degraded => "Degraded",
        }
    }
}

impl fmt::Display for NodeConfigState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeConfigState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Done" => Ok(Self::Done),
            "Working" => Ok(Self::Working),
            "Degraded" => Ok(Self::Degraded),
            other => Err(format!("unknown node config state: {other}")),
        }
    }
}
