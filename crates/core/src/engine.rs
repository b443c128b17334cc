//! Upstream engine identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the two upstream LLM services the engine can route to.
///
/// `Lovable` is the OpenAI-compatible AI gateway; `Gemini` is Google's
/// `generateContent` API. Declaration order is the tie-break order used by
/// the selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Lovable,
    Gemini,
}

impl EngineKind {
    /// Every known engine, in tie-break order.
    pub const ALL: [EngineKind; 2] = [EngineKind::Lovable, EngineKind::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Lovable => "lovable",
            EngineKind::Gemini => "gemini",
        }
    }

    /// The engine that is not `self`.
    pub fn other(&self) -> EngineKind {
        match self {
            EngineKind::Lovable => EngineKind::Gemini,
            EngineKind::Gemini => EngineKind::Lovable,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lovable" => Ok(EngineKind::Lovable),
            "gemini" => Ok(EngineKind::Gemini),
            other => Err(format!("unknown engine '{other}' (expected lovable or gemini)")),
        }
    }
}
