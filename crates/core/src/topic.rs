// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription topics for server-pushed updates.
//!
//! The topic set is fixed and case-sensitive; the wire names below are the
//! exact strings exchanged with the ERP backend. Subscriptions are re-issued
//! in full on every successful (re)connect, so nothing here persists across
//! a reconnect.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named subscription channel for server-pushed updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    /// Stock level changed.
    #[serde(rename = "stock:updated")]
    StockUpdated,
    /// Material master data changed.
    #[serde(rename = "material:updated")]
    MaterialUpdated,
    /// Order created or changed.
    #[serde(rename = "order:updated")]
    OrderUpdated,
    /// Production status changed.
    #[serde(rename = "production:updated")]
    ProductionUpdated,
    /// Planning data changed.
    #[serde(rename = "planning:updated")]
    PlanningUpdated,
}

impl Topic {
    /// All topics, in subscription order.
    pub const ALL: [Topic; 5] = [
        Topic::StockUpdated,
        Topic::MaterialUpdated,
        Topic::OrderUpdated,
        Topic::ProductionUpdated,
        Topic::PlanningUpdated,
    ];

    /// Returns the wire name of the topic.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::StockUpdated => "stock:updated",
            Topic::MaterialUpdated => "material:updated",
            Topic::OrderUpdated => "order:updated",
            Topic::ProductionUpdated => "production:updated",
            Topic::PlanningUpdated => "planning:updated",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown topic name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown topic: {0}")]
pub struct UnknownTopic(pub String);

impl FromStr for Topic {
    type Err = UnknownTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownTopic(s.to_string()))
    }
}

#[cfg(test)]
#[path = "topic_tests.rs"]
mod tests;
