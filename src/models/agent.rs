// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use std::env;

/// Agent operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentMode {
    /// Only serve the HTTP search API
    Server,
    /// Only run the scheduled indexer
    Indexer,
    /// Serve the API and run the indexer in the background
    All,
}

impl AgentMode {
    /// Parse agent mode from environment variable
    /// Panics if AGENT_MODE is not set or invalid
    pub fn from_env() -> Self {
        let mode = env::var("AGENT_MODE").expect("AGENT_MODE environment variable must be set");
        Self::parse(&mode)
    }

    /// Parse agent mode from string
    /// Panics if the value is invalid
    fn parse(mode: &str) -> Self {
        match mode {
            "server" => AgentMode::Server,
            "indexer" => AgentMode::Indexer,
            "all" => AgentMode::All,
            _ => panic!(
                "AGENT_MODE must be 'server', 'indexer', or 'all', got: {}",
                mode
            ),
        }
    }

    /// Check if this mode should serve the HTTP API
    pub fn should_serve_api(&self) -> bool {
        matches!(self, AgentMode::Server | AgentMode::All)
    }

    /// Check if this mode should run the indexer worker
    pub fn should_run_indexer(&self) -> bool {
        matches!(self, AgentMode::Indexer | AgentMode::All)
    }
}

impl std::fmt::Display for AgentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentMode::Server => write!(f, "server"),
            AgentMode::Indexer => write!(f, "indexer"),
            AgentMode::All => write!(f, "all"),
        }
    }
}
