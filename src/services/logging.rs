// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Tracing setup and anonymization of client identifiers for logs.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Anonymize a rate-limit identifier for logging.
///
/// IPv4 addresses keep their first three octets ("ip:10.0.0.***"), IPv6
/// addresses their first segment, user ids their first character ("user:a***").
pub fn anonymize_identifier(identifier: &str) -> String {
    match identifier.split_once(':') {
        Some(("ip", address)) => format!("ip:{}", anonymize_address(address)),
        Some(("user", id)) => match id.chars().next() {
            Some(first) => format!("user:{}***", first),
            None => "user:***".to_string(),
        },
        _ => "***".to_string(),
    }
}

fn anonymize_address(address: &str) -> String {
    if let Some((prefix, _)) = address.rsplit_once('.') {
        return format!("{}.***", prefix);
    }
    if let Some((first, _)) = address.split_once(':') {
        return format!("{}:***", first);
    }
    "***".to_string()
}
