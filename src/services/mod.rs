// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

pub mod admin_auth;
pub mod aggregator;
pub mod cache;
pub mod catalog;
pub mod indexer_worker;
pub mod indexing;
pub mod logging;
pub mod metrics;
pub mod provider;
pub mod rate_limit_middleware;
pub mod rate_limiter;
pub mod scraper;
pub mod scraper_registry;
pub mod search;
pub mod soundcloud;
pub mod youtube;
