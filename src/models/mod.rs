// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

pub mod agent;
pub mod catalog;
pub mod indexer;
pub mod rate_limit;
pub mod scraper;
pub mod search;
pub mod version;
