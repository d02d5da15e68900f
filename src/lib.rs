/*!
# Report Console

Filter engine and download helpers for the lending report console, built in Rust.

## Overview

Every report form in the console collects the same kind of criteria: a branch,
and depending on the report its region, area and cluster, plus an optional status
and date range. The location dropdowns cascade. Picking a branch fills in its
region and cluster, and picking a cluster narrows the regions and branches on offer.

This crate keeps that logic in one place instead of once per form.

## Architecture

### Hierarchy Resolver
- **entity**: `LevelKind` (Cluster → Region → Area → Branch), `Entity`, `StatusOption`
- **hierarchy**: `HierarchyIndex`, built once per form from the dropdown payload by
  `build_index`, which understands every payload shape the report endpoints return
- **selection**: `SelectionState`, `select_at_level` and `options_for`, scoped to a
  report's `ReportLevels`

### Session Layer
- **cache**: the `CachePort` trait standing in for browser session storage, with
  `MemoryCache` and a gzip-compressed `FileCache`; TTL is checked at read time
- **loader**: `HierarchyLoader`, cache check then fetch, one in-flight fetch per form

### Report Layer
- **report**: `ReportProfile` per form (endpoints, cache key, levels, request field
  names) and request body construction
- **downloader**: report rows to XLSX, CSV, or `~`-delimited flat files
- **client**: HTTP client for the reporting API (feature `web`)
- **config**: `ConsoleConfig` from the environment

## Failure Handling

A broken or missing dropdown payload never blocks a form. Bad parent links degrade
the entity to a root and are logged; a failed fetch yields an empty index that is
not cached.

## Binaries

- `cli`: interactive prompt for exploring a report's filters against a payload file
*/

pub mod cache;
#[cfg(feature = "web")]
pub mod client;
pub mod config;
pub mod downloader;
pub mod entity;
pub mod error;
pub mod hierarchy;
pub mod loader;
pub mod report;
pub mod selection;

/// Re-export the resolver surface to make it easier to use
pub use entity::*;
pub use error::*;
pub use hierarchy::{HierarchyIndex, IndexSnapshot, build_index};
pub use selection::{HierarchyResolver, ReportLevels, SelectionState, options_for, select_at_level};
