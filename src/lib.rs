//! Workspace root. The library crates live under `crates/`.
