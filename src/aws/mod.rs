// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cloud client facade: typed API seam plus retry/pagination/metrics
//! middleware.

pub mod api;
pub mod facade;
pub mod fake;
pub mod types;

pub use api::{CloudApi, CloudResult};
pub use facade::Cloud;
