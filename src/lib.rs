// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Hierarchical file groups.
//!
//! Organize arbitrary file and folder references into named, nestable
//! __groups__. Each group carries presentation metadata (icon, color, notes,
//! pin state, badge) and lives in one of two store tiers:
//!
//! 1. __Local__ groups belong to one project root, and are kept in a JSON
//!    artifact inside the project with project-relative member paths.
//! 2. __Global__ groups are available from every project, and are kept in a
//!    JSON artifact in the user's data directory with absolute member paths.
//!
//! Everything goes through one [`Workspace`](workspace::Workspace): it owns
//! both tiers, exposes the read interface, performs tree mutations that keep
//! the forest acyclic and subtrees within one store, and reconciles member
//! paths as the filesystem changes underneath them.

pub mod config;
pub mod group;
pub mod path;
pub mod present;
pub mod probe;
pub mod store;
pub mod workspace;

pub use group::{Group, GroupId, GroupPatch, MemberRef, SortOrder, StoreKey};
pub use workspace::{DeleteOutcome, DropTarget, Outcome, Parent, Rejection, Workspace};
