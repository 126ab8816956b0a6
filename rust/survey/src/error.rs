// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for survey operations.
//!
//! Geometry problems never show up here: degenerate input degrades to "no
//! value" inside the engines. What remains are failures the caller must see,
//! chiefly from the storage collaborator.

use crate::ids::WallId;

/// Result type alias for survey operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during survey operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A referenced wall is not in the repository.
    #[error("wall not found: {0}")]
    WallNotFound(WallId),

    /// Uploading an image blob failed.
    #[error("image upload failed: {0}")]
    Upload(String),

    /// Writing or deleting a record failed.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// The image-processing collaborator failed.
    #[error("image processing failed: {0}")]
    Processing(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
