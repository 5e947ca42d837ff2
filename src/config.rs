// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Session configuration.
//!
//! Sessions are YAML files read through the `config` crate. Any top-level scalar can
//! be overridden from the environment with a `POLYCLICK_` prefix, e.g.
//! `POLYCLICK_TEMPO=90`.

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use tracing::debug;

mod audio;
mod error;
mod layer;
mod session;

pub use audio::{Audio, StreamBufferSize, DEFAULT_SAMPLE_RATE};
pub use error::ConfigError;
pub use layer::Layer;
pub use session::Session;

/// Loads and validates a session file.
pub fn load_session(path: &Path) -> Result<Session, ConfigError> {
    let session: Session = Config::builder()
        .add_source(File::from(path).format(FileFormat::Yaml))
        .add_source(
            Environment::with_prefix("POLYCLICK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let session = session.with_base_dir(base_dir);
    session.validate()?;
    debug!(path = ?path, layers = session.layers().len(), "Loaded session");
    Ok(session)
}
