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

//! Sound sources for triggered steps.
//!
//! Each layer owns a [`VoiceBank`]: one one-shot sample slot per [`Role`] and a
//! decaying sine click used for any role that has no sample loaded.
//!
//! [`Role`]: crate::rhythm::Role

mod bank;
mod click;
mod sample;

pub use bank::{Tone, VoiceBank};
pub use click::ClickSynth;
pub use sample::{OneShot, SampleBuffer, SampleError};
