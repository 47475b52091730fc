// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # vncslots
//!
//! A slot machine played over the VNC (RFB) protocol.
//!
//! Any VNC viewer can connect; everyone sees the same 512x384 animated
//! machine, and anyone can play it with space/enter/down-arrow or by
//! clicking the handle. The server implements the RFB protocol subset of
//! RFC 6143 a paletted game screen needs: the "None" security handshake,
//! pixel format negotiation, and framebuffer updates in Raw, RRE and
//! Hextile with per-rectangle fallback to whichever is smallest.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                run loop (one task)            │
//! │                                               │
//! │  framebuffer ── palette ── game ── clients    │
//! │       ▲                      │                │
//! │       └── tick (25 Hz) ──────┘                │
//! └───────▲───────────────▲───────────────▲───────┘
//!         │               │               │
//!    acceptor task   reader task     reader task
//!    (per listener)  (client 1) ...  (client N)
//! ```
//!
//! Acceptors and readers only pump I/O into a channel. Every byte of
//! protocol handling, every game step, and every encoded update happens on
//! the run loop, so the shared framebuffer needs no locks.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod encoding;
pub mod error;
pub mod framebuffer;
pub mod game;
pub mod protocol;
pub mod server;

// Re-exports
pub use error::{Result, VncError};
pub use framebuffer::{Image, Palette};
pub use game::{Assets, Game};
pub use protocol::PixelFormat;
pub use server::Server;

/// VNC protocol version.
pub const PROTOCOL_VERSION: &str = "RFB 003.008\n";

/// Default VNC port.
pub const DEFAULT_PORT: u16 = 5900;
