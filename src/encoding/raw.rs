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

//! VNC Raw encoding implementation.
//!
//! The simplest encoding: pixel data in row-major order without compression.
//! High bandwidth but universally supported, and the yardstick the other
//! encodings must beat.

use bytes::{BufMut, BytesMut};

use super::common::put_pixel;
use crate::framebuffer::{Image, Palette};
use crate::protocol::PixelFormat;

/// Encodes a framebuffer region as raw pixels.
///
/// When the client's format is byte-for-byte our own BGR-233 layout (or the
/// client is paletted), rows are copied straight out of the framebuffer.
/// Anything else goes through per-pixel conversion.
#[allow(clippy::too_many_arguments)]
pub fn encode(
    buf: &mut BytesMut,
    fb: &Image,
    palette: &Palette,
    format: &PixelFormat,
    x: usize,
    y: usize,
    w: usize,
    h: usize,
) {
    if format.is_native_bgr233() {
        for row in y..y + h {
            buf.put_slice(fb.row(x, row, w));
        }
    } else {
        for row in y..y + h {
            for col in x..x + w {
                put_pixel(buf, format, palette, fb.px(col, row));
            }
        }
    }
}
