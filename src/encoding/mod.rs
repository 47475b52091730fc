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

//! VNC rectangle encoders.
//!
//! Each encoder reads a clamped region of the shared framebuffer and
//! appends wire bytes in the client's negotiated pixel format. The
//! top-level [`encode_rect`] tries the client's best compressed encoding
//! and falls back to Raw whenever compression does not actually win.

use bytes::{BufMut, BytesMut};

use crate::framebuffer::{Image, Palette};
use crate::protocol::{EncodingSet, PixelFormat, ENCODING_HEXTILE, ENCODING_RAW, ENCODING_RRE};

pub mod common;
pub mod cursor;
pub mod hextile;
pub mod raw;
pub mod rre;

pub use common::put_pixel;

/// Encodes one rectangle: the 12-byte header (position, size, encoding
/// tag), then the body.
///
/// Preference order is Hextile, then RRE, then Raw. A compressed attempt is
/// kept only if tag byte plus body is no larger than the raw body
/// (`w * h * bytes-per-pixel`); otherwise the buffer is rewound and the
/// next choice tried.
#[allow(clippy::too_many_arguments)]
pub fn encode_rect(
    buf: &mut BytesMut,
    fb: &Image,
    palette: &Palette,
    format: &PixelFormat,
    encodings: EncodingSet,
    x: u16,
    y: u16,
    w: u16,
    h: u16,
) {
    buf.put_u16(x);
    buf.put_u16(y);
    buf.put_u16(w);
    buf.put_u16(h);
    buf.put_bytes(0, 3); // high bytes of the encoding tag

    let (x, y, w, h) = (
        usize::from(x),
        usize::from(y),
        usize::from(w),
        usize::from(h),
    );
    let raw_len = w * h * format.bytes_per_pixel();
    let mark = buf.len();

    if encodings.hextile() {
        buf.put_u8(ENCODING_HEXTILE as u8);
        hextile::encode(buf, fb, palette, format, x, y, w, h);
        if buf.len() - mark <= raw_len {
            return;
        }
        // Hextile made it worse than Raw, toss the attempt
        buf.truncate(mark);
    }

    if encodings.rre() {
        buf.put_u8(ENCODING_RRE as u8);
        rre::encode(buf, fb, palette, format, x, y, w, h);
        if buf.len() - mark <= raw_len {
            return;
        }
        // RRE made it worse than Raw, toss the attempt
        buf.truncate(mark);
    }

    buf.put_u8(ENCODING_RAW as u8);
    raw::encode(buf, fb, palette, format, x, y, w, h);
}
