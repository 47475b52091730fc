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

//! Cursor pseudo-rectangle: a fixed 17x22 hand cursor pushed to clients
//! that negotiate the Cursor pseudo-encoding.

use bytes::{BufMut, BytesMut};

use super::common::put_pixel;
use crate::framebuffer::Palette;
use crate::protocol::{PixelFormat, ENCODING_CURSOR};

/// Cursor width in pixels.
pub const CURSOR_WIDTH: u16 = 17;

/// Cursor height in pixels.
pub const CURSOR_HEIGHT: u16 = 22;

/// Cursor hotspot, carried in the pseudo-rectangle's x/y fields.
pub const CURSOR_HOTSPOT: (u16, u16) = (5, 1);

// One bit per pixel, MSB first: set bits are white (palette index 0xFF).
const CURSOR_SHAPE: [u8; 47] = [
    0x00, 0x00, 0x03, 0x00, 0x01, 0x80, 0x00, 0xc0, 0x00, 0x60, 0x00, 0x30, 0x00, 0x1b, 0x00,
    0x0d, 0xb0, 0x06, 0xda, 0x03, 0x6d, 0x99, 0xfe, 0xce, 0xff, 0xe3, 0x7f, 0xf0, 0xbf, 0xf8,
    0x7f, 0xfc, 0x1f, 0xfe, 0x0f, 0xfe, 0x03, 0xff, 0x01, 0xff, 0x80, 0x7f, 0x80, 0x3f, 0xc0,
    0x00, 0x00,
];

// Transparency (AND) mask, three bytes per row, sent verbatim.
const CURSOR_MASK: [u8; 66] = [
    0x06, 0x00, 0x00, 0x0f, 0x00, 0x00, 0x0f, 0x00, 0x00, 0x0f, 0x00, 0x00, 0x0f, 0x00, 0x00,
    0x0f, 0xc0, 0x00, 0x0f, 0xf8, 0x00, 0x0f, 0xfe, 0x00, 0x0f, 0xff, 0x00, 0xef, 0xff, 0x80,
    0xff, 0xff, 0x80, 0xff, 0xff, 0x80, 0x7f, 0xff, 0x80, 0x3f, 0xff, 0x80, 0x3f, 0xff, 0x80,
    0x1f, 0xff, 0x80, 0x1f, 0xff, 0x00, 0x0f, 0xff, 0x00, 0x0f, 0xff, 0x00, 0x07, 0xfe, 0x00,
    0x07, 0xfe, 0x00, 0x07, 0xfe, 0x00,
];

/// Appends the complete cursor pseudo-rectangle: header (hotspot in x/y,
/// cursor size, pseudo-encoding tag), shape pixels in the client's format,
/// then the AND mask.
pub fn encode(buf: &mut BytesMut, format: &PixelFormat, palette: &Palette) {
    buf.put_u16(CURSOR_HOTSPOT.0);
    buf.put_u16(CURSOR_HOTSPOT.1);
    buf.put_u16(CURSOR_WIDTH);
    buf.put_u16(CURSOR_HEIGHT);
    buf.put_i32(ENCODING_CURSOR);

    for i in 0..usize::from(CURSOR_WIDTH) * usize::from(CURSOR_HEIGHT) {
        let set = CURSOR_SHAPE[i / 8] & (1 << (7 - (i % 8))) != 0;
        put_pixel(buf, format, palette, if set { 0xFF } else { 0x00 });
    }

    buf.put_slice(&CURSOR_MASK);
}
