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

//! VNC Remote Framebuffer (RFB) protocol constants and structures.
//!
//! This module provides the building blocks for the wire protocol: message
//! types, encoding identifiers, the client pixel format, and the fixed
//! handshake payloads. It implements the subset of RFC 6143 the game server
//! speaks.
//!
//! # Protocol Overview
//!
//! The RFB protocol operates in the following phases:
//! 1. **Protocol Version** - Server and client agree on protocol version
//! 2. **Security Handshake** - Authentication method selection (only "None")
//! 3. **Initialization** - Exchange of framebuffer parameters
//! 4. **Normal Operation** - Input events and framebuffer updates

use bytes::{BufMut, BytesMut};

/// The RFB protocol version string advertised by the server.
///
/// The version string must be exactly 12 bytes including the newline
/// character as specified by the RFB protocol.
pub const PROTOCOL_VERSION: &str = "RFB 003.008\n";

/// Framebuffer width in pixels. The game screen never resizes.
pub const FB_WIDTH: u16 = 512;

/// Framebuffer height in pixels.
pub const FB_HEIGHT: u16 = 384;

/// Desktop name announced in ServerInit.
pub const DESKTOP_NAME: &str = "VNCSlots";

// Client-to-Server Message Types

/// Message type: Client requests to change the pixel format.
pub const CLIENT_MSG_SET_PIXEL_FORMAT: u8 = 0;

/// Message type: Client specifies supported encodings.
pub const CLIENT_MSG_SET_ENCODINGS: u8 = 2;

/// Message type: Client requests a framebuffer update.
pub const CLIENT_MSG_FRAMEBUFFER_UPDATE_REQUEST: u8 = 3;

/// Message type: Client sends a keyboard event.
pub const CLIENT_MSG_KEY_EVENT: u8 = 4;

/// Message type: Client sends a pointer (mouse) event.
pub const CLIENT_MSG_POINTER_EVENT: u8 = 5;

/// Message type: Client sends cut text (clipboard data).
pub const CLIENT_MSG_CLIENT_CUT_TEXT: u8 = 6;

// Server-to-Client Message Types

/// Message type: Server sends a framebuffer update.
pub const SERVER_MSG_FRAMEBUFFER_UPDATE: u8 = 0;

/// Message type: Server sets colour map entries (paletted clients only).
pub const SERVER_MSG_SET_COLOUR_MAP_ENTRIES: u8 = 1;

/// Message type: Server sends a bell (beep) notification.
///
/// Emitted as the payout chime whenever the profit counter changes.
pub const SERVER_MSG_BELL: u8 = 2;

/// Message type: Server sends cut text (clipboard data).
pub const SERVER_MSG_SERVER_CUT_TEXT: u8 = 3;

// Encoding Types (wire identifiers from SetEncodings)

/// Encoding type: Raw pixel data. Always supported, never negotiated away.
pub const ENCODING_RAW: i32 = 0;

/// Encoding type: Copy Rectangle. Recorded but never emitted.
pub const ENCODING_COPYRECT: i32 = 1;

/// Encoding type: Rise-and-Run-length Encoding.
pub const ENCODING_RRE: i32 = 2;

/// Encoding type: Hextile (16x16 tiled RRE with carried colors).
pub const ENCODING_HEXTILE: i32 = 5;

/// Encoding type: Tile Run-Length Encoding. Recorded but never emitted.
pub const ENCODING_TRLE: i32 = 15;

/// Encoding type: Zlib-compressed TRLE. Recorded but never emitted.
pub const ENCODING_ZRLE: i32 = 16;

/// Pseudo-encoding: client-side cursor shape.
pub const ENCODING_CURSOR: i32 = -239;

/// Pseudo-encoding: Desktop Size. Ignored; the screen never resizes.
pub const ENCODING_DESKTOP_SIZE: i32 = -223;

// Hextile subencoding flags

/// Hextile: Raw pixel data for this tile.
pub const HEXTILE_RAW: u8 = 1 << 0;

/// Hextile: Background color is specified.
pub const HEXTILE_BACKGROUND_SPECIFIED: u8 = 1 << 1;

/// Hextile: Foreground color is specified.
pub const HEXTILE_FOREGROUND_SPECIFIED: u8 = 1 << 2;

/// Hextile: Tile contains subrectangles.
pub const HEXTILE_ANY_SUBRECTS: u8 = 1 << 3;

/// Hextile: Subrectangles carry their own color.
pub const HEXTILE_SUBRECTS_COLOURED: u8 = 1 << 4;

// Fixed handshake payloads

/// Security types message: one type offered, "None".
pub const SECURITY_TYPES: [u8; 2] = [0x01, 0x01];

/// SecurityResult message: OK.
pub const SECURITY_RESULT_OK: [u8; 4] = [0x00, 0x00, 0x00, 0x00];

/// The ServerCutText reply sent when the COPY hotspot is clicked.
///
/// Message header (type, padding, length 40) followed by the project URL.
pub const COPY_URL_MESSAGE: [u8; 48] = [
    0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 40, // header
    b'h', b't', b't', b'p', b's', b':', b'/', b'/', b'g', b'i', b't', b'h', b'u', b'b', b'.',
    b'c', b'o', b'm', b'/', b'g', b'r', b'e', b'g', b'-', b'k', b'e', b'n', b'n', b'e', b'd',
    b'y', b'/', b'V', b'N', b'C', b'S', b'l', b'o', b't', b's',
];

/// A client's pixel layout, slightly cooked for the encoder.
///
/// The wire carries per-channel `max` values; we store the equivalent
/// divisor `65536 / (max + 1)` instead so [`crate::encoding`] can compose a
/// pixel with three divides and three shifts. Divisors are kept as `u32`
/// because a `max` of zero cooks to 65536, which does not fit in u16.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFormat {
    /// Bits per pixel on the wire. Anything other than 8 or 16 is emitted
    /// as 32 bits.
    pub bpp: u8,
    /// Most significant byte first when true.
    pub big_endian: bool,
    /// True-colour flag; paletted clients get a colour map message instead.
    pub true_color: bool,
    /// Divisor for the 16-bit red palette intensity.
    pub red_div: u32,
    /// Divisor for the 16-bit green palette intensity.
    pub green_div: u32,
    /// Divisor for the 16-bit blue palette intensity.
    pub blue_div: u32,
    /// Left shift applied to the scaled red value.
    pub red_shift: u8,
    /// Left shift applied to the scaled green value.
    pub green_shift: u8,
    /// Left shift applied to the scaled blue value.
    pub blue_shift: u8,
}

impl PixelFormat {
    /// The canonical BGR-233 layout announced in ServerInit, and the format
    /// every client starts in until it sends SetPixelFormat.
    #[must_use]
    pub fn bgr233() -> Self {
        Self {
            bpp: 8,
            big_endian: true,
            true_color: true,
            red_div: 65536 / 8,
            green_div: 65536 / 8,
            blue_div: 65536 / 4,
            red_shift: 0,
            green_shift: 3,
            blue_shift: 6,
        }
    }

    /// Parses the 16-byte wire pixel format, converting each channel `max`
    /// to its divisor. The depth byte and padding are ignored.
    #[must_use]
    pub fn from_wire(buf: &[u8; 16]) -> Self {
        let div = |hi: u8, lo: u8| 65536 / (1 + u32::from(u16::from_be_bytes([hi, lo])));
        Self {
            bpp: buf[0],
            big_endian: buf[2] != 0,
            true_color: buf[3] != 0,
            red_div: div(buf[4], buf[5]),
            green_div: div(buf[6], buf[7]),
            blue_div: div(buf[8], buf[9]),
            red_shift: buf[10],
            green_shift: buf[11],
            blue_shift: buf[12],
        }
    }

    /// Bytes per pixel as the encoding size comparisons count them.
    #[must_use]
    pub fn bytes_per_pixel(&self) -> usize {
        usize::from(self.bpp) / 8
    }

    /// True when raw encoding can copy framebuffer rows without conversion:
    /// the client is either paletted, or asked for exactly our BGR-233
    /// layout.
    #[must_use]
    pub fn is_native_bgr233(&self) -> bool {
        self.bpp == 8
            && (!self.true_color
                || (self.red_div == 65536 / 8
                    && self.red_shift == 0
                    && self.green_div == 65536 / 8
                    && self.green_shift == 3
                    && self.blue_div == 65536 / 4
                    && self.blue_shift == 6))
    }
}

/// The set of rectangle encodings a client has negotiated.
///
/// Raw is always available and has no bit. CopyRect, TRLE and ZRLE are
/// tracked for completeness but the update path never selects them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodingSet(u8);

impl EncodingSet {
    const COPYRECT: u8 = 1 << 0;
    const RRE: u8 = 1 << 1;
    const HEXTILE: u8 = 1 << 2;
    const TRLE: u8 = 1 << 3;
    const ZRLE: u8 = 1 << 4;
    const CURSOR: u8 = 1 << 5;

    /// Empties the set; called at the start of every SetEncodings message.
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Records one wire encoding identifier. Unknown identifiers (and Raw,
    /// which is implicit) are ignored.
    pub fn insert_wire(&mut self, encoding: i32) {
        match encoding {
            ENCODING_COPYRECT => self.0 |= Self::COPYRECT,
            ENCODING_RRE => self.0 |= Self::RRE,
            ENCODING_HEXTILE => self.0 |= Self::HEXTILE,
            ENCODING_TRLE => self.0 |= Self::TRLE,
            ENCODING_ZRLE => self.0 |= Self::ZRLE,
            ENCODING_CURSOR => self.0 |= Self::CURSOR,
            _ => {}
        }
    }

    /// Whether the client negotiated RRE.
    #[must_use]
    pub fn rre(&self) -> bool {
        self.0 & Self::RRE != 0
    }

    /// Whether the client negotiated Hextile.
    #[must_use]
    pub fn hextile(&self) -> bool {
        self.0 & Self::HEXTILE != 0
    }

    /// Whether the client negotiated the cursor pseudo-encoding.
    #[must_use]
    pub fn cursor(&self) -> bool {
        self.0 & Self::CURSOR != 0
    }
}

/// The `ServerInit` message sent once security negotiation is complete.
///
/// Announces the fixed 512x384 screen, the BGR-233 pixel format, and the
/// desktop name.
#[derive(Debug)]
pub struct ServerInit;

impl ServerInit {
    /// Serializes the message: width, height, 16-byte pixel format, name
    /// length, name.
    pub fn write_to(buf: &mut BytesMut) {
        buf.put_u16(FB_WIDTH);
        buf.put_u16(FB_HEIGHT);
        // bpp, depth, big-endian, true-colour
        buf.put_u8(8);
        buf.put_u8(8);
        buf.put_u8(1);
        buf.put_u8(1);
        // channel maxima and shifts for BGR-233
        buf.put_u16(7);
        buf.put_u16(7);
        buf.put_u16(3);
        buf.put_u8(0);
        buf.put_u8(3);
        buf.put_u8(6);
        buf.put_bytes(0, 3); // padding
        let name = DESKTOP_NAME.as_bytes();
        buf.put_u32(name.len() as u32);
        buf.put_slice(name);
    }
}
