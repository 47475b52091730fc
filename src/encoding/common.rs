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

//! Pixel composition shared across all rectangle encodings.

use bytes::{BufMut, BytesMut};

use crate::framebuffer::Palette;
use crate::protocol::PixelFormat;

/// Converts one palette index to its wire representation under the client's
/// pixel format and appends it to `buf`.
///
/// The palette intensities are scaled down by the per-channel divisor and
/// packed with the per-channel shift. A shift that pushes a channel past the
/// 32-bit word drops that channel rather than wrapping.
#[inline]
pub fn put_pixel(buf: &mut BytesMut, format: &PixelFormat, palette: &Palette, index: u8) {
    let i = usize::from(index);
    let channel = |value: u16, div: u32, shift: u8| {
        (u32::from(value) / div)
            .checked_shl(u32::from(shift))
            .unwrap_or(0)
    };
    let pixel = channel(palette.red[i], format.red_div, format.red_shift)
        | channel(palette.green[i], format.green_div, format.green_shift)
        | channel(palette.blue[i], format.blue_div, format.blue_shift);

    match format.bpp {
        8 => buf.put_u8(pixel as u8),
        16 => {
            if format.big_endian {
                buf.put_u16(pixel as u16);
            } else {
                buf.put_u16_le(pixel as u16);
            }
        }
        _ => {
            if format.big_endian {
                buf.put_u32(pixel);
            } else {
                buf.put_u32_le(pixel);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr233_is_the_identity() {
        let palette = Palette::bgr233();
        let format = PixelFormat::bgr233();
        let mut buf = BytesMut::new();
        for i in 0..=255u8 {
            buf.clear();
            put_pixel(&mut buf, &format, &palette, i);
            assert_eq!(&buf[..], &[i]);
        }
    }

    #[test]
    fn sixteen_bit_respects_endianness() {
        let palette = Palette::bgr233();
        // RGB565, red in the high bits
        let mut format = PixelFormat {
            bpp: 16,
            big_endian: true,
            true_color: true,
            red_div: 65536 / 32,
            green_div: 65536 / 64,
            blue_div: 65536 / 32,
            red_shift: 11,
            green_shift: 5,
            blue_shift: 0,
        };
        // index 7: full red, no green, no blue
        let mut buf = BytesMut::new();
        put_pixel(&mut buf, &format, &palette, 0x07);
        assert_eq!(&buf[..], &[0xF8, 0x00]);

        format.big_endian = false;
        buf.clear();
        put_pixel(&mut buf, &format, &palette, 0x07);
        assert_eq!(&buf[..], &[0x00, 0xF8]);
    }

    #[test]
    fn oversized_shift_drops_channel() {
        let palette = Palette::bgr233();
        let mut format = PixelFormat::bgr233();
        format.bpp = 32;
        format.red_shift = 40;
        let mut buf = BytesMut::new();
        put_pixel(&mut buf, &format, &palette, 0xFF);
        // red gone, green and blue still packed
        assert_eq!(buf.len(), 4);
    }
}
