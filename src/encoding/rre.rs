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

//! VNC RRE (Rise-and-Run-length Encoding) implementation.
//!
//! RRE encodes a rectangle as a background color plus a list of
//! subrectangles with their own colors. Effective for the large solid
//! regions this game is made of.

use bytes::{BufMut, BytesMut};

use super::common::put_pixel;
use crate::framebuffer::{Image, Palette};
use crate::protocol::PixelFormat;

/// Encodes a framebuffer region as RRE.
///
/// Wire layout: u32 subrectangle count, background pixel, then per
/// subrectangle a pixel and four u16 values (x, y, w, h) relative to the
/// region's top-left corner.
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
    // subrectangle count is patched in once the scan is done
    let count_pos = buf.len();
    buf.put_u32(0);

    // histogram the region; the most frequent index is the background
    let mut colors = [0u32; 256];
    let mut max_color = 0usize;
    for row in y..y + h {
        for col in x..x + w {
            let c = usize::from(fb.px(col, row));
            colors[c] += 1;
            if colors[c] > colors[max_color] {
                max_color = c;
            }
        }
    }
    let background = max_color as u8;
    put_pixel(buf, format, palette, background);

    let mut covered = vec![false; w * h];
    let mut subrects: u32 = 0;

    for sy in 0..h {
        for sx in 0..w {
            if covered[sy * w + sx] {
                continue;
            }
            covered[sy * w + sx] = true;

            let color = fb.px(x + sx, y + sy);
            if color == background {
                continue;
            }
            subrects += 1;

            // expand right along the row
            let mut sx2 = sx + 1;
            while sx2 < w && fb.px(x + sx2, y + sy) == color {
                covered[sy * w + sx2] = true;
                sx2 += 1;
            }

            // then expand down, whole rows at a time
            let mut sy2 = sy + 1;
            while sy2 < h {
                let full_row = (sx..sx2).all(|q| fb.px(x + q, y + sy2) == color);
                if !full_row {
                    break;
                }
                for q in sx..sx2 {
                    covered[sy2 * w + q] = true;
                }
                sy2 += 1;
            }

            put_pixel(buf, format, palette, color);
            buf.put_u16(sx as u16);
            buf.put_u16(sy as u16);
            buf.put_u16((sx2 - sx) as u16);
            buf.put_u16((sy2 - sy) as u16);
        }
    }

    buf[count_pos..count_pos + 4].copy_from_slice(&subrects.to_be_bytes());
}
