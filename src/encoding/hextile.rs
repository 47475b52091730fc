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

//! VNC Hextile encoding implementation.
//!
//! Hextile divides the rectangle into 16x16 tiles and encodes each
//! independently as background + foreground + subrectangles, carrying the
//! background and foreground colors from tile to tile. A tile that encodes
//! larger than its raw pixels is rewound and emitted raw.

use bytes::{BufMut, BytesMut};

use super::common::put_pixel;
use crate::framebuffer::{Image, Palette};
use crate::protocol::{
    PixelFormat, HEXTILE_ANY_SUBRECTS, HEXTILE_BACKGROUND_SPECIFIED,
    HEXTILE_FOREGROUND_SPECIFIED, HEXTILE_RAW, HEXTILE_SUBRECTS_COLOURED,
};

/// Encodes a framebuffer region as Hextile, tiles left-to-right then
/// top-to-bottom.
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
    let bytes_pp = format.bytes_per_pixel();

    // bg/fg carry across tiles within one encode call
    let mut background: Option<u8> = None;
    let mut foreground: Option<u8> = None;

    let mut ty = y;
    let mut rows_left = h;
    while rows_left > 0 {
        let th = rows_left.min(16);

        let mut tx = x;
        let mut cols_left = w;
        while cols_left > 0 {
            let tw = cols_left.min(16);

            // pigeonhole histogram of the tile
            let mut colors = [0u16; 256];
            for j in 0..th {
                for i in 0..tw {
                    colors[usize::from(fb.px(tx + i, ty + j))] += 1;
                }
            }

            // most frequent color and runner-up
            let mut newbg: Option<usize> = None;
            let mut newfg: Option<usize> = None;
            let mut color_count = 0u16;
            for (i, &count) in colors.iter().enumerate() {
                if count == 0 {
                    continue;
                }
                color_count += 1;
                if newbg.is_none_or(|bg| count > colors[bg]) {
                    newfg = newbg;
                    newbg = Some(i);
                } else if newfg.is_none_or(|fg| count > colors[fg]) {
                    newfg = Some(i);
                }
            }
            let bg = newbg.expect("tile is non-empty") as u8;

            // rewind point if this tile ends up worse than raw
            let tile_start = buf.len();

            if color_count == 1 {
                // solid tile
                if Some(bg) == background {
                    buf.put_u8(0);
                } else {
                    buf.put_u8(HEXTILE_BACKGROUND_SPECIFIED);
                    put_pixel(buf, format, palette, bg);
                    background = Some(bg);
                }
            } else {
                if color_count == 2 {
                    let fg = newfg.expect("two colors counted") as u8;
                    match (Some(bg) == background, Some(fg) == foreground) {
                        (true, true) => buf.put_u8(HEXTILE_ANY_SUBRECTS),
                        (false, true) => {
                            buf.put_u8(HEXTILE_ANY_SUBRECTS | HEXTILE_BACKGROUND_SPECIFIED);
                            put_pixel(buf, format, palette, bg);
                            background = Some(bg);
                        }
                        (true, false) => {
                            buf.put_u8(HEXTILE_ANY_SUBRECTS | HEXTILE_FOREGROUND_SPECIFIED);
                            put_pixel(buf, format, palette, fg);
                            foreground = Some(fg);
                        }
                        (false, false) => {
                            buf.put_u8(
                                HEXTILE_ANY_SUBRECTS
                                    | HEXTILE_FOREGROUND_SPECIFIED
                                    | HEXTILE_BACKGROUND_SPECIFIED,
                            );
                            put_pixel(buf, format, palette, bg);
                            background = Some(bg);
                            put_pixel(buf, format, palette, fg);
                            foreground = Some(fg);
                        }
                    }
                } else {
                    // every subrectangle carries its own color
                    if Some(bg) == background {
                        buf.put_u8(HEXTILE_ANY_SUBRECTS | HEXTILE_SUBRECTS_COLOURED);
                    } else {
                        buf.put_u8(
                            HEXTILE_ANY_SUBRECTS
                                | HEXTILE_SUBRECTS_COLOURED
                                | HEXTILE_BACKGROUND_SPECIFIED,
                        );
                        put_pixel(buf, format, palette, bg);
                        background = Some(bg);
                    }
                    foreground = None;
                }

                let count_pos = buf.len();
                buf.put_u8(0);

                // RRE scan of the tile: expand right, then down
                let mut coverage = [[false; 16]; 16];
                for j in 0..th {
                    for i in 0..tw {
                        if coverage[j][i] {
                            continue;
                        }
                        coverage[j][i] = true;

                        let color = fb.px(tx + i, ty + j);
                        if color == bg {
                            continue;
                        }
                        buf[count_pos] += 1;

                        let mut i2 = i + 1;
                        while i2 < tw && fb.px(tx + i2, ty + j) == color {
                            coverage[j][i2] = true;
                            i2 += 1;
                        }

                        let mut j2 = j + 1;
                        while j2 < th {
                            let full_row = (i..i2).all(|q| fb.px(tx + q, ty + j2) == color);
                            if !full_row {
                                break;
                            }
                            for q in i..i2 {
                                coverage[j2][q] = true;
                            }
                            j2 += 1;
                        }

                        if color_count > 2 {
                            put_pixel(buf, format, palette, color);
                        }
                        buf.put_u8((((i as u8) & 0xF) << 4) | ((j as u8) & 0xF));
                        buf.put_u8(((((i2 - i - 1) as u8) & 0xF) << 4) | (((j2 - j - 1) as u8) & 0xF));
                    }
                }
            }

            // worse than raw pixels: rewind and re-emit the tile raw
            if buf.len() - tile_start > tw * th * bytes_pp {
                buf.truncate(tile_start);
                buf.put_u8(HEXTILE_RAW);
                for j in 0..th {
                    for i in 0..tw {
                        put_pixel(buf, format, palette, fb.px(tx + i, ty + j));
                    }
                }
                background = None;
                foreground = None;
            }

            tx += tw;
            cols_left -= tw;
        }
        ty += th;
        rows_left -= th;
    }
}
