//! Round-trip tests for the rectangle encoders: a reference decoder
//! reconstructs every rectangle pixel-exactly from the encoded bytes, for
//! every client pixel format and encoding combination the server can emit.

use bytes::BytesMut;

use vncslots::encoding::encode_rect;
use vncslots::framebuffer::{Image, Palette};
use vncslots::game::{Assets, Game};
use vncslots::protocol::{
    EncodingSet, PixelFormat, ENCODING_HEXTILE, ENCODING_RRE, HEXTILE_ANY_SUBRECTS,
    HEXTILE_BACKGROUND_SPECIFIED, HEXTILE_FOREGROUND_SPECIFIED, HEXTILE_RAW,
    HEXTILE_SUBRECTS_COLOURED,
};

/// The pixel value `put_pixel` should produce for a palette index.
fn expected_pixel(palette: &Palette, pf: &PixelFormat, index: u8) -> u32 {
    let i = usize::from(index);
    ((u32::from(palette.red[i]) / pf.red_div) << pf.red_shift)
        | ((u32::from(palette.green[i]) / pf.green_div) << pf.green_shift)
        | ((u32::from(palette.blue[i]) / pf.blue_div) << pf.blue_shift)
}

fn read_pixel(data: &[u8], pos: &mut usize, pf: &PixelFormat) -> u32 {
    match pf.bpp {
        8 => {
            let v = u32::from(data[*pos]);
            *pos += 1;
            v
        }
        16 => {
            let b = [data[*pos], data[*pos + 1]];
            *pos += 2;
            u32::from(if pf.big_endian {
                u16::from_be_bytes(b)
            } else {
                u16::from_le_bytes(b)
            })
        }
        _ => {
            let b = [data[*pos], data[*pos + 1], data[*pos + 2], data[*pos + 3]];
            *pos += 4;
            if pf.big_endian {
                u32::from_be_bytes(b)
            } else {
                u32::from_le_bytes(b)
            }
        }
    }
}

fn read_u16(data: &[u8], pos: &mut usize) -> usize {
    let v = u16::from_be_bytes([data[*pos], data[*pos + 1]]);
    *pos += 2;
    usize::from(v)
}

/// Decodes one encoded rectangle (header included) back into a pixel grid.
fn decode_rect(data: &[u8], pf: &PixelFormat) -> (usize, usize, usize, usize, Vec<u32>) {
    let mut pos = 0;
    let x = read_u16(data, &mut pos);
    let y = read_u16(data, &mut pos);
    let w = read_u16(data, &mut pos);
    let h = read_u16(data, &mut pos);
    let tag = i32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
    pos += 4;

    let mut grid = vec![0u32; w * h];
    match tag {
        0 => {
            for cell in grid.iter_mut() {
                *cell = read_pixel(data, &mut pos, pf);
            }
        }
        2 => decode_rre(data, &mut pos, pf, w, h, &mut grid),
        5 => decode_hextile(data, &mut pos, pf, w, h, &mut grid),
        other => panic!("unexpected encoding tag {other}"),
    }
    assert_eq!(pos, data.len(), "decoder must consume every byte");
    (x, y, w, h, grid)
}

fn decode_rre(data: &[u8], pos: &mut usize, pf: &PixelFormat, w: usize, h: usize, grid: &mut [u32]) {
    let count = u32::from_be_bytes([data[*pos], data[*pos + 1], data[*pos + 2], data[*pos + 3]]);
    *pos += 4;
    let background = read_pixel(data, pos, pf);
    grid.fill(background);
    for _ in 0..count {
        let pixel = read_pixel(data, pos, pf);
        let sx = read_u16(data, pos);
        let sy = read_u16(data, pos);
        let sw = read_u16(data, pos);
        let sh = read_u16(data, pos);
        for row in sy..sy + sh {
            grid[row * w + sx..row * w + sx + sw].fill(pixel);
        }
    }
}

fn decode_hextile(
    data: &[u8],
    pos: &mut usize,
    pf: &PixelFormat,
    w: usize,
    h: usize,
    grid: &mut [u32],
) {
    let mut background = 0u32;
    let mut foreground = 0u32;

    let mut ty = 0;
    while ty < h {
        let th = (h - ty).min(16);
        let mut tx = 0;
        while tx < w {
            let tw = (w - tx).min(16);
            let mask = data[*pos];
            *pos += 1;

            if mask & HEXTILE_RAW != 0 {
                for j in 0..th {
                    for i in 0..tw {
                        grid[(ty + j) * w + tx + i] = read_pixel(data, pos, pf);
                    }
                }
                tx += tw;
                continue;
            }

            if mask & HEXTILE_BACKGROUND_SPECIFIED != 0 {
                background = read_pixel(data, pos, pf);
            }
            for j in 0..th {
                grid[(ty + j) * w + tx..(ty + j) * w + tx + tw].fill(background);
            }
            if mask & HEXTILE_FOREGROUND_SPECIFIED != 0 {
                foreground = read_pixel(data, pos, pf);
            }
            if mask & HEXTILE_ANY_SUBRECTS != 0 {
                let count = data[*pos];
                *pos += 1;
                for _ in 0..count {
                    let pixel = if mask & HEXTILE_SUBRECTS_COLOURED != 0 {
                        read_pixel(data, pos, pf)
                    } else {
                        foreground
                    };
                    let xy = data[*pos];
                    let wh = data[*pos + 1];
                    *pos += 2;
                    let sx = usize::from(xy >> 4);
                    let sy = usize::from(xy & 0xF);
                    let sw = usize::from(wh >> 4) + 1;
                    let sh = usize::from(wh & 0xF) + 1;
                    for row in sy..sy + sh {
                        grid[(ty + row) * w + tx + sx..(ty + row) * w + tx + sx + sw].fill(pixel);
                    }
                }
            }
            tx += tw;
        }
        ty += th;
    }
}

/// A deterministic screen with realistic texture: the composed game screen
/// over patterned assets.
fn game_screen() -> Image {
    let mut background = Image::new(512, 384);
    for y in (0..384).step_by(8) {
        for x in (0..512).step_by(8) {
            background.fill(x, y, 8, 8, ((x / 8 + (y / 8) * 3) % 251) as u8);
        }
    }
    let mut fruit = Image::new(32, 160);
    for symbol in 0..5 {
        fruit.fill(0, symbol * 32, 32, 32, (0x20 + symbol * 9) as u8);
    }
    let mut digits = Image::new(8, 121);
    for row in 0..121 {
        digits.fill(0, row, 8, 1, (row % 17) as u8);
    }
    let assets = Assets {
        background,
        digits,
        ball: Image::new(37, 37),
        handle: Image::new(40, 211),
        coin: Image::new(29, 29),
        coinslot: Image::new(29, 8),
        fruit,
    };
    let game = Game::new(assets, "/nonexistent/stats.ini");
    let mut fb = Image::new(512, 384);
    game.render_initial(&mut fb);
    fb
}

fn formats() -> Vec<PixelFormat> {
    let bgr233 = PixelFormat::bgr233();
    let rgb565_be = PixelFormat {
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
    let mut rgb565_le = rgb565_be.clone();
    rgb565_le.big_endian = false;
    let rgba32 = PixelFormat {
        bpp: 32,
        big_endian: false,
        true_color: true,
        red_div: 65536 / 256,
        green_div: 65536 / 256,
        blue_div: 65536 / 256,
        red_shift: 0,
        green_shift: 8,
        blue_shift: 16,
    };
    vec![bgr233, rgb565_be, rgb565_le, rgba32]
}

fn encoding_sets() -> Vec<EncodingSet> {
    let raw_only = EncodingSet::default();
    let mut rre = EncodingSet::default();
    rre.insert_wire(ENCODING_RRE);
    let mut hextile = EncodingSet::default();
    hextile.insert_wire(ENCODING_HEXTILE);
    let mut both = EncodingSet::default();
    both.insert_wire(ENCODING_RRE);
    both.insert_wire(ENCODING_HEXTILE);
    vec![raw_only, rre, hextile, both]
}

const REGIONS: [(u16, u16, u16, u16); 6] = [
    (0, 0, 512, 384),
    (388, 185, 29, 37),
    (222, 67, 32, 114),
    (19, 293, 63, 11),
    (480, 360, 32, 24),
    (511, 383, 1, 1),
];

#[test]
fn every_rectangle_round_trips_pixel_exactly() {
    let fb = game_screen();
    let palette = Palette::bgr233();

    for format in formats() {
        for encodings in encoding_sets() {
            for &(x, y, w, h) in &REGIONS {
                let mut buf = BytesMut::new();
                encode_rect(&mut buf, &fb, &palette, &format, encodings, x, y, w, h);
                let (dx, dy, dw, dh, grid) = decode_rect(&buf, &format);
                assert_eq!((dx, dy, dw, dh), (x.into(), y.into(), w.into(), h.into()));

                for row in 0..dh {
                    for col in 0..dw {
                        let index = fb.px(dx + col, dy + row);
                        assert_eq!(
                            grid[row * dw + col],
                            expected_pixel(&palette, &format, index),
                            "pixel ({col},{row}) of {w}x{h}@{x},{y} bpp={}",
                            format.bpp
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn encoded_body_is_never_worse_than_raw_plus_tag() {
    let fb = game_screen();
    let palette = Palette::bgr233();

    for format in formats() {
        for encodings in encoding_sets() {
            for &(x, y, w, h) in &REGIONS {
                let mut buf = BytesMut::new();
                encode_rect(&mut buf, &fb, &palette, &format, encodings, x, y, w, h);
                let raw = usize::from(w) * usize::from(h) * format.bytes_per_pixel();
                assert!(
                    buf.len() - 12 <= raw + 1,
                    "{w}x{h}@{x},{y} bpp={} encoded to {} bytes, raw is {raw}",
                    format.bpp,
                    buf.len() - 12
                );
            }
        }
    }
}

#[test]
fn paletted_raw_carries_indices_verbatim() {
    let fb = game_screen();
    let palette = Palette::bgr233();
    let paletted = PixelFormat::from_wire(&[8, 8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    assert!(!paletted.true_color);

    let mut buf = BytesMut::new();
    encode_rect(
        &mut buf,
        &fb,
        &palette,
        &paletted,
        EncodingSet::default(),
        100,
        50,
        40,
        20,
    );
    assert_eq!(&buf[8..12], &[0, 0, 0, 0]);
    let mut at = 12;
    for row in 50..70 {
        assert_eq!(&buf[at..at + 40], fb.row(100, row, 40));
        at += 40;
    }
}

#[test]
fn default_format_full_screen_is_the_framebuffer() {
    let fb = game_screen();
    let palette = Palette::bgr233();
    let format = PixelFormat::bgr233();

    let mut buf = BytesMut::new();
    encode_rect(
        &mut buf,
        &fb,
        &palette,
        &format,
        EncodingSet::default(),
        0,
        0,
        512,
        384,
    );
    assert_eq!(buf.len(), 12 + 512 * 384);
    for row in 0..384 {
        assert_eq!(&buf[12 + row * 512..12 + (row + 1) * 512], fb.row(0, row, 512));
    }
}
