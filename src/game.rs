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

//! The slot machine: game state, reel mechanics, payout accounting, and all
//! drawing into the shared framebuffer.
//!
//! The server drives this through exactly two entry points: [`Game::start`]
//! when a player pulls the handle, and [`Game::step`] once per 25 Hz tick
//! while a play is in progress. Everything the protocol layer needs to
//! know for dirty-rectangle scheduling is exposed as [`Indicators`].

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::Result;
use crate::framebuffer::Image;

/// Reel symbols, in payout order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fruit {
    Cherry = 0,
    Orange = 1,
    Plum = 2,
    Bell = 3,
    Bar = 4,
}

use Fruit::{Bar, Bell, Cherry, Orange, Plum};

/// Stops per reel.
const REEL_STOPS: usize = 20;

/// Pixel pitch between stops: a 32px symbol plus a 16px spacer.
const REEL_PITCH: i16 = 48;

/// One full rotation in pixels.
const REEL_SPAN: i16 = 960;

/// Visible reel window height.
const REEL_WINDOW: usize = 114;

/// Symbol layout of the three reel strips.
const REELS: [[Fruit; REEL_STOPS]; 3] = [
    [
        Orange, Bar, Plum, Cherry, Plum, Orange, Bell, Plum, Orange, Cherry, Orange, Bar,
        Orange, Plum, Orange, Plum, Cherry, Bar, Orange, Plum,
    ],
    [
        Bell, Cherry, Bell, Cherry, Bell, Cherry, Bell, Orange, Bell, Cherry, Bell, Cherry,
        Bell, Bar, Bell, Cherry, Bell, Cherry, Bell, Plum,
    ],
    [
        Orange, Cherry, Orange, Plum, Orange, Bar, Orange, Plum, Orange, Bell, Orange, Cherry,
        Orange, Plum, Orange, Plum, Orange, Cherry, Orange, Plum,
    ],
];

/// The image assets the game draws with, loaded from their fixed relative
/// paths at startup.
pub struct Assets {
    /// Full-screen backdrop, 512x384.
    pub background: Image,
    /// Digit strip: glyphs 11px tall, digit d at row 11*d, minus at 110.
    pub digits: Image,
    /// Handle knob.
    pub ball: Image,
    /// Handle shaft, vertically squashed as the handle is pulled.
    pub handle: Image,
    /// The dropping coin.
    pub coin: Image,
    /// Coin slot overlay.
    pub coinslot: Image,
    /// Fruit strip: five 32x32 symbols stacked vertically.
    pub fruit: Image,
}

impl Assets {
    /// Loads every asset blob from `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if any file is missing or truncated.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            background: Image::load(dir.join("background.bin"))?,
            digits: Image::load(dir.join("digits.bin"))?,
            ball: Image::load(dir.join("ball.bin"))?,
            handle: Image::load(dir.join("handle.bin"))?,
            coin: Image::load(dir.join("coin.bin"))?,
            coinslot: Image::load(dir.join("coinslot.bin"))?,
            fruit: Image::load(dir.join("fruit.bin"))?,
        })
    }
}

/// What the slot machine is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Waiting,
    Coin,
    HandleDown,
    HandleUp,
    Spin,
    Payout,
}

/// Snapshot of every game value the update scheduler compares between
/// ticks. Each client keeps the last set it acknowledged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Indicators {
    /// Coin drop progress in pixels.
    pub coin_y: i16,
    /// Handle pull progress in pixels.
    pub handle_y: i16,
    /// Vertical position of each reel strip.
    pub reel_position: [i16; 3],
    /// Coins played since forever.
    pub plays: i32,
    /// Coins paid out since forever.
    pub profit: i32,
}

/// The slot machine.
pub struct Game {
    state: State,
    plays: i32,
    profit: i32,
    reel_stop: [usize; 3],
    coin_y: i16,
    handle_y: i16,
    reel_position: [i16; 3],
    reel_left: [i16; 3],
    payout_left: i16,
    background: Image,
    digits: Image,
    ball: Image,
    handle: Image,
    coin: Image,
    coinslot: Image,
    reels: [Image; 3],
    stats_path: PathBuf,
}

impl Game {
    /// Builds the game from its assets: composes the three reel strips from
    /// the fruit sheet and restores the play counters from `stats_path` if
    /// present.
    pub fn new<P: Into<PathBuf>>(assets: Assets, stats_path: P) -> Self {
        let reels = std::array::from_fn(|i| {
            let mut strip = Image::new(32, 48 * REEL_STOPS);
            for (k, &fruit) in REELS[i].iter().enumerate() {
                strip.blit(&assets.fruit, 0, 32 * fruit as usize, 0, 48 * k, 32, 32);
                strip.fill(0, 48 * k + 32, 32, 16, 0xFF);
            }
            strip
        });

        let stats_path = stats_path.into();
        let (plays, profit) = load_stats(&stats_path);
        info!("starting at {} plays, {} profit", plays, profit);

        Self {
            state: State::Waiting,
            plays,
            profit,
            reel_stop: [0; 3],
            coin_y: 0,
            handle_y: 0,
            // center stop is 57px down, minus 16px for the symbol's top half
            reel_position: [REEL_SPAN - 57 + 16; 3],
            reel_left: [0; 3],
            payout_left: 0,
            background: assets.background,
            digits: assets.digits,
            ball: assets.ball,
            handle: assets.handle,
            coin: assets.coin,
            coinslot: assets.coinslot,
            reels,
            stats_path,
        }
    }

    /// Paints the idle machine onto a fresh framebuffer.
    pub fn render_initial(&self, fb: &mut Image) {
        fb.blit(
            &self.background,
            0,
            0,
            0,
            0,
            self.background.width(),
            self.background.height(),
        );
        self.draw_handle(fb, 0);
        self.draw_number(fb, self.plays, 19, 293);
        self.draw_number(fb, self.profit, 19, 323);
        self.draw_number(fb, self.profit - self.plays, 19, 353);
        for i in 0..3 {
            self.draw_reel(fb, i, 222 + 50 * i);
        }
    }

    /// Whether the machine is idle and a new play may start.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.state == State::Waiting
    }

    /// Starts a play if the machine is idle. Returns true when a play
    /// actually started (the caller then rearms the tick timer).
    pub fn start(&mut self) -> bool {
        if self.state != State::Waiting {
            return false;
        }
        self.state = State::Coin;
        self.coin_y = 0;
        true
    }

    /// The current scheduler-visible values.
    #[must_use]
    pub fn indicators(&self) -> Indicators {
        Indicators {
            coin_y: self.coin_y,
            handle_y: self.handle_y,
            reel_position: self.reel_position,
            plays: self.plays,
            profit: self.profit,
        }
    }

    /// Advances the animation by one tick, redrawing whatever moved.
    pub fn step(&mut self, fb: &mut Image) {
        match self.state {
            State::Waiting => {}
            State::Coin => {
                self.coin_y += 2;
                fb.blit(&self.background, 388, 186, 388, 186, 29, 36);
                let coin_h = if self.coin_y < 8 { 29 } else { 36 - self.coin_y };
                if coin_h > 0 {
                    fb.blit_keyed(
                        &self.coin,
                        0,
                        0,
                        388,
                        185 + self.coin_y as usize,
                        29,
                        coin_h as usize,
                        0xC7,
                        0,
                    );
                }
                fb.blit_keyed(&self.coinslot, 0, 0, 388, 213, 29, 8, 0xFF, 0);
                if self.coin_y >= 36 {
                    self.plays += 1;
                    self.draw_number(fb, self.plays, 19, 293);
                    self.draw_number(fb, self.profit - self.plays, 19, 353);
                    self.handle_y = 0;
                    self.state = State::HandleDown;
                }
            }
            State::HandleDown => {
                self.handle_y += 10;
                self.draw_handle(fb, self.handle_y as usize);
                if self.handle_y >= 100 {
                    self.handle_y = 100;
                    self.state = State::HandleUp;
                }
            }
            State::HandleUp => {
                self.handle_y -= 20;
                self.draw_handle(fb, self.handle_y.max(0) as usize);
                if self.handle_y <= 0 {
                    self.handle_y = 0;
                    self.load_spin(sample_spin());
                    self.state = State::Spin;
                }
            }
            State::Spin => {
                for i in 0..3 {
                    let amount = self.reel_left[i].min(21);
                    if amount > 0 {
                        self.reel_position[i] -= amount;
                        self.reel_left[i] -= amount;
                        if self.reel_position[i] < 0 {
                            self.reel_position[i] += REEL_SPAN;
                        }
                        self.draw_reel(fb, i, 222 + 50 * i);
                    }
                }
                if self.reel_left == [0; 3] {
                    self.payout_left = payout_for(
                        REELS[0][self.reel_stop[0]],
                        REELS[1][self.reel_stop[1]],
                        REELS[2][self.reel_stop[2]],
                    );
                    self.state = State::Payout;
                }
            }
            State::Payout => {
                if self.payout_left <= 0 {
                    self.save_stats();
                    self.state = State::Waiting;
                } else {
                    self.payout_left -= 1;
                    self.profit += 1;
                    self.draw_number(fb, self.profit, 19, 323);
                    self.draw_number(fb, self.profit - self.plays, 19, 353);
                }
            }
        }
    }

    /// Computes the new reel stops and spin distances from one sampled
    /// value. Each reel spins at least one full rotation and strictly
    /// longer than the reel to its left.
    fn load_spin(&mut self, mut sample: u16) {
        for i in 0..3 {
            let stop = usize::from(sample % 20);
            sample /= 20;
            let mut left = (self.reel_stop[i] as i16 - stop as i16) * REEL_PITCH;
            if i == 0 {
                while left < REEL_SPAN {
                    left += REEL_SPAN;
                }
            } else {
                while left <= self.reel_left[i - 1] {
                    left += REEL_SPAN;
                }
            }
            self.reel_left[i] = left;
            self.reel_stop[i] = stop;
        }
    }

    /// Draws the 114px window of one reel, with wraparound and the shaded
    /// top and bottom edges.
    fn draw_reel(&self, fb: &mut Image, reel: usize, dst_x: usize) {
        let strip = &self.reels[reel];
        let dst_y = 67;
        let position = self.reel_position[reel] as usize;
        if position + REEL_WINDOW > strip.height() {
            let h = strip.height() - position;
            fb.blit(strip, 0, position, dst_x, dst_y, 32, h);
            fb.blit(strip, 0, 0, dst_x, dst_y + h, 32, REEL_WINDOW - h);
        } else {
            fb.blit(strip, 0, position, dst_x, dst_y, 32, REEL_WINDOW);
        }

        for y in 0..14 {
            let amount = ((14 - y) >> 1) as u8;
            fb.darken_row(dst_x, dst_y + y, 32, amount);
            fb.darken_row(dst_x, dst_y + REEL_WINDOW - y - 1, 32, amount);
        }
    }

    /// Draws the handle at a given pull depth: knob moved down, shaft
    /// squashed to fit.
    fn draw_handle(&self, fb: &mut Image, scale: usize) {
        let ball_h = self.ball.height();
        let shaft_h = self.handle.height();
        fb.blit(&self.background, 447, 73, 447, 73, 40, ball_h + shaft_h);
        fb.blit_keyed(
            &self.ball,
            0,
            0,
            451,
            73 + scale,
            self.ball.width(),
            ball_h,
            0xFF,
            0,
        );
        fb.blit_vscaled(
            &self.handle,
            0,
            0,
            shaft_h,
            447,
            ball_h + 73 + scale,
            shaft_h - scale,
            self.handle.width(),
            0xFF,
        );
    }

    /// Draws a counter as an eight-character right-justified decimal, red
    /// when negative.
    fn draw_number(&self, fb: &mut Image, value: i32, x: usize, y: usize) {
        let tint = if value < 0 { 0x07 } else { 0x00 };
        let text = format!("{value:8}");
        let mut dst_x = x;
        for ch in text.chars().take(8) {
            match ch {
                '0'..='9' => {
                    let row = 11 * (ch as usize - '0' as usize);
                    fb.blit_keyed(&self.digits, 0, row, dst_x, y, self.digits.width(), 11, 0, tint);
                }
                '-' => {
                    fb.blit_keyed(&self.digits, 0, 110, dst_x, y, self.digits.width(), 11, 0, tint);
                }
                _ => fb.fill(dst_x, y, 6, 11, 0xFF),
            }
            dst_x += 8;
        }
    }

    fn save_stats(&self) {
        if let Err(e) = fs::write(&self.stats_path, format!("{} {}\n", self.plays, self.profit)) {
            warn!("failed to write {}: {}", self.stats_path.display(), e);
        }
    }
}

/// Reads `plays profit` from the stats file, defaulting to zero when the
/// file is absent or unparseable.
fn load_stats(path: &Path) -> (i32, i32) {
    let Ok(text) = fs::read_to_string(path) else {
        return (0, 0);
    };
    let mut fields = text.split_whitespace();
    match (
        fields.next().and_then(|v| v.parse().ok()),
        fields.next().and_then(|v| v.parse().ok()),
    ) {
        (Some(plays), Some(profit)) => (plays, profit),
        _ => {
            warn!("ignoring malformed stats file {}", path.display());
            (0, 0)
        }
    }
}

/// Draws one 16-bit value from the OS entropy source, rejection-sampled
/// below 64000 so three base-20 digits come out uniform.
fn sample_spin() -> u16 {
    let mut buf = [0u8; 2];
    loop {
        OsRng.fill_bytes(&mut buf);
        let value = u16::from_be_bytes(buf);
        if value < 64000 {
            return value;
        }
    }
}

/// The payout table. The third reel's bar is wild for bell, plum and
/// orange lines.
fn payout_for(r0: Fruit, r1: Fruit, r2: Fruit) -> i16 {
    match (r0, r1, r2) {
        (Bar, Bar, Bar) => 100,
        (Bell, Bell, Bell | Bar) => 18,
        (Plum, Plum, Plum | Bar) => 13,
        (Orange, Orange, Orange | Bar) => 11,
        (Cherry, Cherry, Cherry) => 11,
        (Cherry, Cherry, _) => 5,
        (Cherry, _, _) => 3,
        _ => 0,
    }
}
