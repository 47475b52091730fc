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

//! VNC client connection state and protocol implementation.
//!
//! Each connected viewer is a [`Client`]: the write half of its socket, the
//! read-phase state machine that consumes the incoming byte stream, the
//! negotiated pixel format and encoding set, and the snapshot of game
//! indicators it last acknowledged.
//!
//! # Protocol Flow
//!
//! 1. **Handshake**: version banner, security type "None", SecurityResult
//! 2. **Initialization**: ClientInit in, fixed ServerInit out
//! 3. **Message Loop**: one type byte, then a fixed-length body per message
//!
//! The reader never buffers more than one message step: `needed` counts the
//! bytes the current phase wants (including the already-read type byte for
//! message bodies) and the 20-byte scratch buffer is the upper bound for
//! any single step. Multi-part messages (SetEncodings entries, ClientCutText
//! body) track their remaining repetitions in `extra`.

use bytes::{BufMut, BytesMut};
use log::info;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::task::JoinHandle;

use crate::encoding::{cursor, encode_rect};
use crate::error::{Result, VncError};
use crate::game::Indicators;
use crate::protocol::{
    EncodingSet, PixelFormat, ServerInit, CLIENT_MSG_CLIENT_CUT_TEXT, CLIENT_MSG_FRAMEBUFFER_UPDATE_REQUEST,
    CLIENT_MSG_KEY_EVENT, CLIENT_MSG_POINTER_EVENT, CLIENT_MSG_SET_ENCODINGS,
    CLIENT_MSG_SET_PIXEL_FORMAT, COPY_URL_MESSAGE, FB_HEIGHT, FB_WIDTH, SECURITY_RESULT_OK,
    SECURITY_TYPES, SERVER_MSG_BELL, SERVER_MSG_FRAMEBUFFER_UPDATE,
    SERVER_MSG_SET_COLOUR_MAP_ENTRIES,
};
use crate::server::Shared;

/// Keysyms that pull the handle: space, Return, Down, KP_Enter.
const PLAY_KEYSYMS: [u32; 4] = [32, 65293, 65364, 65421];

/// Where the protocol state machine is in the incoming byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    HandshakeVersion,
    HandshakeSecurity,
    Init,
    AwaitMessage,
    SetPixelFormat,
    SetEncodingsHead,
    SetEncodingsEntry,
    UpdateRequest,
    KeyEvent,
    PointerEvent,
    CutTextHead,
    CutTextBody,
}

/// The clickable region the player pressed button 1 on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hotspot {
    Handle,
    Copy,
}

fn hotspot_at(x: u16, y: u16) -> Option<Hotspot> {
    if (451..=487).contains(&x) && (73..=109).contains(&y) {
        Some(Hotspot::Handle)
    } else if (472..=490).contains(&x) && (365..=383).contains(&y) {
        Some(Hotspot::Copy)
    } else {
        None
    }
}

/// One connected VNC viewer.
pub struct Client {
    id: u64,
    writer: OwnedWriteHalf,
    reader: JoinHandle<()>,

    phase: Phase,
    buf: [u8; 20],
    read: usize,
    needed: usize,
    extra: usize,

    format: PixelFormat,
    encodings: EncodingSet,

    key_down: bool,
    mouse_down: Option<Hotspot>,

    /// Set by an incremental update request; cleared when the next update
    /// goes out.
    ready: bool,

    sent_palette: bool,
    sent_cursor: bool,

    /// Game values as of the last update this client received.
    snapshot: Indicators,

    bytes_sent: u64,
}

impl Client {
    /// Creates the per-connection state. The protocol banner has already
    /// been sent; the first thing we expect is the client's 12-byte version
    /// reply.
    pub fn new(id: u64, writer: OwnedWriteHalf, reader: JoinHandle<()>) -> Self {
        Self {
            id,
            writer,
            reader,
            phase: Phase::HandshakeVersion,
            buf: [0; 20],
            read: 0,
            needed: 12,
            extra: 0,
            format: PixelFormat::bgr233(),
            encodings: EncodingSet::default(),
            key_down: false,
            mouse_down: None,
            ready: false,
            sent_palette: false,
            sent_cursor: false,
            snapshot: Indicators::default(),
            bytes_sent: 0,
        }
    }

    /// The server-assigned connection id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Total bytes sent to this client, for the goodbye log line.
    #[must_use]
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Whether an incremental update request is pending.
    #[must_use]
    pub fn ready(&self) -> bool {
        self.ready
    }

    /// Consumes a chunk of received bytes, advancing the state machine each
    /// time the current step completes.
    ///
    /// # Errors
    ///
    /// Fails on an unknown message type or when a reply cannot be sent; the
    /// server drops the client in either case.
    pub async fn feed(&mut self, mut data: &[u8], shared: &mut Shared) -> Result<()> {
        while !data.is_empty() {
            let take = (self.needed - self.read).min(data.len());
            self.buf[self.read..self.read + take].copy_from_slice(&data[..take]);
            self.read += take;
            data = &data[take..];

            if self.read == self.needed {
                self.advance(shared).await?;
            }
        }
        Ok(())
    }

    /// Handles one completed read step.
    async fn advance(&mut self, shared: &mut Shared) -> Result<()> {
        match self.phase {
            Phase::HandshakeVersion => {
                // whatever version the client claims, offer "None" security
                self.send(&SECURITY_TYPES).await?;
                self.phase = Phase::HandshakeSecurity;
                self.restart(1);
            }
            Phase::HandshakeSecurity => {
                self.send(&SECURITY_RESULT_OK).await?;
                self.phase = Phase::Init;
                self.restart(1);
            }
            Phase::Init => {
                // the shared flag is ignored, everyone sees the same screen
                let mut init = BytesMut::with_capacity(32);
                ServerInit::write_to(&mut init);
                self.send(&init).await?;
                self.await_message();
            }
            Phase::AwaitMessage => match self.buf[0] {
                CLIENT_MSG_SET_PIXEL_FORMAT => self.expect(Phase::SetPixelFormat, 20),
                CLIENT_MSG_SET_ENCODINGS => self.expect(Phase::SetEncodingsHead, 4),
                CLIENT_MSG_FRAMEBUFFER_UPDATE_REQUEST => self.expect(Phase::UpdateRequest, 10),
                CLIENT_MSG_KEY_EVENT => self.expect(Phase::KeyEvent, 8),
                CLIENT_MSG_POINTER_EVENT => self.expect(Phase::PointerEvent, 6),
                CLIENT_MSG_CLIENT_CUT_TEXT => self.expect(Phase::CutTextHead, 8),
                other => return Err(VncError::UnknownMessage(other)),
            },
            Phase::SetPixelFormat => {
                // type byte, three bytes padding, then the 16-byte format
                let mut wire = [0u8; 16];
                wire.copy_from_slice(&self.buf[4..20]);
                self.format = PixelFormat::from_wire(&wire);
                info!(
                    "client {}: pixel format {}bpp {} endian, {} color",
                    self.id,
                    self.format.bpp,
                    if self.format.big_endian { "big" } else { "little" },
                    if self.format.true_color { "true" } else { "mapped" },
                );
                self.await_message();
            }
            Phase::SetEncodingsHead => {
                self.extra = usize::from(u16::from_be_bytes([self.buf[2], self.buf[3]]));
                self.encodings.clear();
                self.next_encoding_entry();
            }
            Phase::SetEncodingsEntry => {
                let encoding =
                    i32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
                self.encodings.insert_wire(encoding);
                self.extra -= 1;
                if self.extra == 0 {
                    info!("client {}: encodings {:?}", self.id, self.encodings);
                }
                self.next_encoding_entry();
            }
            Phase::UpdateRequest => {
                let incremental = self.buf[1] != 0;
                if incremental {
                    self.ready = true;
                } else {
                    let x = u16::from_be_bytes([self.buf[2], self.buf[3]]);
                    let y = u16::from_be_bytes([self.buf[4], self.buf[5]]);
                    let w = u16::from_be_bytes([self.buf[6], self.buf[7]]);
                    let h = u16::from_be_bytes([self.buf[8], self.buf[9]]);
                    self.send_update(shared, x, y, w, h, false).await?;
                }
                self.await_message();
            }
            Phase::KeyEvent => {
                let down = self.buf[1] != 0;
                let key = u32::from_be_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]]);
                if PLAY_KEYSYMS.contains(&key) {
                    if down && !self.key_down {
                        self.key_down = true;
                        if shared.game.start() {
                            shared.tick_reset = true;
                        }
                    } else if !down {
                        self.key_down = false;
                    }
                }
                self.await_message();
            }
            Phase::PointerEvent => {
                let button1 = self.buf[1] & 1 != 0;
                let x = u16::from_be_bytes([self.buf[2], self.buf[3]]);
                let y = u16::from_be_bytes([self.buf[4], self.buf[5]]);
                if self.mouse_down.is_some() && !button1 {
                    // release: the click counts only if it ends on the same
                    // hotspot it started on
                    match self.mouse_down {
                        Some(Hotspot::Handle) if hotspot_at(x, y) == Some(Hotspot::Handle) => {
                            if shared.game.start() {
                                shared.tick_reset = true;
                            }
                        }
                        Some(Hotspot::Copy) if hotspot_at(x, y) == Some(Hotspot::Copy) => {
                            self.send(&COPY_URL_MESSAGE).await?;
                        }
                        _ => {}
                    }
                    self.mouse_down = None;
                } else if self.mouse_down.is_none() && button1 {
                    self.mouse_down = hotspot_at(x, y);
                }
                self.await_message();
            }
            Phase::CutTextHead => {
                // type, three bytes padding, u32 text length; the text
                // itself is read and discarded 20 bytes at a time
                self.extra = u32::from_be_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]])
                    as usize;
                self.next_cut_text_chunk();
            }
            Phase::CutTextBody => {
                self.next_cut_text_chunk();
            }
        }
        Ok(())
    }

    /// Resets the read counter and expects `needed` fresh bytes.
    fn restart(&mut self, needed: usize) {
        self.read = 0;
        self.needed = needed;
    }

    /// Back to waiting for the next message type byte.
    fn await_message(&mut self) {
        self.phase = Phase::AwaitMessage;
        self.restart(1);
    }

    /// Enters a message-body phase. The type byte stays in the buffer, so
    /// `needed` counts it.
    fn expect(&mut self, phase: Phase, needed: usize) {
        self.phase = phase;
        self.needed = needed;
    }

    fn next_encoding_entry(&mut self) {
        if self.extra == 0 {
            self.await_message();
        } else {
            self.phase = Phase::SetEncodingsEntry;
            self.restart(4);
        }
    }

    fn next_cut_text_chunk(&mut self) {
        if self.extra == 0 {
            self.await_message();
        } else {
            self.phase = Phase::CutTextBody;
            let chunk = self.extra.min(20);
            self.extra -= chunk;
            self.restart(chunk);
        }
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data).await?;
        self.bytes_sent += data.len() as u64;
        Ok(())
    }

    /// Composes and sends one update packet.
    ///
    /// Incremental updates carry a rectangle for every indicator whose
    /// value moved since this client's snapshot, and nothing at all when
    /// none did. Non-incremental requests always carry exactly the clamped
    /// request region. Either kind is preceded by a one-time colour map for
    /// paletted clients and followed by a one-time cursor shape for
    /// Cursor-capable ones.
    ///
    /// # Errors
    ///
    /// Fails when the socket write fails; the server drops the client.
    #[allow(clippy::too_many_arguments)]
    pub async fn send_update(
        &mut self,
        shared: &mut Shared,
        mut x: u16,
        mut y: u16,
        mut w: u16,
        mut h: u16,
        incremental: bool,
    ) -> Result<()> {
        let Shared {
            framebuffer,
            palette,
            game,
            staging,
            ..
        } = shared;

        // clamp the request region to the screen
        x = x.min(FB_WIDTH - 1);
        y = y.min(FB_HEIGHT - 1);
        if u32::from(x) + u32::from(w) > u32::from(FB_WIDTH) {
            w = FB_WIDTH - x;
        }
        if u32::from(y) + u32::from(h) > u32::from(FB_HEIGHT) {
            h = FB_HEIGHT - y;
        }

        // paletted clients get the colour map once, as its own message
        if !self.format.true_color && !self.sent_palette {
            staging.clear();
            staging.put_u8(SERVER_MSG_SET_COLOUR_MAP_ENTRIES);
            staging.put_u8(0); // padding
            staging.put_u16(0); // first colour
            staging.put_u16(256); // number of colours
            for i in 0..256 {
                staging.put_u16(palette.red[i]);
                staging.put_u16(palette.green[i]);
                staging.put_u16(palette.blue[i]);
            }
            self.send(&staging[..]).await?;
            self.sent_palette = true;
        }

        staging.clear();
        staging.put_u8(SERVER_MSG_FRAMEBUFFER_UPDATE);
        staging.put_u8(0); // padding
        staging.put_u16(0); // rectangle count, patched below
        let mut rectangle_count: u16 = 0;

        let live = game.indicators();

        if incremental {
            if live.coin_y != self.snapshot.coin_y {
                rectangle_count += 1;
                encode_rect(
                    staging, framebuffer, palette, &self.format, self.encodings, 388, 185, 29, 37,
                );
            }

            if live.handle_y != self.snapshot.handle_y {
                rectangle_count += 1;
                let skip = live.handle_y.min(self.snapshot.handle_y) as u16;
                encode_rect(
                    staging,
                    framebuffer,
                    palette,
                    &self.format,
                    self.encodings,
                    447,
                    73 + skip,
                    40,
                    248 - skip,
                );
            }

            for i in 0..3 {
                if live.reel_position[i] != self.snapshot.reel_position[i] {
                    rectangle_count += 1;
                    encode_rect(
                        staging,
                        framebuffer,
                        palette,
                        &self.format,
                        self.encodings,
                        222 + 50 * i as u16,
                        67,
                        32,
                        114,
                    );
                }
            }

            if live.profit - live.plays != self.snapshot.profit - self.snapshot.plays {
                rectangle_count += 1;
                encode_rect(
                    staging, framebuffer, palette, &self.format, self.encodings, 19, 353, 63, 11,
                );
            }

            if live.plays != self.snapshot.plays {
                rectangle_count += 1;
                encode_rect(
                    staging, framebuffer, palette, &self.format, self.encodings, 19, 293, 63, 11,
                );
            }

            if live.profit != self.snapshot.profit {
                rectangle_count += 1;
                encode_rect(
                    staging, framebuffer, palette, &self.format, self.encodings, 19, 323, 63, 11,
                );
                // ding! the payout chime rides right behind the profit
                // rectangle
                staging.put_u8(SERVER_MSG_BELL);
            }

            // nothing moved, nothing to say
            if rectangle_count == 0 {
                return Ok(());
            }
        } else {
            rectangle_count += 1;
            encode_rect(
                staging, framebuffer, palette, &self.format, self.encodings, x, y, w, h,
            );
        }

        let mut cursor_sent = false;
        if self.encodings.cursor() && !self.sent_cursor {
            rectangle_count += 1;
            cursor::encode(staging, &self.format, palette);
            cursor_sent = true;
        }

        staging[2..4].copy_from_slice(&rectangle_count.to_be_bytes());

        self.send(&staging[..]).await?;

        if cursor_sent {
            self.sent_cursor = true;
        }
        self.snapshot = live;
        self.ready = false;
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
