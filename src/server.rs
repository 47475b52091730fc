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

//! The server: listeners, the client table, and the animation tick loop.
//!
//! All shared state lives in one place and is touched by one task. Acceptor
//! tasks (one per bound listener) and reader tasks (one per client) are pure
//! I/O pumps that forward sockets and byte chunks over a channel; the run
//! loop owns the framebuffer, the palette, the game, and every
//! [`Client`], so protocol processing, game stepping, encoding and sending
//! all happen in one thread of control with no locking.

use std::collections::BTreeMap;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use log::{error, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use crate::client::Client;
use crate::error::{Result, VncError};
use crate::framebuffer::{Image, Palette};
use crate::game::Game;
use crate::protocol::{FB_HEIGHT, FB_WIDTH, PROTOCOL_VERSION};

/// Animation cadence: one game step every 1/25 second.
const TICK_INTERVAL: Duration = Duration::from_micros(1_000_000 / 25);

/// Staging buffer size: one full-screen 32-bit update plus a cursor
/// pseudo-rectangle is the largest packet we ever compose.
const STAGING_CAPACITY: usize = 4
    + 12
    + (FB_WIDTH as usize) * (FB_HEIGHT as usize) * 4
    + 12
    + 17 * 22 * 4
    + 3 * 22;

/// Everything the protocol layer reads or pokes while handling a client:
/// the framebuffer and palette (read by the encoders), the game (started by
/// input events, stepped by the tick), and the reusable send-staging
/// buffer.
pub struct Shared {
    /// The one 512x384 screen every client sees.
    pub framebuffer: Image,
    /// The immutable BGR-233 palette.
    pub palette: Palette,
    /// The slot machine.
    pub game: Game,
    /// Scratch buffer every outgoing packet is composed in.
    pub staging: BytesMut,
    /// Set when an input event started a play; the run loop rearms the tick
    /// timer so the first frame goes out immediately.
    pub tick_reset: bool,
}

enum Event {
    Accepted(TcpStream, SocketAddr),
    Data(u64, Bytes),
    Closed(u64, Option<io::Error>),
}

/// The VNC slots server.
pub struct Server {
    shared: Shared,
    clients: BTreeMap<u64, Client>,
    next_id: u64,
    listeners: Vec<TcpListener>,
}

impl Server {
    /// Binds the listening sockets and composes the initial screen.
    ///
    /// Both wildcard addresses are tried; a failure on one family is logged
    /// and tolerated. Port 0 asks the OS for an ephemeral port, which the
    /// integration tests use.
    ///
    /// # Errors
    ///
    /// Returns [`VncError::NoListeners`] when not a single bind succeeds.
    pub async fn bind(port: u16, game: Game) -> Result<Self> {
        let mut listeners = Vec::new();
        for addr in [format!("0.0.0.0:{port}"), format!("[::]:{port}")] {
            match TcpListener::bind(&addr).await {
                Ok(listener) => {
                    if let Ok(local) = listener.local_addr() {
                        info!("listening on {local}");
                    }
                    listeners.push(listener);
                }
                Err(e) => warn!("failed to bind {addr}: {e}"),
            }
        }
        if listeners.is_empty() {
            return Err(VncError::NoListeners);
        }

        let mut framebuffer = Image::new(usize::from(FB_WIDTH), usize::from(FB_HEIGHT));
        game.render_initial(&mut framebuffer);

        Ok(Self {
            shared: Shared {
                framebuffer,
                palette: Palette::bgr233(),
                game,
                staging: BytesMut::with_capacity(STAGING_CAPACITY),
                tick_reset: false,
            },
            clients: BTreeMap::new(),
            next_id: 0,
            listeners,
        })
    }

    /// The addresses actually bound, for tests connecting to an ephemeral
    /// port.
    #[must_use]
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners
            .iter()
            .filter_map(|l| l.local_addr().ok())
            .collect()
    }

    /// Runs the server forever: accepts connections, feeds client bytes
    /// through the protocol engine, and advances the game at 25 Hz while a
    /// play is in progress.
    pub async fn run(mut self) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        for listener in self.listeners.drain(..) {
            let tx = tx.clone();
            tokio::spawn(async move {
                loop {
                    match listener.accept().await {
                        Ok((stream, addr)) => {
                            if tx.send(Event::Accepted(stream, addr)).is_err() {
                                break;
                            }
                        }
                        Err(e) => error!("accept: {e}"),
                    }
                }
            });
        }

        let mut tick = time::interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = rx.recv() => {
                    // the acceptors hold clones of tx, so recv never ends
                    if let Some(event) = event {
                        self.handle_event(event, &tx).await;
                    }
                }
                _ = tick.tick(), if !self.shared.game.is_waiting() => {
                    self.tick().await;
                }
            }

            if self.shared.tick_reset {
                self.shared.tick_reset = false;
                tick.reset_immediately();
            }
        }
    }

    async fn handle_event(&mut self, event: Event, tx: &mpsc::UnboundedSender<Event>) {
        match event {
            Event::Accepted(stream, addr) => self.accept_client(stream, addr, tx).await,
            Event::Data(id, data) => {
                let Some(client) = self.clients.get_mut(&id) else {
                    return;
                };
                if let Err(e) = client.feed(&data, &mut self.shared).await {
                    match e {
                        VncError::UnknownMessage(t) => {
                            error!("client {id}: unknown message type {t:#04x}");
                        }
                        other => error!("client {id}: {other}"),
                    }
                    self.drop_client(id);
                }
            }
            Event::Closed(id, err) => {
                if self.clients.contains_key(&id) {
                    match err {
                        None => info!("client {id} hung up"),
                        Some(e) => error!("client {id}: recv: {e}"),
                    }
                    self.drop_client(id);
                }
            }
        }
    }

    /// Greets a fresh connection with the protocol banner and registers its
    /// state and reader task.
    async fn accept_client(
        &mut self,
        mut stream: TcpStream,
        addr: SocketAddr,
        tx: &mpsc::UnboundedSender<Event>,
    ) {
        let id = self.next_id;
        self.next_id += 1;
        info!("+ client {id} connected from {addr}");

        if let Err(e) = stream.set_nodelay(true) {
            warn!("client {id}: set_nodelay: {e}");
        }

        if let Err(e) = stream.write_all(PROTOCOL_VERSION.as_bytes()).await {
            error!("client {id}: banner: {e}");
            return;
        }

        let (mut read_half, write_half) = stream.into_split();
        let reader_tx = tx.clone();
        let reader = tokio::spawn(async move {
            let mut buf = BytesMut::with_capacity(4096);
            loop {
                match read_half.read_buf(&mut buf).await {
                    Ok(0) => {
                        let _ = reader_tx.send(Event::Closed(id, None));
                        break;
                    }
                    Ok(_) => {
                        if reader_tx.send(Event::Data(id, buf.split().freeze())).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = reader_tx.send(Event::Closed(id, Some(e)));
                        break;
                    }
                }
            }
        });

        self.clients.insert(id, Client::new(id, write_half, reader));
    }

    /// One animation step: advance the game, then service every client
    /// whose incremental request is pending, in id order.
    async fn tick(&mut self) {
        let Shared {
            game, framebuffer, ..
        } = &mut self.shared;
        game.step(framebuffer);

        let ready: Vec<u64> = self
            .clients
            .iter()
            .filter(|(_, client)| client.ready())
            .map(|(id, _)| *id)
            .collect();

        for id in ready {
            let Some(client) = self.clients.get_mut(&id) else {
                continue;
            };
            if let Err(e) = client
                .send_update(&mut self.shared, 0, 0, FB_WIDTH, FB_HEIGHT, true)
                .await
            {
                error!("client {id}: {e}");
                self.drop_client(id);
            }
        }
    }

    fn drop_client(&mut self, id: u64) {
        if let Some(client) = self.clients.remove(&id) {
            info!("- client {id} took {} bytes", client.bytes_sent());
        }
    }
}
