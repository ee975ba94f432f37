//! Decode worker: drives one [`Player`] from a dedicated thread.
//!
//! Callers send commands over a crossbeam channel and block on a
//! per-request reply channel, so every player operation runs on the worker
//! thread in the order it was sent. Buffers travel as pool handles.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};

use crate::buffer::{BufferHandle, BufferPool};
use crate::core::time::Millis;
use crate::decode::MediaInfo;
use crate::player::{Player, PlayerError, PlayerState};

type Reply<T> = Sender<Result<T, PlayerError>>;

/// Command sent to the worker thread
#[derive(Debug)]
pub enum WorkerCommand {
    Prepare {
        path: PathBuf,
        hardware_decode: bool,
        audio_channels: i32,
        reply: Reply<MediaInfo>,
    },
    Decode {
        buffer: BufferHandle,
        reply: Reply<()>,
    },
    SeekTo {
        target: Millis,
        buffer: Option<BufferHandle>,
        reply: Reply<()>,
    },
    Reset {
        reply: Reply<()>,
    },
    MediaInfo {
        reply: Reply<Option<MediaInfo>>,
    },
    State {
        reply: Reply<PlayerState>,
    },
    Release {
        reply: Reply<()>,
    },
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Player(#[from] PlayerError),
    #[error("decode worker has stopped")]
    Stopped,
    #[error("failed to start decode worker: {0}")]
    Spawn(String),
}

pub struct DecodeWorker {
    command_tx: Sender<WorkerCommand>,
    pool: Arc<BufferPool>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl DecodeWorker {
    /// Move `player` onto a new thread. Buffer handles passed to the worker
    /// must come from `pool`.
    pub fn spawn(player: Player, pool: Arc<BufferPool>) -> Result<Self, WorkerError> {
        let (command_tx, command_rx) = channel::unbounded();
        let worker_pool = pool.clone();
        let thread_handle = thread::Builder::new()
            .name("playcore-decode".into())
            .spawn(move || run(player, worker_pool, command_rx))
            .map_err(|e| WorkerError::Spawn(e.to_string()))?;

        Ok(Self {
            command_tx,
            pool,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    fn request<T>(&self, command: impl FnOnce(Reply<T>) -> WorkerCommand) -> Result<T, WorkerError> {
        let (reply_tx, reply_rx) = channel::bounded(1);
        self.command_tx
            .send(command(reply_tx))
            .map_err(|_| WorkerError::Stopped)?;
        let result = reply_rx.recv().map_err(|_| WorkerError::Stopped)?;
        Ok(result?)
    }

    pub fn prepare(
        &self,
        path: impl Into<PathBuf>,
        hardware_decode: bool,
        audio_channels: i32,
    ) -> Result<MediaInfo, WorkerError> {
        let path = path.into();
        self.request(|reply| WorkerCommand::Prepare {
            path,
            hardware_decode,
            audio_channels,
            reply,
        })
    }

    pub fn decode(&self, buffer: BufferHandle) -> Result<(), WorkerError> {
        self.request(|reply| WorkerCommand::Decode { buffer, reply })
    }

    pub fn seek_to(&self, target: Millis, buffer: Option<BufferHandle>) -> Result<(), WorkerError> {
        self.request(|reply| WorkerCommand::SeekTo { target, buffer, reply })
    }

    pub fn reset_decode_progress(&self) -> Result<(), WorkerError> {
        self.request(|reply| WorkerCommand::Reset { reply })
    }

    pub fn media_info(&self) -> Result<Option<MediaInfo>, WorkerError> {
        self.request(|reply| WorkerCommand::MediaInfo { reply })
    }

    pub fn state(&self) -> Result<PlayerState, WorkerError> {
        self.request(|reply| WorkerCommand::State { reply })
    }

    pub fn release(&self) -> Result<(), WorkerError> {
        self.request(|reply| WorkerCommand::Release { reply })
    }

    /// Stop the thread after the commands already sent, releasing the player
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread_handle) = self.thread_handle.take() else {
            return;
        };
        // the thread may already be gone
        let _ = self.command_tx.send(WorkerCommand::Shutdown);
        if thread_handle.join().is_err() {
            log::error!("decode worker panicked");
        }
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(mut player: Player, pool: Arc<BufferPool>, command_rx: Receiver<WorkerCommand>) {
    log::debug!("decode worker started");
    for command in command_rx.iter() {
        // a caller that gave up waiting drops its reply receiver; nothing to report then
        match command {
            WorkerCommand::Prepare {
                path,
                hardware_decode,
                audio_channels,
                reply,
            } => {
                let result = player.prepare(&path, hardware_decode, audio_channels).cloned();
                let _ = reply.send(result);
            }
            WorkerCommand::Decode { buffer, reply } => {
                let _ = reply.send(player.decode_handle(&pool, buffer));
            }
            WorkerCommand::SeekTo { target, buffer, reply } => {
                let _ = reply.send(player.seek_to_handle(&pool, buffer, target));
            }
            WorkerCommand::Reset { reply } => {
                let _ = reply.send(player.reset_decode_progress());
            }
            WorkerCommand::MediaInfo { reply } => {
                let _ = reply.send(Ok(player.media_info().cloned()));
            }
            WorkerCommand::State { reply } => {
                let _ = reply.send(Ok(player.state()));
            }
            WorkerCommand::Release { reply } => {
                player.release();
                let _ = reply.send(Ok(()));
            }
            WorkerCommand::Shutdown => break,
        }
    }
    player.release();
    log::debug!("decode worker stopped");
}
