//! Background decode jobs.
//!
//! One dedicated worker per job. The worker owns its decode buffer until it
//! hands it over through a one-slot channel; the render thread drains the
//! channel without blocking when it next binds the texture.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::cache::LoadOptions;
use super::pixels::Bitmap;
use crate::decode::Decoder;
use crate::error::TextureError;

/// Thread name of decode workers.
pub const WORKER_NAME: &str = "texture-decode";

/// Result of polling a job.
#[derive(Debug)]
pub enum JobState {
    /// Decode still in flight.
    Running,
    /// Decoded pixels, handed over exactly once.
    Done(Bitmap),
    /// The worker finished without producing pixels.
    Failed,
}

/// A decode running on its own thread.
#[derive(Debug)]
pub struct AsyncLoadJob {
    key: String,
    options: LoadOptions,
    receiver: Receiver<Bitmap>,
    delivered: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl AsyncLoadJob {
    /// Start decoding `key` on a new worker thread.
    ///
    /// # Errors
    ///
    /// [`TextureError::ThreadSpawn`] if the thread cannot be created.
    pub fn spawn(
        key: &str,
        options: LoadOptions,
        decoder: Arc<dyn Decoder>,
    ) -> Result<Self, TextureError> {
        let (sender, receiver) = mpsc::sync_channel(1);
        let delivered = Arc::new(AtomicBool::new(false));
        let worker_delivered = Arc::clone(&delivered);
        let worker_key = key.to_owned();
        let worker = thread::Builder::new()
            .name(WORKER_NAME.into())
            .spawn(move || match decoder.decode(&worker_key) {
                Ok(bitmap) => {
                    // fails only if the job was dropped meanwhile
                    if sender.send(bitmap).is_ok() {
                        worker_delivered.store(true, Ordering::Release);
                    }
                }
                Err(e) => log::warn!("decode of {worker_key} failed: {e}"),
            })
            .map_err(TextureError::ThreadSpawn)?;
        log::debug!("spawned decode job for {key}");
        Ok(Self {
            key: key.to_owned(),
            options,
            receiver,
            delivered,
            worker: Some(worker),
        })
    }

    /// Asset key being decoded.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Upload settings requested for this job.
    #[must_use]
    pub fn options(&self) -> LoadOptions {
        self.options
    }

    /// Non-blocking check for the decode result.
    pub fn poll(&self) -> JobState {
        match self.receiver.try_recv() {
            Ok(bitmap) => JobState::Done(bitmap),
            Err(TryRecvError::Empty) => JobState::Running,
            Err(TryRecvError::Disconnected) => JobState::Failed,
        }
    }

    /// Whether the worker handed over decoded pixels. Stays `false` for a
    /// failed decode even after the worker exits.
    #[must_use]
    pub fn has_result(&self) -> bool {
        self.delivered.load(Ordering::Acquire)
    }

    /// Whether the worker thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Block until the worker exits. The result, if any, stays available
    /// to [`Self::poll`].
    pub fn wait(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("decode worker for {} panicked", self.key);
            }
        }
    }
}

impl Drop for AsyncLoadJob {
    fn drop(&mut self) {
        self.wait();
    }
}
