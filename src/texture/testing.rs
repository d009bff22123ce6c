//! Test doubles for the decode boundary.

use std::sync::{Condvar, Mutex, PoisonError};

use rustc_hash::FxHashMap;

use super::pixels::Bitmap;
use crate::decode::Decoder;
use crate::error::DecodeError;

#[derive(Debug, Default)]
struct Record {
    calls: FxHashMap<String, usize>,
    completed: usize,
    thread_name: Option<String>,
}

/// Decoder producing a 2x2 RGBA bitmap per key. Keys containing
/// `missing` fail. A gated decoder holds every decode until [`Self::open`].
#[derive(Debug, Default)]
pub(crate) struct FakeDecoder {
    record: Mutex<Record>,
    gate: Mutex<bool>,
    opened: Condvar,
}

impl FakeDecoder {
    pub(crate) fn new() -> Self {
        Self {
            gate: Mutex::new(true),
            ..Self::default()
        }
    }

    pub(crate) fn gated() -> Self {
        Self::default()
    }

    pub(crate) fn open(&self) {
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.opened.notify_all();
    }

    pub(crate) fn calls(&self, key: &str) -> usize {
        self.lock().calls.get(key).copied().unwrap_or(0)
    }

    pub(crate) fn completed(&self) -> usize {
        self.lock().completed
    }

    pub(crate) fn last_thread_name(&self) -> Option<String> {
        self.lock().thread_name.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Record> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pixel value of row `row` for `key`.
    pub(crate) fn row_value(key: &str, row: u32) -> u8 {
        let seed = key.bytes().fold(0u8, u8::wrapping_add);
        seed.wrapping_add(u8::try_from(row).unwrap_or(0).wrapping_mul(40))
    }
}

impl Decoder for FakeDecoder {
    fn decode(&self, key: &str) -> Result<Bitmap, DecodeError> {
        {
            let mut record = self.lock();
            *record.calls.entry(key.to_owned()).or_default() += 1;
            record.thread_name =
                std::thread::current().name().map(str::to_owned);
        }
        let mut open = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        while !*open {
            open = self
                .opened
                .wait(open)
                .unwrap_or_else(PoisonError::into_inner);
        }
        drop(open);

        let result = if key.contains("missing") {
            Err(DecodeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                key.to_owned(),
            )))
        } else {
            let pixels = (0..2)
                .flat_map(|row| [Self::row_value(key, row); 8])
                .collect();
            Ok(Bitmap::from_bytes(2, 2, 4, pixels))
        };
        self.lock().completed += 1;
        result
    }
}
