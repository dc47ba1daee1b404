use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use tracing::{debug, trace};

/// Completion of one background read.
#[derive(Debug)]
pub struct ReadOutcome {
    pub request_id: u64,
    pub result: io::Result<Vec<u8>>,
}

/// Reads whole files on the rayon pool and hands the bytes back over a channel.
pub struct FileReader {
    sender: Sender<ReadOutcome>,
    receiver: Receiver<ReadOutcome>,
}

impl Default for FileReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FileReader {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }

    pub fn read(&self, request_id: u64, path: PathBuf) {
        let sender = self.sender.clone();
        debug!("Start reading {path:?} (request {request_id})");
        rayon::spawn(move || {
            let result = fs::read(&path);
            trace!("Finished reading {path:?} (request {request_id}): ok={}", result.is_ok());
            // The receiving side only disappears on shutdown.
            let _ = sender.send(ReadOutcome { request_id, result });
        });
    }

    pub fn try_next(&self) -> Option<ReadOutcome> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    #[cfg(test)]
    pub fn wait_next(&self, timeout: std::time::Duration) -> Option<ReadOutcome> {
        self.receiver.recv_timeout(timeout).ok()
    }
}
