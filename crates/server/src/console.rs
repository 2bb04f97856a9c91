use std::io::BufRead;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::thread;

use log::debug;

/// Operator console command queue. Lines arrive from the stdin reader
/// thread (or from `Server::execute_console_command`) and are drained by
/// the simulation thread during input processing, so command handling
/// never races the world.
pub struct Console {
    receiver: Receiver<String>,
}

impl Console {
    pub fn new() -> (Sender<String>, Self) {
        let (sender, receiver) = std::sync::mpsc::channel::<String>();
        (sender, Self { receiver })
    }

    /// Next queued line, if any. Non-blocking.
    pub fn poll(&self) -> Option<String> {
        match self.receiver.try_recv() {
            Ok(line) => Some(line),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Forward stdin lines into the console queue on a dedicated thread.
/// The thread exits when stdin closes or the queue is gone.
pub fn spawn_stdin_reader(sender: Sender<String>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if sender.send(line).is_err() {
                break;
            }
        }
        debug!("console input closed");
    });
}
