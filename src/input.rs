use std::{
    io::{self, BufRead},
    thread,
};

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};

use crate::controller::QuitSignal;

/// Posts to the quit channel. Cloned into every input source.
pub type QuitSender = Sender<()>;

pub fn quit_channel() -> (QuitSender, ChannelQuit) {
    let (tx, rx) = unbounded();
    (tx, ChannelQuit { rx, latched: false })
}

pub struct ChannelQuit {
    rx: Receiver<()>,
    latched: bool,
}

impl QuitSignal for ChannelQuit {
    fn quit_requested(&mut self) -> bool {
        if !self.latched {
            // A closed channel means every input source went away; keep running.
            self.latched = match self.rx.try_recv() {
                Ok(()) => true,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => false,
            };
        }
        self.latched
    }
}

fn is_quit_command(line: &str) -> bool {
    matches!(line.trim(), "q" | "Q" | "quit" | "exit")
}

/// Watches stdin for `q` followed by Enter. The thread ends on EOF.
pub fn spawn_stdin_watcher(quit_tx: QuitSender) -> Result<()> {
    thread::Builder::new()
        .name("stdin-quit".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if is_quit_command(&line) {
                    log::info!("quit requested from stdin");
                    let _ = quit_tx.send(());
                    break;
                }
            }
        })?;
    Ok(())
}
