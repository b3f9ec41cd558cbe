use crate::commands::{CommandSource, OverlayEvent};
use crate::level::StateId;
use log::{debug, trace, warn};
use std::io::{BufReader, Read};
use std::iter;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

/// Longest run of bytes kept while waiting for a token to complete.
pub const MAX_COMMAND_LEN: usize = 100;

const EXIT_TOKEN: &str = "[exit]";

/// Splits a byte stream into commands: `[b:0]`, `[b:25]`, `[b:50]`, `[b:75]`, `[b:100]` and
/// `[exit]`. Tokens are matched exactly and case sensitively. Bytes that cannot lead to a token
/// are dropped without complaint.
#[derive(Debug)]
pub struct CommandParser {
    buffer: Vec<u8>,
    tokens: Vec<(Vec<u8>, OverlayEvent)>,
}

impl CommandParser {
    pub fn new() -> Self {
        let tokens = StateId::all()
            .map(|state| {
                (
                    format!("[b:{}]", state.percent()).into_bytes(),
                    OverlayEvent::Show(state),
                )
            })
            .chain(iter::once((
                EXIT_TOKEN.as_bytes().to_vec(),
                OverlayEvent::Shutdown,
            )))
            .collect();

        Self {
            buffer: Vec::with_capacity(MAX_COMMAND_LEN),
            tokens,
        }
    }

    pub fn push(&mut self, byte: u8) -> Option<OverlayEvent> {
        self.buffer.push(byte);

        if let Some(event) = self.matching_token() {
            self.buffer.clear();
            return Some(event);
        }

        if !self.is_prefix(&self.buffer) || self.buffer.len() >= MAX_COMMAND_LEN {
            trace!(
                "Discarding unrecognised input {:?}",
                String::from_utf8_lossy(&self.buffer)
            );
            self.buffer.clear();
            // The byte that broke the match may itself start the next token.
            if self.is_prefix(&[byte]) {
                self.buffer.push(byte);
            }
        }

        None
    }

    /// Bytes received since the last complete or discarded token.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    fn matching_token(&self) -> Option<OverlayEvent> {
        self.tokens
            .iter()
            .find(|(token, _)| token.as_slice() == self.buffer.as_slice())
            .map(|(_, event)| *event)
    }

    fn is_prefix(&self, bytes: &[u8]) -> bool {
        self.tokens.iter().any(|(token, _)| token.starts_with(bytes))
    }
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Commands read from a byte stream, normally stdin.
///
/// A reader thread feeds bytes into a channel so polling never blocks. Once the stream ends the
/// source keeps reporting [`OverlayEvent::Tick`]; only an `[exit]` token shuts the run down.
pub struct PipedSource {
    parser: CommandParser,
    bytes: Receiver<u8>,
    finished: bool,
}

impl PipedSource {
    pub fn spawn<R: Read + Send + 'static>(reader: R) -> Self {
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || Self::pump(reader, sender));

        Self {
            parser: CommandParser::new(),
            bytes: receiver,
            finished: false,
        }
    }

    pub fn stdin() -> Self {
        Self::spawn(std::io::stdin())
    }

    fn pump<R: Read>(reader: R, sender: Sender<u8>) {
        for byte in BufReader::new(reader).bytes() {
            match byte {
                Ok(byte) => {
                    if sender.send(byte).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!("Stopped reading commands: {e}");
                    return;
                }
            }
        }
    }
}

impl CommandSource for PipedSource {
    fn poll(&mut self) -> OverlayEvent {
        loop {
            match self.bytes.try_recv() {
                Ok(byte) => {
                    if let Some(event) = self.parser.push(byte) {
                        trace!("Command: {event:?}");
                        return event;
                    }
                }
                Err(TryRecvError::Empty) => return OverlayEvent::Tick,
                Err(TryRecvError::Disconnected) => {
                    if !self.finished {
                        debug!("End of command input");
                        self.finished = true;
                    }
                    return OverlayEvent::Tick;
                }
            }
        }
    }
}
