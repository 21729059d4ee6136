//! Voice dictation for the compose field.
//!
//! A [`SpeechRecognizer`] is the platform capability: it starts and stops one
//! single-utterance recognition session and reports progress as
//! [`VoiceEvent`]s. [`VoiceInput`] owns the optional recognizer and the
//! listening flag; when no recognizer is available only the mic affordance is
//! disabled.

use crate::config::VoiceConfig;
use crate::error::ChatError;
use crate::events::{VoiceEvent, VoiceSignal};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

/// Speech-to-text capability: one non-interim utterance per session
pub trait SpeechRecognizer: Send {
    /// Begin listening; notifications for `session` go to `events`
    fn start(
        &mut self,
        session: u64,
        events: mpsc::UnboundedSender<VoiceSignal>,
    ) -> Result<(), ChatError>;

    /// Stop the active session, if any
    fn stop(&mut self);
}

/// Outcome of [`VoiceInput::toggle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceToggle {
    Started,
    Stopped,
}

/// Voice input adapter driving the compose field
pub struct VoiceInput {
    recognizer: Option<Box<dyn SpeechRecognizer>>,
    listening: bool,
    session: u64,
    events_tx: mpsc::UnboundedSender<VoiceSignal>,
    events_rx: mpsc::UnboundedReceiver<VoiceSignal>,
}

impl VoiceInput {
    pub fn new(recognizer: Option<Box<dyn SpeechRecognizer>>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            recognizer,
            listening: false,
            session: 0,
            events_tx,
            events_rx,
        }
    }

    pub fn is_available(&self) -> bool {
        self.recognizer.is_some()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Stop when listening, start otherwise
    pub fn toggle(&mut self) -> Result<VoiceToggle, ChatError> {
        let recognizer = self
            .recognizer
            .as_mut()
            .ok_or(ChatError::VoiceUnavailable)?;

        if self.listening {
            recognizer.stop();
            self.listening = false;
            return Ok(VoiceToggle::Stopped);
        }

        self.session += 1;
        recognizer.start(self.session, self.events_tx.clone())?;
        self.listening = true;
        Ok(VoiceToggle::Started)
    }

    /// Drain pending notifications; returns the transcript if one arrived
    pub fn poll(&mut self) -> Option<String> {
        let mut transcript = None;
        while let Ok(signal) = self.events_rx.try_recv() {
            if let Some(text) = self.handle_signal(signal) {
                transcript = Some(text);
            }
        }
        transcript
    }

    fn handle_signal(&mut self, signal: VoiceSignal) -> Option<String> {
        if signal.session != self.session {
            tracing::trace!(session = signal.session, "Ignoring stale voice event");
            return None;
        }

        match signal.event {
            VoiceEvent::Started => {
                tracing::info!("Speech recognition started");
                None
            }
            VoiceEvent::Transcript(text) => {
                tracing::info!("Speech to text result: {}", text);
                self.listening = false;
                Some(text)
            }
            VoiceEvent::Error(error) => {
                tracing::error!("Speech recognition error: {}", error);
                self.listening = false;
                None
            }
            VoiceEvent::Ended => {
                tracing::info!("Speech recognition ended");
                self.listening = false;
                None
            }
        }
    }
}

impl Drop for VoiceInput {
    fn drop(&mut self) {
        if self.listening {
            if let Some(recognizer) = self.recognizer.as_mut() {
                recognizer.stop();
            }
        }
    }
}

/// Recognizer backed by an external speech-to-text program that listens for
/// one utterance and prints the transcript on stdout
pub struct CommandRecognizer {
    program: PathBuf,
    args: Vec<String>,
    cancel: Option<oneshot::Sender<()>>,
}

impl CommandRecognizer {
    /// Recognizer for the configured command, if its program can be found
    pub fn detect(config: &VoiceConfig) -> Option<Self> {
        let (program, args) = config.command.split_first()?;
        let Some(program) = resolve_program(program) else {
            tracing::warn!("Speech recognition program {:?} not found", program);
            return None;
        };

        let args = args
            .iter()
            .map(|arg| arg.replace("{lang}", &config.language))
            .collect();

        Some(Self {
            program,
            args,
            cancel: None,
        })
    }
}

impl SpeechRecognizer for CommandRecognizer {
    fn start(
        &mut self,
        session: u64,
        events: mpsc::UnboundedSender<VoiceSignal>,
    ) -> Result<(), ChatError> {
        self.stop();

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ChatError::Voice(format!("{}: {}", self.program.display(), e)))?;

        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        self.cancel = Some(cancel_tx);

        let send = move |event| {
            let _ = events.send(VoiceSignal { session, event });
        };

        tokio::spawn(async move {
            send(VoiceEvent::Started);

            let mut stdout = child.stdout.take();
            let read_transcript = async {
                let mut text = String::new();
                if let Some(stdout) = stdout.as_mut() {
                    stdout.read_to_string(&mut text).await?;
                }
                Ok::<_, std::io::Error>(text)
            };

            let outcome = tokio::select! {
                result = async { tokio::join!(child.wait(), read_transcript) } => Some(result),
                _ = &mut cancel_rx => None,
            };

            match outcome {
                None => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
                Some((Ok(status), Ok(text))) if status.success() => {
                    let transcript = text.trim();
                    if transcript.is_empty() {
                        send(VoiceEvent::Error("no-speech".to_string()));
                    } else {
                        send(VoiceEvent::Transcript(transcript.to_string()));
                    }
                }
                Some((Ok(status), Ok(_))) => {
                    send(VoiceEvent::Error(format!("recognizer exited with {status}")));
                }
                Some((Err(e), _)) | Some((_, Err(e))) => {
                    send(VoiceEvent::Error(e.to_string()));
                }
            }

            send(VoiceEvent::Ended);
        });

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

/// Resolve `program` as an existing path or through `PATH`
fn resolve_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|path| path.is_file())
}
