//! Terminal runner - drives the controller from stdin and prints snapshots
//!
//! The runner is a UI collaborator like any other: it only issues commands
//! through a [`ControllerHandle`] and renders what the controller publishes.

use std::sync::Arc;

use devlink_app::{ConnectOutcome, ControllerHandle, SessionController, SessionHooks, Settings};
use devlink_core::prelude::*;
use devlink_core::DeviceId;
use devlink_device::{AdbServerTransport, UsbPlatform};
use tokio::sync::mpsc;

use crate::commands::{parse_command, Command, HELP};
use crate::output::Printer;
use crate::selector::{parse_selection, PromptSelector, SelectionAnswer, SelectionRequest};

/// Command-line choices that shape the run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Print NDJSON events instead of human lines
    pub json: bool,
    /// Print every probe tick
    pub readings: bool,
    /// Connect to this serial on startup
    pub serial: Option<String>,
    /// Prompt for a device on startup
    pub select: bool,
}

/// Run the controller against the USB host until `quit` or Ctrl-C
pub async fn run(settings: Settings, options: RunOptions) -> Result<()> {
    info!(
        "ADB server {}:{}, probe every {:?}",
        settings.adb.host,
        settings.adb.port,
        settings.probe.interval()
    );

    let (selector, selections) = PromptSelector::new();
    let platform = Arc::new(UsbPlatform::new(
        selector,
        settings.devices.authorized_serials.clone(),
        settings.devices.trust_all,
    ));
    let transport = Arc::new(AdbServerTransport::new(settings.adb.server()));
    let hooks = SessionHooks::new().on_ready(|snapshot| {
        if let Some(device) = &snapshot.device {
            info!("Post-ready setup finished for {}", device.display_name());
        }
    });

    let (handle, task) = SessionController::spawn(platform, transport, settings, hooks);

    let (line_tx, lines) = mpsc::unbounded_channel();
    std::thread::spawn(move || read_stdin_blocking(line_tx));

    let (outcome_tx, outcomes) = mpsc::unbounded_channel();
    let mut runner = Runner {
        handle: handle.clone(),
        printer: Printer::new(options.json, options.readings),
        outcome_tx,
        prompt: None,
    };

    if options.serial.is_some() || options.select {
        runner.connect(options.serial.clone());
    }
    runner.event_loop(lines, selections, outcomes).await;

    if let Some(request) = runner.prompt.take() {
        request.choose(None);
    }
    drop(runner);

    handle.shutdown().await?;
    drop(handle);
    if let Err(e) = task.await {
        error!("Controller task failed: {}", e);
    }

    info!("devlink exiting");
    Ok(())
}

struct Runner {
    handle: ControllerHandle,
    printer: Printer,
    outcome_tx: mpsc::UnboundedSender<ConnectOutcome>,
    /// Open selection prompt; the next stdin line answers it
    prompt: Option<SelectionRequest>,
}

impl Runner {
    async fn event_loop(
        &mut self,
        mut lines: mpsc::UnboundedReceiver<String>,
        mut selections: mpsc::UnboundedReceiver<SelectionRequest>,
        mut outcomes: mpsc::UnboundedReceiver<ConnectOutcome>,
    ) {
        let mut snapshots = self.handle.subscribe();
        let initial = snapshots.borrow_and_update().clone();
        self.printer.status(&initial);
        let mut stdin_open = true;

        loop {
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        info!("Controller stopped");
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    self.printer.snapshot(&snapshot);
                }
                Some(request) = selections.recv() => self.open_prompt(request),
                Some(outcome) = outcomes.recv() => self.printer.outcome(&outcome),
                line = lines.recv(), if stdin_open => match line {
                    Some(line) => {
                        if !self.handle_line(&line) {
                            info!("Quit requested");
                            break;
                        }
                    }
                    None => {
                        debug!("Stdin closed");
                        stdin_open = false;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
            }
        }
    }

    fn open_prompt(&mut self, request: SelectionRequest) {
        if let Some(previous) = self.prompt.take() {
            previous.choose(None);
        }
        self.printer.choices(&request.candidates);
        self.prompt = Some(request);
    }

    /// Handle one stdin line; returns false on quit
    fn handle_line(&mut self, line: &str) -> bool {
        if let Some(request) = self.prompt.take() {
            match parse_selection(line, request.candidates.len()) {
                SelectionAnswer::Choice(index) => {
                    request.choose(Some(index));
                }
                SelectionAnswer::Cancel => {
                    request.choose(None);
                }
                SelectionAnswer::Invalid => {
                    self.printer
                        .notice("Enter a number from the list, or 'cancel'");
                    self.prompt = Some(request);
                }
            }
            return true;
        }

        let Some(command) = parse_command(line) else {
            return true;
        };

        match command {
            Command::Connect(serial) => self.connect(serial),
            Command::AutoConnect => {
                if let Err(e) = self.handle.auto_connect() {
                    warn!("Auto-connect not sent: {}", e);
                }
            }
            Command::Disconnect => {
                let handle = self.handle.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle.disconnect().await {
                        warn!("Disconnect failed: {}", e);
                    }
                });
            }
            Command::Status => {
                let snapshot = self.handle.snapshot();
                self.printer.status(&snapshot);
            }
            Command::Help => self.printer.notice(HELP),
            Command::Quit => return false,
            Command::Unknown(verb) => {
                warn!("Unknown stdin command: {}", verb);
                self.printer
                    .notice(&format!("Unknown command '{}', type 'help'", verb));
            }
        }
        true
    }

    /// Connect to `serial`, or prompt for a device; the outcome is printed
    /// when it arrives
    fn connect(&self, serial: Option<String>) {
        let handle = self.handle.clone();
        let tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let outcome = match serial {
                Some(serial) => handle.connect(DeviceId::new(serial)).await,
                None => handle.select_and_connect().await,
            };
            let _ = tx.send(outcome);
        });
    }
}

/// Forward stdin lines to the runner (blocking, run on its own thread)
fn read_stdin_blocking(tx: mpsc::UnboundedSender<String>) {
    use std::io::BufRead;

    for line in std::io::stdin().lock().lines() {
        match line {
            Ok(line) => {
                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        }
    }

    debug!("Stdin reader exiting");
}
