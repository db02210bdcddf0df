//! A terminal front-end for the voice travel assistant.
//!
//! Type to talk to the agent, paste a JSON object to inject an agent
//! message, or use one of the slash commands.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use voyagr::SessionBuilder;
use voyagr::console::{ConsoleVoiceLink, LinkOutput};
use voyagr::core::{DisplaySelection, SessionError, SessionStatus, ViewModel};
use voyagr::render;
use voyagr_model::{ConversationId, Role};

type ConnectResult = Result<ConversationId, SessionError>;

const BAR_CHAR: &str = "▎";

const HELP: &str = "\
/connect        start a conversation
/disconnect     end the conversation
/hangup         simulate the agent hanging up
/volume <0..1>  set the playback volume
/quit           leave";

enum Command<'a> {
    Connect,
    Disconnect,
    HangUp,
    Volume(&'a str),
    Help,
    Quit,
    Say(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        let (head, rest) = line.split_once(' ').unwrap_or((line, ""));
        match head {
            "/connect" => Command::Connect,
            "/disconnect" => Command::Disconnect,
            "/hangup" => Command::HangUp,
            "/volume" => Command::Volume(rest.trim()),
            "/help" => Command::Help,
            "/quit" | "/exit" => Command::Quit,
            _ => Command::Say(line),
        }
    }
}

/// What has already been printed, so only changes are shown.
#[derive(Default)]
struct Printed {
    status: Option<(SessionStatus, bool)>,
    transcript_len: usize,
    selection: DisplaySelection,
}

impl Printed {
    fn print_changes(&mut self, view: &ViewModel) {
        let status = (view.lifecycle_status(), view.is_speaking());
        if self.status != Some(status) {
            self.status = Some(status);
            println!("{}{}", BAR_CHAR.bright_black(), render::status_line(view).dimmed());
        }

        let transcript = view.transcript_snapshot();
        if transcript.len() < self.transcript_len {
            self.transcript_len = 0;
        }
        for entry in &transcript[self.transcript_len..] {
            let line = render::transcript_line(entry);
            match entry.role {
                Role::User => println!("{}{}", BAR_CHAR.bright_green(), line),
                Role::Assistant => {
                    println!("{}{}", BAR_CHAR.bright_cyan(), line.bright_white())
                }
                Role::ApiDebug => println!("{}{}", BAR_CHAR.bright_black(), line.dimmed()),
            }
        }
        self.transcript_len = transcript.len();

        let selection = view.display_selection();
        if *selection != self.selection {
            self.selection = selection.clone();
            if let Some(panel) = render::trip_panel(selection) {
                for line in panel.lines() {
                    println!("{}{}", BAR_CHAR.bright_magenta(), line);
                }
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (error_tx, mut error_rx) = mpsc::unbounded_channel();
    let builder = match SessionBuilder::from_env() {
        Ok(builder) => builder,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };
    let (link, mut link_rx) = ConsoleVoiceLink::new();
    let session = match builder
        .on_error(move |err: &SessionError| {
            error_tx.send(err.clone()).ok();
        })
        .build(link.clone())
    {
        Ok(session) => session,
        Err(err) => {
            eprintln!("cannot reach the backend: {err}");
            return;
        }
    };

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    // Connecting runs on its own task so commands keep working meanwhile.
    let (connect_tx, mut connect_rx) = mpsc::unbounded_channel::<ConnectResult>();
    let mut spinner: Option<ProgressBar> = None;

    let mut view = session.view();
    let mut printed = Printed::default();
    printed.print_changes(&view.current());
    println!("{}", render::transcript(&[]).dimmed());
    println!("{}", HELP.dimmed());

    let mut lines = io::BufReader::new(io::stdin()).lines();
    loop {
        prompt();
        let line = select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    error!("error reading input: {err}");
                    break;
                }
            },
            changed = view.changed() => {
                let Some(current) = changed else {
                    break;
                };
                clear_prompt();
                printed.print_changes(&current);
                continue;
            },
            output = link_rx.recv() => {
                clear_prompt();
                match output {
                    Some(LinkOutput::Speak(text)) => {
                        println!("{}🔊 {}", BAR_CHAR.bright_cyan(), text.italic());
                    }
                    Some(LinkOutput::Silence) => {
                        println!("{}🔇 interrupted", BAR_CHAR.bright_black());
                    }
                    Some(LinkOutput::Volume(volume)) => {
                        debug!("link volume set to {volume}");
                    }
                    None => break,
                }
                continue;
            },
            Some(result) = connect_rx.recv() => {
                if let Some(spinner) = spinner.take() {
                    spinner.finish_and_clear();
                }
                clear_prompt();
                report_connect(result);
                continue;
            },
            err = error_rx.recv() => {
                if let Some(err) = err.filter(SessionError::is_user_visible) {
                    clear_prompt();
                    println!("{}⚠️  {}", BAR_CHAR.bright_red(), err.bright_red());
                }
                continue;
            },
        };

        match Command::parse(&line) {
            Command::Connect => {
                if spinner.is_none() {
                    let progress = ProgressBar::new_spinner();
                    progress.set_style(progress_style.clone());
                    progress.set_message("📞 Connecting...");
                    progress.enable_steady_tick(Duration::from_millis(100));
                    spinner = Some(progress);
                }
                session.connect_in_background(connect_tx.clone());
            }
            Command::Disconnect => {
                if let Err(err) = session.disconnect().await {
                    println!("{}{err}", BAR_CHAR.bright_yellow());
                }
            }
            Command::HangUp => {
                if !link.hang_up() {
                    println!("{}not connected", BAR_CHAR.bright_yellow());
                }
            }
            Command::Volume(value) => match value.parse::<f32>() {
                Ok(value) => {
                    session.set_volume(value).ok();
                }
                Err(_) => println!("{}usage: /volume <0..1>", BAR_CHAR.bright_yellow()),
            },
            Command::Help => println!("{}", HELP.dimmed()),
            Command::Quit => break,
            Command::Say("") => {}
            Command::Say(text) => {
                if !link.feed_line(text) {
                    println!("{}not connected, try /connect", BAR_CHAR.bright_yellow());
                }
            }
        }
    }

    if let Some(spinner) = spinner.take() {
        spinner.finish_and_clear();
    }
    if session.view().current().lifecycle_status() != SessionStatus::Idle {
        session.disconnect().await.ok();
        // Give the transcript upload a chance to finish.
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

fn report_connect(result: ConnectResult) {
    match result {
        Ok(conversation_id) => {
            println!("{}conversation {conversation_id}", BAR_CHAR.bright_black());
        }
        Err(SessionError::HandshakeFailed(_) | SessionError::VoiceLink(_)) => {
            // Already reported through the error callback.
        }
        Err(err) => println!("{}{err}", BAR_CHAR.bright_yellow()),
    }
}

fn prompt() {
    print!("> ");
    std::io::stdout().flush().ok();
}

fn clear_prompt() {
    print!("\r");
}
