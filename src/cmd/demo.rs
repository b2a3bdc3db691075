//! Interactive session (`portfolio-harness demo`).
//!
//! Opens one push channel and reads commands from stdin while printing push
//! events as they arrive.

use anyhow::Result;
use console::style;
use portfolio_harness::config::Config;
use portfolio_harness::identity::ClientIdentity;
use portfolio_harness::protocol::{
    ClientMessage, ProgressEvent, ServerMessage, TaskId, processing_time, total_portfolio_value,
};
use portfolio_harness::pull::{HttpPullChannel, PullChannel};
use portfolio_harness::push::{PushChannel, PushConnector, PushEvent, WsConnector};
use portfolio_harness::report::format_money;
use portfolio_harness::ui::icons::{CHECK, CROSS, MONEY, PLUG, PROGRESS};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::super::Cli;
use super::RunStatus;
use super::run::warn_unknown_types;

const HELP: &str = "\
Commands:
  start [types...]  start an analysis (default: configured portfolio types)
  status            fetch the current task's status over REST
  result            fetch the current task's result over REST
  ping              send a liveness probe over the push channel
  help              show this help
  quit              close the connection and exit";

#[derive(Debug, PartialEq, Eq)]
enum DemoCommand {
    Start(Vec<String>),
    Status,
    Result,
    Ping,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

fn parse_command(line: &str) -> DemoCommand {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return DemoCommand::Empty;
    };
    match head.to_lowercase().as_str() {
        "start" => DemoCommand::Start(
            words
                .flat_map(|w| w.split(','))
                .filter(|w| !w.is_empty())
                .map(str::to_lowercase)
                .collect(),
        ),
        "status" => DemoCommand::Status,
        "result" => DemoCommand::Result,
        "ping" => DemoCommand::Ping,
        "help" | "?" => DemoCommand::Help,
        "quit" | "exit" | "q" => DemoCommand::Quit,
        other => DemoCommand::Unknown(other.to_string()),
    }
}

pub async fn cmd_demo(cli: &Cli) -> Result<RunStatus> {
    let config = Config::load(&cli.overrides())?;
    let pull = HttpPullChannel::new(&config.base_url, config.request_timeout)?;
    if let Err(e) = pull.check_health().await {
        eprintln!("{} {}", style("✗").red(), e);
        return Ok(RunStatus::ServerUnreachable);
    }

    let identity = ClientIdentity::generate();
    let connector = WsConnector::new(config.base_url.clone());
    let mut channel = connector.open(&identity).await?;

    println!("{}Connected as {}", PLUG, style(&identity).cyan());
    println!("{HELP}");

    let mut session = Session {
        pull: &pull,
        config: &config,
        identity: &identity,
        task_id: None,
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut push_live = true;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    DemoCommand::Quit => break,
                    command => session.handle(command, &mut channel).await,
                }
            }
            event = channel.next_event(), if push_live => match event {
                Some(event) => print_push_event(&event),
                None => push_live = false,
            },
        }
    }

    channel.close().await;
    println!("Bye.");
    Ok(RunStatus::Passed)
}

struct Session<'a> {
    pull: &'a HttpPullChannel,
    config: &'a Config,
    identity: &'a ClientIdentity,
    task_id: Option<TaskId>,
}

impl Session<'_> {
    async fn handle(&mut self, command: DemoCommand, channel: &mut PushChannel) {
        match command {
            DemoCommand::Start(types) => {
                let types = if types.is_empty() {
                    self.config.portfolio_types.clone()
                } else {
                    types
                };
                warn_unknown_types(&types);
                match self
                    .pull
                    .start_task(
                        self.identity,
                        &types,
                        &self.config.orchestrator.calculation_type,
                    )
                    .await
                {
                    Ok(task_id) => {
                        println!("{}Started task {}", CHECK, style(&task_id).yellow());
                        if let Err(e) = channel.request_status(&task_id) {
                            println!("  {}", style(e).dim());
                        }
                        self.task_id = Some(task_id);
                    }
                    Err(e) => println!("{}{}", CROSS, e),
                }
            }
            DemoCommand::Status => {
                let Some(task_id) = self.current_task() else { return };
                match self.pull.fetch_status(task_id).await {
                    Ok(event) => println!("{}{}", PROGRESS, describe(&event)),
                    Err(e) => println!("{}{}", CROSS, e),
                }
            }
            DemoCommand::Result => {
                let Some(task_id) = self.current_task() else { return };
                match self.pull.fetch_result(task_id).await {
                    Ok(result) => {
                        if let Some(value) = total_portfolio_value(&result) {
                            println!("{}Total value: ${}", MONEY, format_money(value));
                        }
                        if let Some(time) = processing_time(&result) {
                            println!("  Processing time: {time}");
                        }
                        match serde_json::to_string_pretty(&result) {
                            Ok(pretty) => println!("{}", style(pretty).dim()),
                            Err(_) => println!("{}", result),
                        }
                    }
                    Err(e) => println!("{}{}", CROSS, e),
                }
            }
            DemoCommand::Ping => {
                if let Err(e) = channel.send(&ClientMessage::Ping) {
                    println!("{}{}", CROSS, e);
                }
            }
            DemoCommand::Help => println!("{HELP}"),
            DemoCommand::Unknown(word) => {
                println!("Unknown command '{}'. Type 'help' for commands.", word)
            }
            DemoCommand::Quit | DemoCommand::Empty => {}
        }
    }

    fn current_task(&self) -> Option<&str> {
        if self.task_id.is_none() {
            println!("No task yet. Use 'start' first.");
        }
        self.task_id.as_deref()
    }
}

fn describe(event: &ProgressEvent) -> String {
    format!(
        "{} {:.1}% ({}/{}) {}",
        event.status,
        event.progress_percentage,
        event.processed_items,
        event.total_items,
        event.current_step
    )
}

fn print_push_event(event: &PushEvent) {
    match event {
        PushEvent::Connected => {}
        PushEvent::Message(ServerMessage::Pong { .. }) => {
            println!("{}", style("← pong").dim());
        }
        PushEvent::Message(ServerMessage::Progress(message)) => {
            println!(
                "← [{}] {}",
                style(&message.task_id).yellow(),
                describe(&message.event)
            );
            if let Some(value) = message.event.total_value() {
                println!("  {}Total value: ${}", MONEY, format_money(value));
            }
        }
        PushEvent::Message(ServerMessage::Other(value)) => {
            println!("{}", style(format!("← {value}")).dim());
        }
        PushEvent::Closed(reason) => println!("{}Push channel closed: {}", CROSS, reason),
        PushEvent::Error(detail) => println!("{}Push channel error: {}", CROSS, detail),
    }
}
