//! Terminal client for the Chatvox relay.
//!
//! Reads lines from stdin and prints the server's events. `/clear` forgets the
//! conversation, `/personality <text>` sets a new system prompt, `/quit` exits.
//! Dropped connections are retried on the reconnect schedule.

use anyhow::{Context, Result, bail};
use base64::{Engine, engine::general_purpose::STANDARD};
use chatvox_api::{
    backoff::ReconnectPolicy,
    ws::protocol::{ClientMessage, ServerMessage},
};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use std::{io::Write, path::PathBuf, time::Duration};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message as WsMessage,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(version, about = "Chat with a Chatvox server from the terminal")]
struct Args {
    /// WebSocket endpoint of the server.
    #[arg(long, default_value = "ws://127.0.0.1:3000/ws")]
    url: String,
    /// Write the audio of the latest reply to this file.
    #[arg(long)]
    audio_out: Option<PathBuf>,
    /// Consecutive reconnect attempts before giving up.
    #[arg(long, default_value_t = 5)]
    max_attempts: u32,
    /// Delay before the first reconnect attempt, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    base_delay_ms: u64,
    /// Longest delay between reconnect attempts, in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    max_delay_ms: u64,
}

enum Input {
    Send(ClientMessage),
    Quit,
    Ignore,
}

enum SessionEnd {
    Quit,
    Disconnected,
}

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Ignore;
    }
    match line.split_once(' ').unwrap_or((line, "")) {
        ("/quit", _) => Input::Quit,
        ("/clear", _) => Input::Send(ClientMessage::ClearHistory),
        ("/personality", rest) if !rest.trim().is_empty() => {
            Input::Send(ClientMessage::SetPersonality {
                personality: rest.trim().to_string(),
            })
        }
        ("/personality", _) => {
            eprintln!("usage: /personality <system prompt>");
            Input::Ignore
        }
        _ => Input::Send(ClientMessage::UserMessage {
            message: line.to_string(),
        }),
    }
}

async fn show_event(event: ServerMessage, audio_out: Option<&PathBuf>) -> Result<()> {
    match event {
        ServerMessage::Processing { message } => println!("… {message}"),
        ServerMessage::AiResponse { text } => println!("ai> {text}"),
        ServerMessage::Audio { audio } => {
            let bytes = STANDARD.decode(audio).context("Server sent invalid base64 audio")?;
            match audio_out {
                Some(path) => {
                    tokio::fs::write(path, &bytes).await?;
                    println!("[audio: {} bytes -> {}]", bytes.len(), path.display());
                }
                None => println!("[audio: {} bytes]", bytes.len()),
            }
        }
        ServerMessage::Error { message } => println!("error: {message}"),
        ServerMessage::HistoryCleared => println!("[history cleared]"),
        ServerMessage::PersonalitySet { message } => println!("[{message}]"),
    }
    Ok(())
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

async fn run_session(
    socket: Socket,
    lines: &mut Lines<BufReader<Stdin>>,
    args: &Args,
) -> Result<SessionEnd> {
    let (mut ws_tx, mut ws_rx) = socket.split();
    prompt()?;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    let _ = ws_tx.close().await;
                    return Ok(SessionEnd::Quit);
                };
                match parse_input(&line) {
                    Input::Send(msg) => {
                        let json = serde_json::to_string(&msg)?;
                        if ws_tx.send(WsMessage::Text(json.into())).await.is_err() {
                            return Ok(SessionEnd::Disconnected);
                        }
                    }
                    Input::Quit => {
                        let _ = ws_tx.close().await;
                        return Ok(SessionEnd::Quit);
                    }
                    Input::Ignore => prompt()?,
                }
            }
            frame = ws_rx.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    match serde_json::from_str::<ServerMessage>(text.as_str()) {
                        Ok(event) => {
                            // Input is accepted again once the exchange has finished.
                            let ready = event.is_terminal();
                            show_event(event, args.audio_out.as_ref()).await?;
                            if ready {
                                prompt()?;
                            }
                        }
                        Err(e) => warn!("Ignoring unrecognized server message: {}", e),
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => return Ok(SessionEnd::Disconnected),
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    return Ok(SessionEnd::Disconnected);
                }
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    let args = Args::parse();
    let policy = ReconnectPolicy {
        base_delay: Duration::from_millis(args.base_delay_ms),
        max_delay: Duration::from_millis(args.max_delay_ms),
        max_attempts: args.max_attempts,
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut backoff = policy.schedule();
    loop {
        match connect_async(args.url.as_str()).await {
            Ok((socket, _)) => {
                backoff.reset();
                info!("Connected to {}", args.url);
                match run_session(socket, &mut lines, &args).await? {
                    SessionEnd::Quit => return Ok(()),
                    SessionEnd::Disconnected => warn!("Disconnected from server."),
                }
            }
            Err(e) => warn!("Connection to {} failed: {}", args.url, e),
        }

        let Some(delay) = backoff.next_delay() else {
            bail!("Giving up after {} reconnect attempts", backoff.attempts());
        };
        info!(delay_ms = delay.as_millis() as u64, "Reconnecting...");
        tokio::time::sleep(delay).await;
    }
}
