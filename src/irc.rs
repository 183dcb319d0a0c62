//! Minimal IRC client: registers, joins the routed channels and relays
//! PRIVMSGs queued by request handlers.
//!
//! A single session task owns the connection, so every write goes through
//! one queue and lines from one request keep their order.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_native_tls::{TlsConnector, native_tls};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, error, info, warn};

use crate::delivery::MessageSink;
use crate::error::{NotifyError, Result};

const OUTBOUND_QUEUE_SIZE: usize = 1024;
/// Longest line we send, excluding the trailing CRLF
const MAX_LINE_BYTES: usize = 510;

#[derive(Debug, Clone, Deserialize)]
pub struct IrcConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_nickname")]
    pub nickname: String,
    #[serde(default = "default_nickname")]
    pub realname: String,
    #[serde(default = "default_tls")]
    pub tls: bool,
    /// PEM root certificate used to verify the server; system roots otherwise
    pub ca_file: Option<PathBuf>,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

fn default_host() -> String {
    "irc.hackint.org".to_string()
}

fn default_port() -> u16 {
    6697
}

fn default_nickname() -> String {
    "gitlab-irc".to_string()
}

fn default_tls() -> bool {
    true
}

fn default_reconnect_delay() -> u64 {
    15
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            nickname: default_nickname(),
            realname: default_nickname(),
            tls: default_tls(),
            ca_file: None,
            reconnect_delay_secs: default_reconnect_delay(),
        }
    }
}

pub trait IrcTransport: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> IrcTransport for T {}

type Transport = Box<dyn IrcTransport>;

/// Commands queued for the session task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcCommand {
    Join(String),
    Privmsg { target: String, text: String },
}

impl IrcCommand {
    /// Wire form of the command, without CRLF.
    pub fn to_line(&self) -> String {
        let line = match self {
            IrcCommand::Join(channel) => format!("JOIN {}", single_line(channel)),
            IrcCommand::Privmsg { target, text } => {
                format!("PRIVMSG {} :{}", single_line(target), single_line(text))
            }
        };
        truncate_line(line)
    }
}

fn single_line(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\r', '\n', '\0'], " ")
}

fn truncate_line(mut line: String) -> String {
    if line.len() > MAX_LINE_BYTES {
        let mut end = MAX_LINE_BYTES;
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        line.truncate(end);
    }
    line
}

/// The server messages the session reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Ping(String),
    Welcome,
    NicknameInUse,
    Error(String),
    Other(String),
}

impl ServerMessage {
    pub fn parse(line: &str) -> Self {
        let rest = match line.strip_prefix(':') {
            Some(prefixed) => prefixed.split_once(' ').map(|(_, r)| r).unwrap_or(""),
            None => line,
        };
        let (command, params) = rest.split_once(' ').unwrap_or((rest, ""));
        match command {
            "PING" => ServerMessage::Ping(params.trim_start_matches(':').to_string()),
            "001" => ServerMessage::Welcome,
            "433" => ServerMessage::NicknameInUse,
            "ERROR" => ServerMessage::Error(params.trim_start_matches(':').to_string()),
            other => ServerMessage::Other(other.to_string()),
        }
    }
}

/// Cloneable handle to the session queue; this is the delivery sink the
/// HTTP side uses.
#[derive(Debug, Clone)]
pub struct IrcSender {
    tx: mpsc::Sender<IrcCommand>,
}

impl IrcSender {
    fn enqueue(&self, channel: &str, command: IrcCommand) -> Result<()> {
        self.tx.try_send(command).map_err(|e| {
            let reason = match e {
                TrySendError::Full(_) => "outbound queue is full",
                TrySendError::Closed(_) => "IRC session has stopped",
            };
            NotifyError::DeliveryFailed {
                channel: channel.to_string(),
                reason: reason.to_string(),
            }
        })
    }
}

#[async_trait]
impl MessageSink for IrcSender {
    async fn deliver(&self, channel: &str, text: &str) -> Result<()> {
        self.enqueue(
            channel,
            IrcCommand::Privmsg {
                target: channel.to_string(),
                text: text.to_string(),
            },
        )
    }
}

enum SessionEnd {
    Disconnected,
    QueueClosed,
}

pub struct IrcClient {
    config: IrcConfig,
    tls: Option<TlsConnector>,
}

impl IrcClient {
    /// Prepares the client. Reading the CA file happens here so a bad
    /// trust root fails at startup.
    pub fn new(config: IrcConfig) -> Result<Self> {
        let tls = build_tls_connector(&config)?;
        Ok(Self { config, tls })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    async fn connect(&self) -> Result<Transport> {
        let address = self.address();
        let tcp = TcpStream::connect(&address)
            .await
            .map_err(|e| NotifyError::IrcConnection(format!("{}: {}", address, e)))?;

        match &self.tls {
            Some(connector) => {
                let stream = connector
                    .connect(&self.config.host, tcp)
                    .await
                    .map_err(|e| NotifyError::Tls(format!("handshake with {}: {}", address, e)))?;
                Ok(Box::new(stream))
            }
            None => Ok(Box::new(tcp)),
        }
    }

    /// Connects once and spawns the session task. The first connection
    /// must succeed; later drops are reconnected in the background.
    pub async fn start(self, channels: Vec<String>) -> Result<(IrcSender, JoinHandle<()>)> {
        info!("Connecting to IRC server {}", self.address());
        let transport = self.connect().await?;
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_SIZE);
        let handle = tokio::spawn(self.run(transport, channels, rx));
        Ok((IrcSender { tx }, handle))
    }

    async fn run(
        self,
        first: Transport,
        channels: Vec<String>,
        mut rx: mpsc::Receiver<IrcCommand>,
    ) {
        let delay = Duration::from_secs(self.config.reconnect_delay_secs);
        let mut next = Some(first);

        loop {
            let transport = match next.take() {
                Some(transport) => transport,
                None => match self.connect().await {
                    Ok(transport) => transport,
                    Err(e) => {
                        error!("Reconnect failed: {}", e);
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                },
            };

            match self.session(transport, &channels, &mut rx).await {
                Ok(SessionEnd::QueueClosed) => {
                    info!("IRC session finished");
                    return;
                }
                Ok(SessionEnd::Disconnected) => warn!("Disconnected from {}", self.address()),
                Err(e) => error!("IRC session error: {}", e),
            }

            tokio::time::sleep(delay).await;
        }
    }

    async fn session(
        &self,
        transport: Transport,
        channels: &[String],
        rx: &mut mpsc::Receiver<IrcCommand>,
    ) -> Result<SessionEnd> {
        let (reader, mut writer) = tokio::io::split(transport);
        let mut lines = LinesStream::new(BufReader::new(reader).lines());

        let mut nickname = self.config.nickname.clone();
        send_line(&mut writer, &format!("NICK {}", nickname)).await?;
        send_line(
            &mut writer,
            &format!("USER {} 0 * :{}", nickname, self.config.realname),
        )
        .await?;

        // Queued commands wait until the server has accepted us.
        let mut registered = false;

        loop {
            tokio::select! {
                line = lines.next() => {
                    let line = match line {
                        Some(line) => line?,
                        None => return Ok(SessionEnd::Disconnected),
                    };
                    debug!("<< {}", line);

                    match ServerMessage::parse(&line) {
                        ServerMessage::Ping(token) => {
                            send_line(&mut writer, &format!("PONG :{}", token)).await?;
                        }
                        ServerMessage::Welcome => {
                            registered = true;
                            info!("Registered as {}", nickname);
                            for channel in channels {
                                info!("Joining {}", channel);
                                send_line(&mut writer, &IrcCommand::Join(channel.clone()).to_line())
                                    .await?;
                            }
                        }
                        ServerMessage::NicknameInUse if !registered => {
                            nickname.push('_');
                            warn!("Nickname in use, retrying as {}", nickname);
                            send_line(&mut writer, &format!("NICK {}", nickname)).await?;
                        }
                        ServerMessage::Error(reason) => {
                            warn!("Server closed the link: {}", reason);
                            return Ok(SessionEnd::Disconnected);
                        }
                        _ => {}
                    }
                }
                command = rx.recv(), if registered => {
                    match command {
                        Some(command) => send_line(&mut writer, &command.to_line()).await?,
                        None => {
                            let _ = send_line(&mut writer, "QUIT :shutting down").await;
                            return Ok(SessionEnd::QueueClosed);
                        }
                    }
                }
            }
        }
    }
}

async fn send_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> Result<()> {
    debug!(">> {}", line);
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await?;
    Ok(())
}

fn build_tls_connector(config: &IrcConfig) -> Result<Option<TlsConnector>> {
    if !config.tls {
        return Ok(None);
    }

    let mut builder = native_tls::TlsConnector::builder();
    if let Some(path) = &config.ca_file {
        let pem = std::fs::read(path).map_err(|e| {
            NotifyError::Tls(format!("Failed to read CA file '{}': {}", path.display(), e))
        })?;
        let certificate = native_tls::Certificate::from_pem(&pem).map_err(|e| {
            NotifyError::Tls(format!("Invalid CA file '{}': {}", path.display(), e))
        })?;
        builder.add_root_certificate(certificate);
    }

    let connector = builder
        .build()
        .map_err(|e| NotifyError::Tls(format!("Failed to build TLS connector: {}", e)))?;
    Ok(Some(TlsConnector::from(connector)))
}
