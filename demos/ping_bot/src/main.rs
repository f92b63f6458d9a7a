//! Ping Bot Example
//!
//! Runs a Herald bot against an in-process gateway and plays a short
//! conversation through it.
//!
//! # Commands
//!
//! ```text
//! !ping          - Pong!
//! !echo <text>   - Echo text
//! !add <a> <b>   - Add two integers
//! !whoami        - Guild members only, replies with the display name
//! !help          - This help
//! ```
//!
//! Mentioning the bot works in place of `!`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package ping-bot
//! cargo run --package ping-bot -- --inline --profile production
//! HERALD_COMMANDS__STRING_PREFIX='?' cargo run --package ping-bot
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use herald::core::LocalGateway;
use herald::prelude::*;
use herald::register_handler;
use serde::Deserialize;
use tracing::{info, warn};

const BOT_ID: u64 = 1;
const OWNER_ID: u64 = 42;
const GUILD_ID: u64 = 100;
const GENERAL: u64 = 1000;
const DM: u64 = 2000;

#[derive(Parser, Debug)]
#[command(name = "ping-bot", about = "A scripted Herald bot")]
struct Args {
    /// Configuration file to load instead of searching for herald.toml.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile.
    #[arg(short, long)]
    profile: Option<String>,

    /// Run hooks inside the gateway's delivery instead of on spawned tasks.
    #[arg(long)]
    inline: bool,

    /// Login token the in-process gateway accepts.
    #[arg(long, default_value = "demo-token")]
    token: String,
}

// ============================================================================
// Handler
// ============================================================================

#[register_handler(name = "ping")]
struct PingBot {
    greeting: String,
}

#[derive(Deserialize)]
struct PingSettings {
    #[serde(default = "default_greeting")]
    greeting: String,
}

fn default_greeting() -> String {
    "Ping bot ready".to_string()
}

impl Discoverable for PingBot {
    fn create(init: &HandlerInit) -> FrameworkResult<Self> {
        let settings: PingSettings = init.settings()?;
        Ok(Self {
            greeting: settings.greeting,
        })
    }
}

#[async_trait]
impl EventHooks for PingBot {
    fn register_commands(&self, chain: &mut ProcessorChain) -> FrameworkResult<()> {
        chain
            .command("^ping$", |ctx, _| async move {
                ctx.reply("Pong! 🏓").await?;
                Ok(())
            })?
            .command(r"^echo (?<text>.+)$", |ctx, m| async move {
                let text = m.name("text").unwrap_or_default().to_string();
                ctx.reply(&text).await?;
                Ok(())
            })?
            .command(r"^add (?<a>-?\d+) (?<b>-?\d+)$", |ctx, m| async move {
                let a: i64 = m.name("a").unwrap_or_default().parse()?;
                let b: i64 = m.name("b").unwrap_or_default().parse()?;
                ctx.reply(&format!("{a} + {b} = {}", a + b)).await?;
                Ok(())
            })?
            .command("^help$", |ctx, _| async move {
                let help_text = "╭─────────────────────────────╮
│     Ping Bot - Commands     │
├─────────────────────────────┤
│ ping         - Pong!        │
│ echo <text>  - Echo text    │
│ add <a> <b>  - Add numbers  │
│ whoami       - Guild only   │
│ help         - This help    │
╰─────────────────────────────╯";
                ctx.reply(help_text).await?;
                Ok(())
            })?;

        // Guild-only, matched against the raw content
        chain.push(
            Command::builder(r"^!whoami$")
                .name("whoami")
                .guild_user()
                .handler(|ctx, _| async move {
                    let name = ctx
                        .member()
                        .map(|m| m.display_name().to_string())
                        .unwrap_or_default();
                    ctx.reply(&format!("You are {name}")).await?;
                    Ok(())
                })?,
        );
        Ok(())
    }

    async fn on_ready(&self, ctx: &HandlerContext) -> anyhow::Result<()> {
        let owner = ctx.author().map(|u| u.name).unwrap_or_default();
        let prefix = ctx.default_prefix().unwrap_or_default();
        info!(%owner, %prefix, "{}", self.greeting);
        Ok(())
    }

    async fn on_user_joined(&self, ctx: &HandlerContext, member: GuildMember) -> anyhow::Result<()> {
        ctx.gateway()?
            .send_message(ChannelId(GENERAL), &format!("Welcome, {}!", member.display_name()))
            .await?;
        Ok(())
    }
}

// ============================================================================
// Scripted conversation
// ============================================================================

fn seed(gateway: &LocalGateway) {
    gateway.cache_user(User::new(OWNER_ID, "xef2"));

    let mut alice = GuildMember::new(GUILD_ID, User::new(7, "alice"));
    alice.nickname = Some("Alice".into());
    gateway.cache_member(alice);

    // Only known after a member download
    gateway.add_remote_member(GuildMember::new(GUILD_ID, User::new(8, "bob")));
}

async fn converse(gateway: Arc<LocalGateway>) {
    let alice = User::new(7, "alice");
    let bob = User::new(8, "bob");
    let general = ChannelRef::guild(GENERAL, GUILD_ID);

    let script = [
        Message::new(1, alice.clone(), general.clone(), "!ping"),
        Message::new(2, bob.clone(), general.clone(), "!echo hello world"),
        Message::new(3, alice.clone(), general.clone(), format!("<@{BOT_ID}> add 2 40")),
        Message::new(4, User::bot(9, "other-bot"), general.clone(), "!ping"),
        Message::new(5, bob.clone(), general.clone(), "!whoami"),
        Message::new(6, alice.clone(), general.clone(), "!whoami"),
        Message::new(7, bob.clone(), ChannelRef::direct(DM), "!ping"),
        Message::new(8, alice, general, "just chatting"),
    ];
    for message in script {
        gateway.emit_message(message).await;
    }
    gateway
        .emit(GatewayEvent::UserJoined(GuildMember::new(GUILD_ID, User::new(10, "carol"))))
        .await;

    const EXPECTED_REPLIES: usize = 7;
    if tokio::time::timeout(Duration::from_secs(5), gateway.wait_for_sent(EXPECTED_REPLIES))
        .await
        .is_err()
    {
        warn!(
            sent = gateway.sent_messages().len(),
            expected = EXPECTED_REPLIES,
            "Not every command replied"
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let gateway = Arc::new(LocalGateway::new(User::bot(BOT_ID, "herald")).with_token(&args.token));
    seed(&gateway);

    let mut builder = Bootstrapper::builder()
        .set("auth.token", args.token.as_str())
        .set("author_id", OWNER_ID);
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = args.profile {
        builder = builder.profile(profile);
    }
    if args.inline {
        builder = builder.set("handlers.fan_out", false);
    }

    let bootstrapper = builder.build(gateway.clone())?;
    info!(handlers = ?bootstrapper.handler_names(), "Starting ping bot");

    bootstrapper.run_until(converse(Arc::clone(&gateway))).await?;

    for sent in gateway.sent_messages() {
        info!(channel = %sent.channel_id, "{}", sent.content);
    }
    Ok(())
}
