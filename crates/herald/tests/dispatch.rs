//! End-to-end dispatch through a `LocalGateway`.

use std::sync::Arc;
use std::time::Duration;

use herald::core::{LocalGateway, SentMessage};
use herald::framework::{Handler, HandlerOptions};
use herald::prelude::*;
use herald::register_handler;
use herald::runtime::config::Token;
use serde::Deserialize;

const ME: u64 = 1000;
const GUILD: u64 = 5;
const CHANNEL: u64 = 50;

fn gateway() -> Arc<LocalGateway> {
    Arc::new(LocalGateway::new(User::bot(ME, "herald")).with_token("secret"))
}

fn guild_message(id: u64, author: User, content: &str) -> Message {
    Message::new(id, author, ChannelRef::guild(CHANNEL, GUILD), content)
}

async fn sent(gw: &LocalGateway, count: usize) -> Vec<SentMessage> {
    tokio::time::timeout(Duration::from_secs(5), gw.wait_for_sent(count))
        .await
        .expect("replies in time")
}

/// Replies to `ping` and echoes everything after `echo `.
#[register_handler(name = "ping")]
struct Ping {
    reply: String,
}

#[derive(Deserialize)]
struct PingSettings {
    #[serde(default = "default_reply")]
    reply: String,
}

fn default_reply() -> String {
    "pong".to_string()
}

#[async_trait]
impl EventHooks for Ping {
    fn register_commands(&self, chain: &mut ProcessorChain) -> FrameworkResult<()> {
        let reply = self.reply.clone();
        chain
            .command("^ping$", move |ctx, _| {
                let reply = reply.clone();
                async move {
                    ctx.reply(&reply).await?;
                    Ok(())
                }
            })?
            .command(r"^echo (?<rest>.+)$", |ctx, m| async move {
                let rest = m.name("rest").unwrap_or_default().to_string();
                ctx.reply(&rest).await?;
                Ok(())
            })?;
        Ok(())
    }
}

impl Discoverable for Ping {
    fn create(init: &HandlerInit) -> FrameworkResult<Self> {
        let settings: PingSettings = init.settings()?;
        Ok(Self {
            reply: settings.reply,
        })
    }
}

#[register_handler(production_only)]
struct Audit;

impl EventHooks for Audit {}

impl Discoverable for Audit {
    fn create(_init: &HandlerInit) -> FrameworkResult<Self> {
        Ok(Audit)
    }
}

/// First-match-wins over an ordered chain.
struct Ordered;

impl EventHooks for Ordered {
    fn register_commands(&self, chain: &mut ProcessorChain) -> FrameworkResult<()> {
        chain
            .command("^ping$", |ctx, _| async move {
                ctx.reply("exact").await?;
                Ok(())
            })?
            .command("^pi.*$", |ctx, _| async move {
                ctx.reply("loose").await?;
                Ok(())
            })?;
        Ok(())
    }
}

fn bootstrap_config() -> HeraldConfig {
    let mut config = HeraldConfig::default();
    config.auth.token = Some(Token::new("secret"));
    config
}

#[tokio::test]
async fn test_registered_handler_answers_after_bootstrap() -> anyhow::Result<()> {
    let gw = gateway();
    let gateway: BoxedGateway = gw.clone();
    let boot = Bootstrapper::new(bootstrap_config(), gateway);

    assert_eq!(boot.handler_names(), vec!["ping"]);
    boot.start().await?;

    gw.emit_message(guild_message(1, User::new(7, "alice"), "!ping"))
        .await;
    let replies = sent(&gw, 1).await;
    assert_eq!(replies[0].content, "pong");
    assert_eq!(replies[0].channel_id, ChannelId(CHANNEL));

    boot.stop().await?;
    assert_eq!(gw.total_subscribers(), 0);
    Ok(())
}

#[tokio::test]
async fn test_handler_settings_come_from_config() -> anyhow::Result<()> {
    let gw = gateway();
    let gateway: BoxedGateway = gw.clone();
    let mut config = bootstrap_config();
    config
        .handlers
        .settings
        .insert("ping".into(), serde_json::json!({ "reply": "PONG!" }));
    config.handlers.fan_out = false;
    let boot = Bootstrapper::new(config, gateway);

    boot.start().await?;
    gw.emit_message(guild_message(1, User::new(7, "alice"), "!ping"))
        .await;

    assert_eq!(gw.sent_messages()[0].content, "PONG!");
    Ok(())
}

#[tokio::test]
async fn test_production_only_handler_follows_profile() {
    let gw = gateway();

    let gateway: BoxedGateway = gw.clone();
    let boot = Bootstrapper::new(bootstrap_config(), gateway);
    assert!(!boot.handler_names().contains(&"Audit"));

    let mut config = bootstrap_config();
    config.profile = "prod".into();
    let gateway: BoxedGateway = gw.clone();
    let boot = Bootstrapper::new(config, gateway);
    assert!(boot.handler_names().contains(&"Audit"));
}

#[tokio::test]
async fn test_trimmed_prefix_from_guild_user() {
    let gw = gateway();
    gw.login("secret").await.unwrap();
    let policy = VerificationPolicy::builder()
        .string_prefix("!")
        .trim_space_after_string_prefix(true)
        .build();
    let options = HandlerOptions::default()
        .fan_out(false)
        .policy(Arc::new(policy));
    let _handler = Handler::attach(
        Ping {
            reply: "pong".into(),
        },
        gw.clone(),
        options,
    )
    .unwrap();

    gw.emit_message(guild_message(1, User::new(7, "alice"), "!   ping"))
        .await;
    gw.emit_message(guild_message(2, User::bot(8, "other"), "!ping"))
        .await;
    gw.emit_message(guild_message(
        3,
        User::new(7, "alice"),
        &format!("<@{ME}>   echo  spaced out"),
    ))
    .await;

    let replies: Vec<String> = gw.sent_messages().into_iter().map(|m| m.content).collect();
    assert_eq!(replies, vec!["pong", " spaced out"]);
}

#[tokio::test]
async fn test_untrimmed_prefix_keeps_whitespace() {
    let gw = gateway();
    gw.login("secret").await.unwrap();
    let options = HandlerOptions::default().fan_out(false);
    let _handler = Handler::attach(
        Ping {
            reply: "pong".into(),
        },
        gw.clone(),
        options,
    )
    .unwrap();

    let delivery = gw
        .emit_message(guild_message(1, User::new(7, "alice"), "! ping"))
        .await;
    assert!(delivery.is_clean());
    assert!(gw.sent_messages().is_empty());
}

#[tokio::test]
async fn test_first_matching_command_wins() {
    let gw = gateway();
    gw.login("secret").await.unwrap();
    let _handler = Handler::attach(Ordered, gw.clone(), HandlerOptions::default().fan_out(false))
        .unwrap();

    gw.emit_message(guild_message(1, User::new(7, "alice"), "!ping"))
        .await;
    gw.emit_message(guild_message(2, User::new(7, "alice"), "!pizza"))
        .await;
    gw.emit_message(guild_message(3, User::new(7, "alice"), "!ping"))
        .await;

    let replies: Vec<String> = gw.sent_messages().into_iter().map(|m| m.content).collect();
    assert_eq!(replies, vec!["exact", "loose", "exact"]);
}
