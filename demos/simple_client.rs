//! Simple IRC client example
//!
//! Connects, registers (with SASL when `IRC_PASSWORD` is set), says hello in
//! a channel, prints what arrives for a while, and quits.
//!
//! ```text
//! IRC_PASSWORD=hunter2 cargo run --example simple_client -- alice@irc.libera.chat '#ircv3-test'
//! ```

use std::time::Duration;

use anyhow::{bail, Context};
use tokio::time::timeout;

use ircv3_engine::{AccountConfig, Command, Connection, SessionEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let account = args.next().context("usage: simple_client nick@server [#channel]")?;
    let channel = args.next().unwrap_or_else(|| "#ircv3-test".to_owned());

    let mut config = AccountConfig::from_account(&account)?;
    if let Ok(password) = std::env::var("IRC_PASSWORD") {
        config = config.with_password(password);
    }

    let mut connection = Connection::connect(config);

    // Wait for registration to complete
    loop {
        match timeout(Duration::from_secs(30), connection.next_event()).await {
            Ok(Some(SessionEvent::RegistrationComplete)) => {
                println!("✓ Registration successful!");
                break;
            }
            Ok(Some(SessionEvent::SaslSucceeded(mechanism))) => {
                println!("✓ Logged in with {}", mechanism);
            }
            Ok(Some(SessionEvent::Disconnected(reason))) => {
                bail!("disconnected during registration: {:?}", reason);
            }
            Ok(Some(event)) => println!("· {:?}", event),
            Ok(None) => bail!("connection task stopped"),
            Err(_) => bail!("registration timed out"),
        }
    }

    connection.send(Command::JOIN(channel.clone())).await?;
    connection.privmsg(&channel, "Hello from ircv3-engine!").await?;

    let listen = tokio::time::sleep(Duration::from_secs(60));
    tokio::pin!(listen);
    loop {
        tokio::select! {
            _ = &mut listen => break,
            event = connection.next_event() => match event {
                Some(SessionEvent::MessageReceived(msg)) => {
                    println!("← [{}] <{}> {}", msg.conversation, msg.author, msg.contents);
                }
                Some(SessionEvent::Disconnected(reason)) => {
                    println!("✗ Disconnected: {:?}", reason);
                    break;
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    connection.disconnect(Some("Goodbye!")).await?;
    println!("✓ Disconnected");
    Ok(())
}
