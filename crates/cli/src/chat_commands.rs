use {
    anyhow::{Context, Result},
    serde_json::json,
    tokio::io::{AsyncBufReadExt, BufReader},
    tracing::info,
};

use {
    nexus_client::InterfaceClient,
    nexus_config::NexusConfig,
    nexus_protocol::{TextPayload, stylize},
};

const HELP: &str = "/help to list commands: /quit (/q, /exit), /mode <name>";

/// One line typed at the chat prompt.
#[derive(Debug, PartialEq, Eq)]
enum ChatLine {
    Quit,
    Mode(String),
    Help,
    Empty,
    Text(String),
}

fn parse_line(line: &str) -> ChatLine {
    let line = line.trim();
    match line {
        "" => ChatLine::Empty,
        "/q" | "/quit" | "/exit" => ChatLine::Quit,
        "/help" => ChatLine::Help,
        "/mode" => ChatLine::Mode("default".into()),
        _ => match line.strip_prefix("/mode ") {
            Some(mode) if !mode.trim().is_empty() => ChatLine::Mode(mode.trim().to_string()),
            Some(_) => ChatLine::Mode("default".into()),
            None => ChatLine::Text(line.to_string()),
        },
    }
}

/// Interactive chat: stdin lines go out as chat input, every output for this
/// session is printed as it arrives.
pub async fn run_chat(config: &NexusConfig, session: Option<String>) -> Result<()> {
    let mut client = InterfaceClient::from_config(&config.interface)
        .with_token(config.gateway.effective_token().map(str::to_owned));
    if let Some(session) = session {
        client = client.with_session(session);
    }
    client.connect().await.context("failed to connect to gateway")?;

    let sid = client.session_id().to_string();
    println!(
        "{}",
        stylize(&format!("Neon link established. {HELP}"), "ui", Some(&sid), None)
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    client.send_control("session.end", json!({"reason": "eof"})).await?;
                    break;
                };
                match parse_line(&line) {
                    ChatLine::Quit => {
                        client.send_control("session.end", json!({"reason": "user"})).await?;
                        break;
                    },
                    ChatLine::Mode(mode) => {
                        client.send_control("mode.set", json!({"mode": mode})).await?;
                        println!("{}", stylize(&format!("Mode shift -> {mode}"), "ui", Some(&sid), None));
                    },
                    ChatLine::Help => println!("{HELP}"),
                    ChatLine::Empty => {},
                    ChatLine::Text(text) => client.publish_input(&text).await?,
                }
            }
            output = client.recv_output() => {
                let Some(event) = output? else {
                    info!("gateway closed the connection");
                    break;
                };
                if let Some(payload) = TextPayload::from_value(event.payload())
                    && !payload.text.is_empty()
                {
                    println!("{}", payload.text);
                }
            }
        }
    }

    client.close().await?;
    Ok(())
}
