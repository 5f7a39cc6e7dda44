//! Grid tick producer: a peer that emits `grid.tick` on a fixed interval.

use std::time::Duration;

use {
    anyhow::Context,
    futures::SinkExt,
    rand::{Rng, SeedableRng, rngs::StdRng},
    serde_json::json,
    tokio::time::{MissedTickBehavior, interval},
    tokio_tungstenite::{connect_async, tungstenite::Message},
    tracing::{debug, info},
};

use {
    nexus_config::TickerConfig,
    nexus_protocol::{Event, encode, event_types, stylize, topics},
};

use crate::with_token;

pub const TICK_SOURCE: &str = "grid:loop";

/// Numbered ticks with a random sample each. Seeded sources repeat exactly.
pub struct TickSource {
    n: u64,
    rng: StdRng,
    grid: String,
}

impl TickSource {
    pub fn new(seed: Option<u64>, grid: impl Into<String>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            n: 0,
            rng,
            grid: grid.into(),
        }
    }

    /// The next tick; `n` starts at 1.
    pub fn next_event(&mut self) -> Event {
        self.n += 1;
        let sample: f64 = self.rng.random();
        Event::builder(
            event_types::GRID_TICK,
            TICK_SOURCE,
            topics::TICK,
            json!({ "n": self.n, "rand": sample }),
        )
        .meta_entry("grid", json!(self.grid))
        .build()
    }
}

/// Connect to the gateway and send a tick every `interval_ms` until the
/// connection fails.
pub async fn run_ticker(config: &TickerConfig, token: Option<&str>) -> anyhow::Result<()> {
    let url = with_token(&config.url, token).context("invalid ticker url")?;
    let (mut ws, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("failed to connect to {}", config.url))?;
    info!(
        "{}",
        stylize(
            &format!("Grid ticker online @ {}ms", config.interval_ms),
            "grid",
            None,
            None
        )
    );

    let mut source = TickSource::new(config.seed, config.grid.clone());
    let mut timer = interval(Duration::from_millis(config.interval_ms.max(1)));
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        timer.tick().await;
        let event = source.next_event();
        ws.send(Message::text(encode(&event)?))
            .await
            .context("gateway connection lost")?;
        debug!(n = source.n, "tick sent");
    }
}
