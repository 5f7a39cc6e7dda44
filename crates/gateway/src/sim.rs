//! Simulated home-automation HUD: turns `home.command` events into
//! human-readable notifications instead of driving real devices.

use {
    nexus_agents::intent::{LIGHT_TOGGLE, SCENE_SET},
    nexus_protocol::{Event, HomeCommand, TextPayload, event_types, stylize, topics},
};

pub const SIM_SOURCE: &str = "nexus:sim.hass";

/// Describe a home command the way the HUD prints it.
pub fn describe(cmd: &HomeCommand) -> String {
    match cmd.topic.as_deref() {
        Some(SCENE_SET) => format!(
            "Sim HUD: scene -> '{}'.",
            cmd.param_str("scene").unwrap_or("unknown")
        ),
        Some(LIGHT_TOGGLE) => format!(
            "Sim HUD: lights @ '{}' {}.",
            cmd.param_str("room").unwrap_or("room"),
            cmd.param_str("state").unwrap_or("on")
        ),
        _ => format!(
            "Sim HUD: home command: {}",
            serde_json::to_string(cmd).unwrap_or_default()
        ),
    }
}

/// Render a `home.command` event as a notification for `session_id`.
/// Returns `None` for any other topic.
pub fn render_home_command(event: &Event, session_id: Option<&str>) -> Option<Event> {
    if event.topic() != topics::HOME_COMMAND {
        return None;
    }
    let cmd = HomeCommand::from_value(event.payload()).unwrap_or_default();
    let corr_id = event.corr_id();
    let text = stylize(&describe(&cmd), "ui", session_id, corr_id);
    Some(
        Event::builder(
            event_types::INTERFACE_OUTPUT,
            SIM_SOURCE,
            topics::NOTIFICATION,
            TextPayload::new(text).to_value(),
        )
        .session(session_id)
        .corr_id(corr_id)
        .build(),
    )
}
