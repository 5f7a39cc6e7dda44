//! Home-automation intents typed directly into chat (`!scene`, `!lights`).

use serde_json::{Map, Value};

use nexus_protocol::HomeCommand;

pub const SCENE_SET: &str = "hass.scene.set";
pub const LIGHT_TOGGLE: &str = "hass.light.toggle";

/// Parse `!scene <name>` or `!lights <room> [on|off]` into a home command.
pub fn parse_home_intent(text: &str) -> Option<HomeCommand> {
    let rest = text.trim().strip_prefix('!')?;
    let (verb, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let args = args.trim();

    let mut params = Map::new();
    let topic = match verb.to_ascii_lowercase().as_str() {
        "scene" if !args.is_empty() => {
            params.insert("scene".into(), Value::String(args.to_string()));
            SCENE_SET
        },
        "lights" | "light" => {
            let mut words: Vec<&str> = args.split_whitespace().collect();
            let state = match words.last().map(|w| w.to_ascii_lowercase()) {
                Some(w) if w == "on" || w == "off" => {
                    words.pop();
                    w
                },
                _ => "on".to_string(),
            };
            if !words.is_empty() {
                params.insert("room".into(), Value::String(words.join(" ")));
            }
            params.insert("state".into(), Value::String(state));
            LIGHT_TOGGLE
        },
        _ => return None,
    };

    Some(HomeCommand {
        topic: Some(topic.to_string()),
        params,
    })
}
