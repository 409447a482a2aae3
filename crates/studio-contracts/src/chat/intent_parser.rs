use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, ATTRIBUTE_COMMANDS, MULTI_PATH_COMMANDS, NO_ARG_COMMANDS, RAW_ARG_COMMANDS,
    REFERENCE_COMMAND, RESIZE_COMMAND,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub prompt: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            command_args: BTreeMap::new(),
        }
    }

    fn with_arg(mut self, key: &str, value: impl Into<String>) -> Self {
        self.command_args
            .insert(key.to_string(), Value::String(value.into()));
        self
    }

    pub fn arg_str(&self, key: &str) -> &str {
        self.command_args
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn arg_list(&self, key: &str) -> Vec<String> {
        self.command_args
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

/// Splits off the first whitespace-delimited word.
fn split_head(arg: &str) -> (&str, &str) {
    let trimmed = arg.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim()),
        None => (trimmed, ""),
    }
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, RAW_ARG_COMMANDS) {
                let key = if action == "speak" { "text" } else { "ratio" };
                return Intent::new(action, text).with_arg(key, arg);
            }

            if let Some(action) = find_action(&command, ATTRIBUTE_COMMANDS) {
                return Intent::new(action, text).with_arg("attribute", arg.to_ascii_lowercase());
            }

            if let Some(action) = find_action(&command, MULTI_PATH_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent.command_args.insert(
                    "paths".to_string(),
                    Value::Array(
                        parse_path_args(arg)
                            .into_iter()
                            .map(Value::String)
                            .collect(),
                    ),
                );
                return intent;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            if command == REFERENCE_COMMAND.command {
                let (attribute, rest) = split_head(arg);
                let path = parse_path_args(rest).join(" ");
                return Intent::new(REFERENCE_COMMAND.action, text)
                    .with_arg("attribute", attribute.to_ascii_lowercase())
                    .with_arg("path", path);
            }

            if command == RESIZE_COMMAND.command {
                let (ratio, scene) = split_head(arg);
                return Intent::new(RESIZE_COMMAND.action, text)
                    .with_arg("ratio", ratio)
                    .with_arg("scene", scene);
            }

            return Intent::new("unknown", text)
                .with_arg("command", command)
                .with_arg("arg", arg);
        }
    }

    let mut intent = Intent::new("send_turn", text);
    intent.prompt = Some(raw_trimmed.to_string());
    intent
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_intent;

    #[test]
    fn parse_attach_quoted_paths() {
        let intent = parse_intent("/attach \"/tmp/a b.png\" c.jpg");
        assert_eq!(intent.action, "attach");
        assert_eq!(intent.command_args["paths"], json!(["/tmp/a b.png", "c.jpg"]));
        assert_eq!(intent.arg_list("paths").len(), 2);
    }

    #[test]
    fn parse_ratio_and_speak() {
        let ratio = parse_intent("/ratio 16:9");
        assert_eq!(ratio.action, "resume_deferred");
        assert_eq!(ratio.arg_str("ratio"), "16:9");

        let speak = parse_intent("/speak hello there");
        assert_eq!(speak.action, "speak");
        assert_eq!(speak.arg_str("text"), "hello there");
    }

    #[test]
    fn parse_attribute_commands() {
        assert_eq!(parse_intent("/extract Face").arg_str("attribute"), "face");
        assert_eq!(parse_intent("/forget dress").action, "clear_reference");
        assert_eq!(parse_intent("/keep background").action, "keep_attribute");
        assert_eq!(parse_intent("/change environment").action, "change_attribute");
    }

    #[test]
    fn parse_reference_with_quoted_path() {
        let intent = parse_intent("/reference face \"/tmp/my face.png\"");
        assert_eq!(intent.action, "set_reference");
        assert_eq!(intent.arg_str("attribute"), "face");
        assert_eq!(intent.arg_str("path"), "/tmp/my face.png");
    }

    #[test]
    fn parse_resize_with_optional_scene() {
        let bare = parse_intent("/resize 9:16");
        assert_eq!(bare.action, "resize");
        assert_eq!(bare.arg_str("ratio"), "9:16");
        assert_eq!(bare.arg_str("scene"), "");

        let scene = parse_intent("/resize 21:9  a beach at dusk ");
        assert_eq!(scene.arg_str("ratio"), "21:9");
        assert_eq!(scene.arg_str("scene"), "a beach at dusk");
    }

    #[test]
    fn parse_no_arg_commands() {
        assert_eq!(parse_intent("/reset").action, "reset_memory");
        assert_eq!(parse_intent("/memory").action, "show_memory");
        assert_eq!(parse_intent("/pending").action, "show_pending");
        assert_eq!(parse_intent("/exit").action, "quit");
    }

    #[test]
    fn free_text_is_a_turn() {
        let intent = parse_intent("  draw a lion  ");
        assert_eq!(intent.action, "send_turn");
        assert_eq!(intent.prompt.as_deref(), Some("draw a lion"));
        assert_eq!(parse_intent("   ").action, "noop");
    }

    #[test]
    fn parse_unknown_command() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }
}
