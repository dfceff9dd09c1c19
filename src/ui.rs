use colored::{ColoredString, Colorize};
use converge::ChangeAction;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.len()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Colored symbol for a change action
pub fn change_symbol(action: ChangeAction) -> ColoredString {
    match action {
        ChangeAction::Create => "+".green(),
        ChangeAction::Update => "~".yellow(),
        ChangeAction::Destroy => "-".red(),
    }
}

/// Render a JSON value on a single line for diff output
pub fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => format!("\"{s}\""),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&json!("us-central1")), "\"us-central1\"");
        assert_eq!(render_value(&json!(50)), "50");
        assert_eq!(render_value(&json!(["a", "b"])), "[\"a\",\"b\"]");
        assert_eq!(render_value(&json!({"env": "dev"})), "{\"env\":\"dev\"}");
    }
}
