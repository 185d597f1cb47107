//! Human-readable chat text for acknowledgements, batch reports and help.

use chrono::{DateTime, Local};

use crate::types::{AggregateResult, DeployMode, Environment};

/// Raw error text longer than this is cut in chat replies.
pub const REPORT_RAW_ERROR_CHARS: usize = 300;

const RULE: &str = "*************************************************************************************************";

pub fn timestamp(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn mention(requester: Option<&str>) -> String {
    match requester {
        Some(user) if !user.is_empty() => format!("<@{user}>"),
        _ => "unknown".to_string(),
    }
}

fn shorten(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push('…');
    out
}

/// Immediate "in progress" reply sent before a batch starts.
pub fn in_progress(environment: &Environment, mode: DeployMode) -> String {
    let icon = match mode {
        DeployMode::Sync => "🔄",
        DeployMode::Switch => "🚀",
    };
    format!(
        "{icon} Running {} for {} environment ({} target(s))... please wait!",
        mode.verb(),
        environment.label(),
        environment.targets.len()
    )
}

/// Completion report for a finished batch.
pub fn completion(result: &AggregateResult, requester: Option<&str>, now: DateTime<Local>) -> String {
    let label = result.environment.to_uppercase();
    let verb = result.mode.verb();
    let ratio = format!("{}/{}", result.succeeded_count, result.total_count);

    if result.overall_succeeded {
        let details = result
            .outcomes
            .iter()
            .map(|o| format!("• {}: ✅", o.target_id))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "🎉 *{message}*\n\n📊 *Results:*\n{details}\n\n• 🏷️ Environment: {label}\n• 📊 Succeeded: {ratio}\n• 🕐 Finished at: {ts}\n• 👤 Requested by: {who}\n\n✅ {label} {verb} complete!",
            message = result.message,
            ts = timestamp(now),
            who = mention(requester),
        )
    } else {
        let failures = result
            .failed()
            .map(|o| match &o.raw_error {
                Some(raw) => format!(
                    "• {}: {}\n    ↳ {}",
                    o.target_id,
                    o.message,
                    shorten(raw, REPORT_RAW_ERROR_CHARS)
                ),
                None => format!("• {}: {}", o.target_id, o.message),
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "❌ *{label} {verb} failed*\n\n🔥 Failed targets:\n{failures}\n\n📊 Succeeded: {ratio}\n👤 Requested by: {who}\n🕐 Failed at: {ts}",
            who = mention(requester),
            ts = timestamp(now),
        )
    }
}

/// Static usage text listing the command vocabulary and configured targets.
pub fn help(environments: &[Environment], mode: DeployMode) -> String {
    let mut text = format!(
        "🤖 *deploybot usage* ({} mode)\n\n📋 *Commands:*\n",
        mode.as_str()
    );
    for env in environments {
        text.push_str(&format!(
            "• `{}` - {} {} environment\n",
            env.name,
            mode.verb(),
            env.label()
        ));
    }
    text.push_str(
        "• `health` - check the HTTP listener\n• `status` - bot status\n• `ping` - connectivity test\n• `hello` - say hi\n• `help` - show this help\n",
    );
    text.push_str("\n📱 *Targets:*\n");
    for env in environments {
        text.push_str(&format!("*{}:*\n", env.label()));
        for target in &env.targets {
            text.push_str(&format!("• {}\n", target.id));
        }
    }
    text.push_str(&format!(
        "\n⚠️ A {} can take a while and may roll services in the target environment.",
        mode.verb()
    ));
    text
}

/// Frame an inbound `/detect` alert for the notification channel.
pub fn alert(text: &str, recovery_marker: &str) -> String {
    if !recovery_marker.is_empty() && text.contains(recovery_marker) {
        format!("\n{RULE}\n:white_check_mark: {text} :white_check_mark:\n{RULE}\n")
    } else {
        format!("\n{RULE}\n:alert:{text}\n{RULE}\n")
    }
}
