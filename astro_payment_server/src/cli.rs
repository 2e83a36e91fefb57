use std::{env, env::VarError};

/// The binary takes no real arguments. Passing any argument at all (typically `--help`) prints
/// the embedded readme plus the current non-secret configuration, and the caller exits.
pub fn handle_command_line_args() -> bool {
    if env::args().count() <= 1 {
        return false;
    }
    println!("\n{}\n", include_str!("./cli-help.txt"));
    print_environment();
    true
}

/// Variables are listed explicitly by name. Secret-bearing variables (webhook secrets, API
/// tokens) are deliberately absent from this list.
fn print_environment() {
    const DISPLAY_ENVS: [&str; 14] = [
        "RUST_LOG",
        "APG_HOST",
        "APG_PORT",
        "APG_DATABASE_URL",
        "APG_WEBHOOK_TOLERANCE_SECONDS",
        "APG_MP_BASE_URL",
        "APG_MP_NOTIFICATION_URL",
        "APG_ASTROCALC_URL",
        "APG_AUTOMATION_WEBHOOK_URL",
        "APG_JOB_MAX_HTTP_ATTEMPTS",
        "APG_PENDING_REMINDER_MINUTES",
        "APG_SCHEDULER_POLL_SECONDS",
        "APG_SCHEDULER_CLAIM_LIMIT",
        "APG_CURRENCY",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    for name in DISPLAY_ENVS {
        let value = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {value}");
    }
}
