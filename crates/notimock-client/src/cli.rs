//! CLI definition using clap derive. Flag surface mirrors notify-send;
//! `-h` is taken by `--hint`, so the help flag is long-only.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "nsend",
    version,
    about = "<SUMMARY> [BODY] - create a notification",
    disable_help_flag = true
)]
pub struct Cli {
    #[arg(value_name = "SUMMARY")]
    pub summary: Option<String>,

    #[arg(value_name = "BODY")]
    pub body: Option<String>,

    /// Specifies the urgency level (low, normal, critical).
    #[arg(short = 'u', long, value_name = "LEVEL", default_value = "normal")]
    pub urgency: String,

    /// Specifies the timeout in milliseconds at which to expire the notification.
    #[arg(short = 't', long = "expire-time", value_name = "TIME", default_value_t = -1)]
    pub expire_time: i32,

    /// Specifies the app name for the notification.
    #[arg(short = 'a', long = "app-name", value_name = "APP_NAME")]
    pub app_name: Option<String>,

    /// Specifies an icon shown next to the app name.
    #[arg(short = 'n', long = "app-icon", value_name = "ICON")]
    pub app_icon: Option<String>,

    /// Specifies an icon filename or stock icon to display.
    #[arg(short = 'i', long, value_name = "ICON")]
    pub icon: Option<String>,

    /// Specifies the notification category.
    #[arg(short = 'c', long, value_name = "TYPE")]
    pub category: Option<String>,

    /// Create a transient notification.
    #[arg(short = 'e', long)]
    pub transient: bool,

    /// Specifies basic extra data to pass. Valid types are boolean, int,
    /// double, string, byte and variant.
    #[arg(short = 'h', long = "hint", value_name = "TYPE:NAME:VALUE")]
    pub hints: Vec<String>,

    /// Print the notification ID.
    #[arg(short = 'p', long = "print-id")]
    pub print_id: bool,

    /// The ID of the notification to replace.
    #[arg(short = 'r', long = "replace-id", value_name = "REPLACE_ID", default_value_t = 0)]
    pub replace_id: u32,

    /// Wait for the notification to be closed before exiting.
    #[arg(short = 'w', long)]
    pub wait: bool,

    /// Specifies an action to display to the user. Implies --wait. May be
    /// set multiple times; without NAME the numerical index is used.
    #[arg(short = 'A', long = "action", value_name = "[NAME=]Text")]
    pub actions: Vec<String>,

    /// Write the notification id to this inherited descriptor.
    #[arg(long = "id-fd", value_name = "FD")]
    pub id_fd: Option<i32>,

    /// Write the chosen action id to this inherited descriptor.
    #[arg(long = "selected-action-fd", value_name = "FD")]
    pub selected_action_fd: Option<i32>,

    /// Write the activation token to this inherited descriptor.
    #[arg(long = "activation-token-fd", value_name = "FD")]
    pub activation_token_fd: Option<i32>,

    /// Print help.
    #[arg(long, action = clap::ArgAction::Help)]
    pub help: Option<bool>,
}
