// icinga2ctl - CLI for the Icinga 2 HTTP API
// Copyright (C) 2024 The icinga2ctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use icinga2ctl::client::{ApiClient, ClientOptions};
use icinga2ctl::config::{self, Config, Scope, resolve, save};
use icinga2ctl::methods::{AcknowledgementSpec, DowntimeSpec, ObjectQuery, Target};
use icinga2ctl::prompt;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "icinga2ctl",
    version,
    about = "CLI for the Icinga 2 HTTP API"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "URL",
        help = "API base URL override, e.g. https://icinga.example:5665"
    )]
    url: Option<String>,

    #[arg(long, global = true, help = "API user override for this invocation")]
    username: Option<String>,

    #[arg(long, global = true, help = "API password override for this invocation")]
    password: Option<String>,

    #[arg(long, global = true, help = "Skip TLS certificate verification")]
    insecure: bool,

    #[arg(
        long,
        global = true,
        value_name = "SECONDS",
        help = "Request timeout (defaults to config, then 30s)"
    )]
    timeout: Option<u64>,

    #[arg(
        long,
        short = 'o',
        value_enum,
        default_value_t = OutputFormat::Pretty,
        global = true,
        help = "Output format"
    )]
    output: OutputFormat,

    #[arg(
        long,
        value_name = "COL1,COL2",
        global = true,
        help = "Override table columns (comma-separated, dotted paths allowed)"
    )]
    columns: Option<String>,

    #[arg(
        long,
        value_name = "COLUMN",
        global = true,
        help = "Sort table rows by column (ascending)"
    )]
    sort_by: Option<String>,

    #[arg(short, long, global = true, action = ArgAction::Count, help = "More log output (-v, -vv)")]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Persist connection settings (--url, --username, --password, --insecure,
    /// --timeout) to the chosen scope; missing values are prompted for
    Configure {
        #[arg(
            long,
            value_enum,
            default_value_t = ScopeArg::User,
            help = "Where to write the config (local project dir or user config dir)"
        )]
        scope: ScopeArg,
    },
    /// Schedule and remove downtime
    #[command(subcommand)]
    Downtime(DowntimeCommand),
    /// Acknowledge and unacknowledge problems
    #[command(subcommand)]
    Acknowledge(AcknowledgeCommand),
    /// List configuration objects of one type
    Objects {
        #[arg(value_name = "TYPE", help = "Object type, e.g. host, service, downtime")]
        kind: String,
        #[arg(long, value_name = "EXPR", help = "Filter expression")]
        filter: Option<String>,
        #[arg(long, value_name = "ATTR,...", value_delimiter = ',')]
        attrs: Option<Vec<String>>,
        #[arg(long, value_name = "JOIN,...", value_delimiter = ',')]
        joins: Option<Vec<String>>,
    },
    /// Show status, optionally for a single component
    Status {
        #[arg(value_name = "COMPONENT")]
        component: Option<String>,
    },
    /// Show current configuration (secrets masked)
    ConfigShow,
    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand)]
enum DowntimeCommand {
    /// Schedule downtime for a target
    Schedule {
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        comment: CommentArgs,
        #[command(subcommand)]
        target: TargetArg,
    },
    /// Remove downtime by target, or by downtime name
    #[command(subcommand)]
    Remove(RemoveDowntimeTarget),
}

#[derive(Subcommand)]
enum AcknowledgeCommand {
    /// Acknowledge a problem
    Add {
        #[command(flatten)]
        options: AcknowledgeArgs,
        #[command(flatten)]
        comment: CommentArgs,
        #[command(subcommand)]
        target: TargetArg,
    },
    /// Remove an acknowledgement
    #[command(subcommand)]
    Remove(TargetArg),
}

#[derive(Subcommand, Clone)]
enum TargetArg {
    /// A single host
    Host {
        #[arg(value_name = "NAME")]
        name: String,
        #[arg(long, help = "Include all services of the host")]
        all_services: bool,
    },
    /// A single service
    Service {
        #[arg(value_name = "HOST")]
        host: String,
        #[arg(value_name = "SERVICE")]
        service: String,
    },
    /// Every host in a host group
    Hostgroup {
        #[arg(value_name = "GROUP")]
        group: String,
        #[arg(long, help = "Include all services of the member hosts")]
        all_services: bool,
    },
    /// Every service in a service group
    Servicegroup {
        #[arg(value_name = "GROUP")]
        group: String,
    },
}

impl From<TargetArg> for Target {
    fn from(value: TargetArg) -> Self {
        match value {
            TargetArg::Host { name, all_services } => Target::Host { name, all_services },
            TargetArg::Service { host, service } => Target::Service { host, service },
            TargetArg::Hostgroup {
                group,
                all_services,
            } => Target::HostGroup {
                group,
                all_services,
            },
            TargetArg::Servicegroup { group } => Target::ServiceGroup { group },
        }
    }
}

#[derive(Subcommand)]
enum RemoveDowntimeTarget {
    #[command(flatten)]
    Target(TargetArg),
    /// Downtimes by full name (host!service!id)
    Name {
        #[arg(value_name = "NAME", required = true)]
        names: Vec<String>,
    },
}

#[derive(Args)]
struct WindowArgs {
    #[arg(long, global = true, value_name = "TIMESPEC", default_value = "now")]
    start: String,
    #[arg(long, global = true, value_name = "TIMESPEC", default_value = "+2 hours")]
    end: String,
    #[arg(
        long,
        global = true,
        value_name = "TIMESPEC",
        help = "Maximum duration; makes the downtime flexible"
    )]
    duration: Option<String>,
    #[arg(long, global = true, value_name = "NAME", help = "Trigger for a triggered downtime")]
    trigger_name: Option<String>,
}

#[derive(Args)]
struct AcknowledgeArgs {
    #[arg(long, global = true, value_name = "TIMESPEC", help = "Optional expiry time")]
    expiry: Option<String>,
    #[arg(long, global = true, help = "Acknowledge until full recovery")]
    sticky: bool,
    #[arg(long, global = true, help = "Do not generate any configured notifications")]
    suppress_notifications: bool,
}

#[derive(Args)]
struct CommentArgs {
    #[arg(long, global = true, value_name = "NAME", help = "Operator name (prompted if omitted)")]
    operator: Option<String>,
    #[arg(long, global = true, value_name = "TEXT", help = "Comment text (prompted if omitted)")]
    comment: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Pretty,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScopeArg {
    Local,
    User,
}

impl From<ScopeArg> for Scope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Local => Scope::Local,
            ScopeArg::User => Scope::User,
        }
    }
}

#[derive(Clone)]
struct RenderOpts {
    output: OutputFormat,
    columns_override: Option<Vec<String>>,
    sort_by: Option<String>,
}

const ACTION_COLUMNS: &[&str] = &["name", "code", "status"];
const OBJECT_COLUMNS: &[&str] = &["type", "name"];

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let cwd = std::env::current_dir().context("reading current directory")?;

    let render_opts = RenderOpts {
        output: cli.output,
        columns_override: cli.columns.as_ref().map(|c| {
            c.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        }),
        sort_by: cli.sort_by.clone(),
    };

    let command = match cli.command {
        Commands::Configure { scope } => {
            let mut existing = config::load_scope(scope.into(), &cwd)?;
            let url = match cli.url {
                Some(url) => url,
                None => prompt::value("API URL", existing.url.as_deref())?,
            };
            let username = match cli.username {
                Some(username) => username,
                None => prompt::value("API user", existing.username.as_deref())?,
            };
            let password = match cli.password {
                Some(password) => password,
                None => prompt::secret("API password")?,
            };
            existing.url = Some(url.trim_end_matches('/').to_string());
            existing.username = Some(username);
            existing.password = Some(password);
            existing.verify_tls = Some(!cli.insecure);
            if cli.timeout.is_some() {
                existing.timeout_secs = cli.timeout;
            }
            let path = save(scope.into(), &existing, &cwd)?;
            println!("Saved configuration to {}", path.display());
            return Ok(());
        }
        Commands::ConfigShow => {
            let merged = config::load(&cwd)?;
            if merged.is_empty() {
                println!("No configuration found; try running: icinga2ctl configure");
            } else {
                println!("{}", serde_json::to_string_pretty(&merged.masked())?);
            }
            return Ok(());
        }
        Commands::Completion { shell } => {
            use clap_complete::{generate, shells};
            let mut cmd = Cli::command();
            let bin = cmd.get_name().to_string();
            match shell {
                CompletionShell::Bash => {
                    generate(shells::Bash, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::Zsh => {
                    generate(shells::Zsh, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::Fish => {
                    generate(shells::Fish, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::PowerShell => {
                    generate(shells::PowerShell, &mut cmd, bin, &mut std::io::stdout())
                }
            }
            return Ok(());
        }
        other => other,
    };

    let overrides = Config {
        url: cli.url,
        username: cli.username,
        password: cli.password,
        verify_tls: cli.insecure.then_some(false),
        timeout_secs: cli.timeout,
    };
    let effective = resolve(&cwd, overrides)?;
    let options = ClientOptions {
        verify_tls: effective.verify_tls,
        timeout: effective.timeout,
    };
    if !options.verify_tls {
        info!("TLS certificate verification disabled");
    }
    let client = ApiClient::new(&effective.url, &options)
        .context("creating API client")?
        .with_basic_auth(&effective.username, &effective.password)?;

    match command {
        Commands::Downtime(command) => handle_downtime(&client, command, &render_opts),
        Commands::Acknowledge(command) => handle_acknowledge(&client, command, &render_opts),
        Commands::Objects {
            kind,
            filter,
            attrs,
            joins,
        } => {
            let query = ObjectQuery {
                filter,
                attrs,
                joins,
            };
            let response = client
                .list_objects(&kind, &query)
                .with_context(|| format!("listing {kind} objects"))?;
            render_response(&response, &render_opts, Some(OBJECT_COLUMNS))
        }
        Commands::Status { component } => {
            let response = client
                .status(component.as_deref())
                .context("fetching status")?;
            render_response(&response, &render_opts, None)
        }
        Commands::Configure { .. } | Commands::ConfigShow | Commands::Completion { .. } => {
            unreachable!("handled before connecting")
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_downtime(
    client: &ApiClient,
    command: DowntimeCommand,
    render_opts: &RenderOpts,
) -> Result<()> {
    let response = match command {
        DowntimeCommand::Schedule {
            window,
            comment,
            target,
        } => {
            let spec = DowntimeSpec {
                start: window.start,
                end: window.end,
                duration: window.duration,
                trigger_name: window.trigger_name,
                comment: prompt::comment(comment.operator, comment.comment)?,
            };
            client
                .schedule_target_downtime(&target.into(), &spec)
                .context("scheduling downtime")?
        }
        DowntimeCommand::Remove(RemoveDowntimeTarget::Target(target)) => client
            .remove_target_downtime(&target.into())
            .context("removing downtime")?,
        DowntimeCommand::Remove(RemoveDowntimeTarget::Name { names }) => client
            .remove_downtime_by_name(&names)
            .context("removing downtime")?,
    };
    render_response(&response, render_opts, Some(ACTION_COLUMNS))
}

fn handle_acknowledge(
    client: &ApiClient,
    command: AcknowledgeCommand,
    render_opts: &RenderOpts,
) -> Result<()> {
    let response = match command {
        AcknowledgeCommand::Add {
            options,
            comment,
            target,
        } => {
            warn_on_all_services(&target);
            let spec = AcknowledgementSpec {
                comment: prompt::comment(comment.operator, comment.comment)?,
                expiry: options.expiry,
                sticky: options.sticky,
                notify: !options.suppress_notifications,
            };
            client
                .acknowledge_target_problem(&target.into(), &spec)
                .context("acknowledging problem")?
        }
        AcknowledgeCommand::Remove(target) => {
            warn_on_all_services(&target);
            client
                .remove_target_acknowledgement(&target.into())
                .context("removing acknowledgement")?
        }
    };
    render_response(&response, render_opts, Some(ACTION_COLUMNS))
}

fn warn_on_all_services(target: &TargetArg) {
    if let TargetArg::Host {
        all_services: true,
        ..
    }
    | TargetArg::Hostgroup {
        all_services: true,
        ..
    } = target
    {
        warn!("--all-services has no effect on acknowledgements");
    }
}

fn render_response(
    response: &Value,
    render_opts: &RenderOpts,
    columns: Option<&[&str]>,
) -> Result<()> {
    match render_opts.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(response)?);
        }
        OutputFormat::Pretty => {
            let tabular = columns.is_some() || render_opts.columns_override.is_some();
            if !tabular || !print_table(response, columns, render_opts) {
                println!("{}", serde_json::to_string_pretty(response)?);
            }
        }
    }

    Ok(())
}

fn print_table(json: &Value, columns_hint: Option<&[&str]>, render_opts: &RenderOpts) -> bool {
    let rows = match json {
        Value::Array(arr) => arr,
        Value::Object(map) => match map.get("results") {
            Some(Value::Array(arr)) => arr,
            _ => return false,
        },
        _ => return false,
    };

    if rows.is_empty() {
        println!("No results.");
        return true;
    }

    let has_values = |key: &str| {
        rows.iter()
            .any(|row| lookup(row, key).map(is_non_empty).unwrap_or(false))
    };

    let mut columns: Vec<String> = Vec::new();

    if let Some(override_cols) = &render_opts.columns_override {
        columns.extend(
            override_cols
                .iter()
                .filter(|key| has_values(key.as_str()))
                .cloned(),
        );
    }

    if columns.is_empty() {
        if let Some(hint) = columns_hint {
            columns.extend(
                hint.iter()
                    .filter(|key| has_values(**key))
                    .map(|key| (*key).to_string()),
            );
        }
    }

    if columns.is_empty() {
        return false;
    }

    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    let mut table: Vec<Vec<String>> = Vec::new();

    for row in rows {
        if !row.is_object() {
            continue;
        }
        let out_row: Vec<String> = columns
            .iter()
            .map(|col| lookup(row, col).map(value_to_str).unwrap_or_default())
            .collect();
        for (idx, cell) in out_row.iter().enumerate() {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
        table.push(out_row);
    }

    if let Some(sort) = &render_opts.sort_by {
        if let Some(idx) = columns.iter().position(|c| c == sort) {
            table.sort_by(|a, b| a[idx].cmp(&b[idx]));
        }
    }

    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    println!("{}", format_row(&columns, &widths));
    println!("{}", format_row(&rule, &widths));
    for row in &table {
        println!("{}", format_row(row, &widths));
    }

    true
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// Resolves a dotted column path such as `attrs.state`.
fn lookup<'a>(row: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(row, |value, key| value.get(key))
}

fn value_to_str(value: &Value) -> String {
    match value {
        Value::Null => "".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(_) => true,
        Value::Number(_) => true,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
