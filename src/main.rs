use std::io;
use std::path::PathBuf;
use std::process;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand, ValueEnum};
use devops_helper::adapters::xh::XhTransport;
use devops_helper::client::DevOpsClient;
use devops_helper::cmd::{
    CommandResponse, patch, query_bugs, test_failures, update_work_item,
};
use devops_helper::config::{ClientConfig, ConnectionOverrides};
use devops_helper::io::{Format, writer};
use serde::Serialize;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "devops-helper",
    version,
    about = "Work item and test failure automation for Azure DevOps"
)]
struct Cli {
    /// Log request details to stderr (overridden by RUST_LOG).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the work items returned by a saved query.
    QueryBugs(QueryBugsArgs),
    /// Summarize failed test results of a pipeline.
    TestFailures(TestFailuresArgs),
    /// Compute the JSON Patch between two work item documents.
    Patch(PatchArgs),
    /// Edit a work item and send only the changed fields.
    UpdateWorkItem(UpdateWorkItemArgs),
}

#[derive(Debug, clap::Args)]
struct ConnectionArgs {
    /// Project url, e.g. https://org.visualstudio.com/Project.
    #[arg(long, env = "DEVOPS_HELPER_URL")]
    url: Option<String>,

    /// Personal access token.
    #[arg(long, env = "DEVOPS_HELPER_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// `xh` executable used for HTTP.
    #[arg(long, env = "DEVOPS_HELPER_XH_BIN")]
    xh_bin: Option<String>,

    /// TOML file with `url`, `token` and `xh_bin` keys.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, clap::Args)]
struct QueryBugsArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[arg(long)]
    query_id: String,
}

#[derive(Debug, clap::Args)]
struct TestFailuresArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[arg(long)]
    pipeline: u32,

    #[arg(long)]
    branch: Option<String>,

    /// RFC 3339 timestamp or YYYY-MM-DD date.
    #[arg(long)]
    since: Option<String>,

    #[arg(long, default_value = "Failed")]
    outcome: String,

    #[arg(long)]
    top: Option<u32>,

    /// Regex; matching test names are skipped. Repeatable.
    #[arg(long = "ignore-pattern")]
    ignore_patterns: Vec<String>,

    /// Look up open bugs linked to each failing test.
    #[arg(long, default_value_t = false)]
    with_bugs: bool,

    #[arg(long, value_enum, default_value_t = ReportFormat::Json)]
    format: ReportFormat,
}

#[derive(Debug, clap::Args)]
struct PatchArgs {
    #[arg(long)]
    before: PathBuf,

    #[arg(long)]
    after: PathBuf,

    #[arg(long, value_enum)]
    from: Option<CliInputFormat>,

    /// Omit the leading `test /rev` operation.
    #[arg(long, default_value_t = false)]
    no_guard: bool,

    /// Exit with code 2 when the documents differ.
    #[arg(long, default_value_t = false)]
    check: bool,
}

#[derive(Debug, clap::Args)]
struct UpdateWorkItemArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[arg(long)]
    id: i64,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    state: Option<String>,

    /// Assignee email; an empty value unassigns.
    #[arg(long)]
    assigned_to: Option<String>,

    /// Discussion comment added with the update.
    #[arg(long)]
    comment: Option<String>,

    #[arg(long = "add-tag")]
    add_tags: Vec<String>,

    #[arg(long = "remove-tag")]
    remove_tags: Vec<String>,

    #[arg(long = "add-link")]
    add_links: Vec<String>,

    /// Relation position as fetched. Repeatable.
    #[arg(long = "remove-link")]
    remove_links: Vec<usize>,

    /// Print the patch instead of sending it.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliInputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Json,
    Csv,
}

impl From<CliInputFormat> for Format {
    fn from(value: CliInputFormat) -> Self {
        match value {
            CliInputFormat::Json => Self::Json,
            CliInputFormat::Yaml => Self::Yaml,
        }
    }
}

impl From<ConnectionArgs> for ConnectionOverrides {
    fn from(value: ConnectionArgs) -> Self {
        Self {
            url: value.url,
            token: value.token,
            xh_bin: value.xh_bin,
            config: value.config,
        }
    }
}

#[derive(Serialize)]
struct CliError<'a> {
    error: &'a str,
    message: String,
    code: i32,
    details: Value,
}

fn main() {
    process::exit(run());
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return handle_parse_error(error),
    };
    init_tracing(cli.verbose);

    match cli.command {
        Commands::QueryBugs(args) => run_query_bugs(args),
        Commands::TestFailures(args) => run_test_failures(args),
        Commands::Patch(args) => run_patch(args),
        Commands::UpdateWorkItem(args) => run_update_work_item(args),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{error}");
            0
        }
        _ => {
            emit_error(
                "input_usage_error",
                error.to_string(),
                json!({"kind": "cli_parse_error"}),
                3,
            );
            3
        }
    }
}

fn run_query_bugs(args: QueryBugsArgs) -> i32 {
    let command_args = query_bugs::QueryBugsCommandArgs {
        query_id: args.query_id,
    };
    with_client("query-bugs", args.connection, |client| {
        query_bugs::run(&command_args, client)
    })
}

fn run_test_failures(args: TestFailuresArgs) -> i32 {
    let format = args.format;
    let command_args = test_failures::TestFailuresCommandArgs {
        pipeline: args.pipeline,
        branch: args.branch,
        since: args.since,
        outcome: args.outcome,
        top: args.top,
        ignore_patterns: args.ignore_patterns,
        with_bugs: args.with_bugs,
    };
    let response = match connect("test-failures", args.connection) {
        Ok(client) => test_failures::run(&command_args, &client),
        Err(code) => return code,
    };
    if format == ReportFormat::Csv && response.exit_code == 0 {
        return emit_csv_report(&response.payload);
    }
    emit_response("test-failures", &response)
}

fn run_patch(args: PatchArgs) -> i32 {
    let command_args = patch::PatchCommandArgs {
        before: args.before,
        after: args.after,
        from: args.from.map(Into::into),
        no_guard: args.no_guard,
        check: args.check,
    };
    let response = patch::run(&command_args);
    emit_response("patch", &response)
}

fn run_update_work_item(args: UpdateWorkItemArgs) -> i32 {
    let command_args = update_work_item::UpdateWorkItemCommandArgs {
        id: args.id,
        title: args.title,
        state: args.state,
        assigned_to: args.assigned_to,
        comment: args.comment,
        add_tags: args.add_tags,
        remove_tags: args.remove_tags,
        add_links: args.add_links,
        remove_links: args.remove_links,
        dry_run: args.dry_run,
    };
    with_client("update-work-item", args.connection, |client| {
        update_work_item::run(&command_args, client)
    })
}

fn with_client(
    command: &'static str,
    connection: ConnectionArgs,
    run_command: impl FnOnce(&DevOpsClient<XhTransport>) -> CommandResponse,
) -> i32 {
    match connect(command, connection) {
        Ok(client) => emit_response(command, &run_command(&client)),
        Err(code) => code,
    }
}

fn connect(
    command: &'static str,
    connection: ConnectionArgs,
) -> Result<DevOpsClient<XhTransport>, i32> {
    match ClientConfig::resolve(&connection.into()) {
        Ok(config) => {
            let transport = XhTransport::new(config.xh_bin.as_str());
            Ok(DevOpsClient::from_config(&config, transport))
        }
        Err(error) => {
            emit_error(
                "input_usage_error",
                error.to_string(),
                json!({"command": command, "kind": "config_error"}),
                3,
            );
            Err(3)
        }
    }
}

fn emit_response(command: &'static str, response: &CommandResponse) -> i32 {
    let emitted = match response.exit_code {
        0 | 2 => emit_json_stdout(&response.payload),
        _ => emit_json_stderr(&response.payload),
    };
    if emitted {
        response.exit_code
    } else {
        emit_error(
            "internal_error",
            format!("failed to serialize {command} response"),
            json!({"command": command}),
            1,
        );
        1
    }
}

fn emit_csv_report(payload: &Value) -> i32 {
    let rows = payload.as_array().map(Vec::as_slice).unwrap_or_default();
    let stdout = io::stdout();
    match writer::write_csv(stdout.lock(), test_failures::CSV_COLUMNS, rows) {
        Ok(()) => 0,
        Err(error) => {
            emit_error(
                "internal_error",
                format!("failed to write csv report: {error}"),
                json!({"command": "test-failures"}),
                1,
            );
            1
        }
    }
}

fn emit_json_stdout(value: &Value) -> bool {
    writer::write_json(io::stdout().lock(), value).is_ok()
}

fn emit_json_stderr(value: &Value) -> bool {
    writer::write_json(io::stderr().lock(), value).is_ok()
}

fn emit_error(error: &'static str, message: String, details: Value, code: i32) {
    let payload = CliError {
        error,
        message,
        code,
        details,
    };
    match serde_json::to_string(&payload) {
        Ok(serialized) => eprintln!("{serialized}"),
        Err(_) => eprintln!(
            "{{\"error\":\"internal_error\",\"message\":\"failed to serialize error\",\"code\":1}}"
        ),
    }
}
