// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Command-line interface for share2md.
//!
//! This binary provides the `share2md` command for converting ChatGPT share
//! links, or saved share pages, to Markdown.

use lexopt::prelude::*;
use share2md::share_url::{Provider, ShareUrl, ShareUrlError};
use share2md::{
    Conversation, Diagnostics, ExtractError, FetchOptions, ParseOptions, extract_share_link,
    parse_share_html, renderer,
};
use snafu::{ensure, prelude::*};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Environment variable holding the log filter for `--debug`.
const LOG_ENV: &str = "SHARE2MD_LOG";

const DEFAULT_LOG_FILTER: &str = "share2md=debug";

/// Where to write the rendered output.
#[derive(Clone)]
enum OutputTarget {
    /// Write to the specified file.
    File(PathBuf),
    /// Write to stdout.
    Stdout,
}

/// One conversation source.
enum Input {
    /// A share link to fetch.
    Url(String),
    /// A saved share page.
    Html(PathBuf),
}

#[allow(clippy::struct_excessive_bools)]
struct Cli {
    urls: Vec<String>,
    html: Vec<PathBuf>,
    output: OutputTarget,
    json: bool,
    show_timestamps: bool,
    show_source: bool,
    heading_offset: u8,
    title: Option<String>,
    timeout: Duration,
    retries: u32,
    headers: Vec<(String, String)>,
    diagnostics: Diagnostics,
    quiet: bool,
    force: bool,
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to parse arguments: {source}"))]
    ParseArgs { source: lexopt::Error },

    #[snafu(display("at least one share URL or --html input is required"))]
    NoInput,

    #[snafu(display("{source}"))]
    InvalidUrl { source: ShareUrlError },

    #[snafu(display("{provider} share links are not supported yet: {url}"))]
    UnsupportedProvider { provider: Provider, url: String },

    #[snafu(display("{input}: [{}] {source}", source.code()))]
    Extract { input: String, source: ExtractError },

    #[snafu(display("failed to read {}: {source}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to serialize messages: {source}"))]
    Json { source: serde_json::Error },

    #[snafu(display("failed to create output directory: {source}"))]
    CreateOutputDir { source: std::io::Error },

    #[snafu(display("failed to write {}: {source}", path.display()))]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn print_help() {
    println!(
        "\
{name} {version}
Extract ChatGPT share-link conversations as Markdown

Usage: {name} [OPTIONS] <URL>...
       {name} [OPTIONS] --html <FILE|DIR>...

Arguments:
  <URL>...                  ChatGPT share links (chatgpt.com/share/..., chatgpt.com/s/...)

Options:
  -o, --output <OUTPUT>     Output file (default: - for stdout)
      --html <FILE|DIR>     Read saved share pages instead of fetching
      --json                Emit messages as JSON instead of Markdown
      --heading-offset <N>  Shift heading levels by N (0-5, default: 0)
      --title <TITLE>       Document title (default: ChatGPT Conversation)

Metadata display (use --show-* or --hide-*):
      --show-source         Include the share link (default: on)
      --hide-source         Hide the share link
      --show-timestamps     Include the fetch time (default: off)
      --hide-timestamps     Hide the fetch time

Network:
      --timeout <SECS>      Request timeout in seconds (default: 30)
      --retries <N>         Retries for transient failures (default: 2)
  -H, --header <NAME:VALUE> Add or replace a request header

Other options:
      --debug               Log pipeline structure to stderr (no message text)
      --debug-content       Like --debug, also logging truncated message text
  -q, --quiet               Suppress progress messages
  -f, --force               Overwrite an existing output file
  -h, --help                Print help
  -V, --version             Print version

Environment:
  {log_env}              Log filter for --debug (default: {filter})",
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        log_env = LOG_ENV,
        filter = DEFAULT_LOG_FILTER,
    );
}

fn parse_args() -> Result<Cli, lexopt::Error> {
    // Show help if no arguments provided
    if std::env::args().len() == 1 {
        print_help();
        std::process::exit(0);
    }

    let mut urls = Vec::new();
    let mut html = Vec::new();
    let mut output = OutputTarget::Stdout;
    let mut json = false;
    // Defaults: source on, timestamps off
    let mut show_timestamps = false;
    let mut show_source = true;
    let mut heading_offset: u8 = 0;
    let mut title = None;
    let mut timeout = share2md::fetch::DEFAULT_TIMEOUT;
    let mut retries = share2md::fetch::DEFAULT_RETRIES;
    let mut headers = Vec::new();
    let mut diagnostics = Diagnostics::Off;
    let mut quiet = false;
    let mut force = false;

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Short('o') | Long("output") => {
                let val: PathBuf = parser.value()?.parse()?;
                output = if val == Path::new("-") {
                    OutputTarget::Stdout
                } else {
                    OutputTarget::File(val)
                };
            }
            Long("html") => html.push(parser.value()?.parse()?),
            Long("json") => json = true,
            // Show/hide flags - last one wins
            Long("show-timestamps") => show_timestamps = true,
            Long("hide-timestamps") => show_timestamps = false,
            Long("show-source") => show_source = true,
            Long("hide-source") => show_source = false,
            Long("heading-offset") => {
                let val: u8 = parser
                    .value()?
                    .parse()
                    .map_err(|_| "heading-offset must be a number 0-5")?;
                if val > 5 {
                    return Err("heading-offset must be 0-5".into());
                }
                heading_offset = val;
            }
            Long("title") => title = Some(parser.value()?.string()?),
            Long("timeout") => {
                let secs: u64 = parser
                    .value()?
                    .parse()
                    .map_err(|_| "timeout must be a whole number of seconds")?;
                if secs == 0 {
                    return Err("timeout must be at least 1 second".into());
                }
                timeout = Duration::from_secs(secs);
            }
            Long("retries") => {
                retries = parser
                    .value()?
                    .parse()
                    .map_err(|_| "retries must be a non-negative number")?;
            }
            Short('H') | Long("header") => {
                let raw = parser.value()?.string()?;
                let (name, value) = raw
                    .split_once(':')
                    .ok_or("header must have the form NAME:VALUE")?;
                headers.push((name.trim().to_owned(), value.trim().to_owned()));
            }
            Long("debug") => {
                if diagnostics == Diagnostics::Off {
                    diagnostics = Diagnostics::Metadata;
                }
            }
            Long("debug-content") => diagnostics = Diagnostics::Content,
            Short('q') | Long("quiet") => quiet = true,
            Short('f') | Long("force") => force = true,
            Short('h') | Long("help") => {
                print_help();
                std::process::exit(0);
            }
            Short('V') | Long("version") => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            Value(val) => urls.push(val.string()?),
            _ => return Err(arg.unexpected()),
        }
    }

    Ok(Cli {
        urls,
        html,
        output,
        json,
        show_timestamps,
        show_source,
        heading_offset,
        title,
        timeout,
        retries,
        headers,
        diagnostics,
        quiet,
        force,
    })
}

#[snafu::report]
fn main() -> Result<(), Error> {
    let cli = parse_args().context(ParseArgsSnafu)?;

    ensure!(!cli.urls.is_empty() || !cli.html.is_empty(), NoInputSnafu);

    if cli.diagnostics.enabled() {
        init_logging();
    }

    let inputs = collect_inputs(&cli)?;
    let conversations = inputs
        .iter()
        .map(|input| process_input(input, &cli))
        .collect::<Result<Vec<_>, _>>()?;

    let rendered = if cli.json {
        render_json(&conversations)?
    } else {
        render_markdown(&conversations, &cli)
    };

    write_output(&rendered, &cli)
}

/// Installs a stderr subscriber filtered by [`LOG_ENV`].
fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Validates URLs and expands `--html` directories, keeping argument order.
fn collect_inputs(cli: &Cli) -> Result<Vec<Input>, Error> {
    let mut inputs = Vec::new();

    for raw in &cli.urls {
        let link = ShareUrl::parse(raw).context(InvalidUrlSnafu)?;
        ensure!(
            link.provider() == Provider::ChatGpt,
            UnsupportedProviderSnafu {
                provider: link.provider(),
                url: raw,
            }
        );
        inputs.push(Input::Url(link.as_str().to_owned()));
    }

    inputs.extend(collect_html_files(&cli.html).into_iter().map(Input::Html));
    Ok(inputs)
}

/// Collects all HTML files from the given inputs (files and directories).
fn collect_html_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| {
                    e.path()
                        .extension()
                        .is_some_and(|ext| ext == "html" || ext == "htm")
                })
            {
                files.push(entry.path().to_path_buf());
            }
        } else {
            files.push(input.clone());
        }
    }
    files
}

fn process_input(input: &Input, cli: &Cli) -> Result<Conversation, Error> {
    let parse_opts = ParseOptions {
        diagnostics: cli.diagnostics,
        ..ParseOptions::default()
    };

    match input {
        Input::Url(url) => {
            if !cli.quiet {
                eprintln!("Fetching {url}");
            }
            let fetch_opts = FetchOptions {
                timeout: cli.timeout,
                retries: cli.retries,
                header_overrides: cli.headers.clone(),
                diagnostics: cli.diagnostics,
                ..FetchOptions::default()
            };
            extract_share_link(url, &fetch_opts, &parse_opts).context(ExtractSnafu { input: url })
        }
        Input::Html(path) => {
            let html = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
            let messages = parse_share_html(&html, &parse_opts).context(ExtractSnafu {
                input: path.display().to_string(),
            })?;
            Ok(Conversation {
                source_url: path.display().to_string(),
                fetched_at: None,
                messages,
            })
        }
    }
}

/// Creates render options from CLI arguments.
fn make_render_options(cli: &Cli) -> renderer::RenderOptions {
    renderer::RenderOptions {
        show_timestamps: cli.show_timestamps,
        show_source: cli.show_source,
        heading_offset: cli.heading_offset,
        title: cli.title.clone(),
    }
}

/// Renders all conversations, separated by horizontal rules.
fn render_markdown(conversations: &[Conversation], cli: &Cli) -> String {
    let opts = make_render_options(cli);
    let mut output = String::new();

    for (i, conversation) in conversations.iter().enumerate() {
        if i > 0 {
            output.push_str("\n---\n\n");
        }
        output.push_str(&renderer::render_conversation(conversation, &opts));
    }

    output
}

/// Serializes the messages of all conversations as one JSON array.
fn render_json(conversations: &[Conversation]) -> Result<String, Error> {
    let messages: Vec<_> = conversations.iter().flat_map(|c| &c.messages).collect();
    let mut json = serde_json::to_string_pretty(&messages).context(JsonSnafu)?;
    json.push('\n');
    Ok(json)
}

fn write_output(rendered: &str, cli: &Cli) -> Result<(), Error> {
    match &cli.output {
        OutputTarget::Stdout => print!("{rendered}"),
        OutputTarget::File(path) => {
            if path.exists() && !cli.force {
                eprintln!(
                    "Skipping {} (already exists, use --force to overwrite)",
                    path.display()
                );
                return Ok(());
            }
            // Create parent directory if needed
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).context(CreateOutputDirSnafu)?;
            }
            std::fs::write(path, rendered).context(WriteFileSnafu { path })?;
            if !cli.quiet {
                eprintln!("Wrote {}", path.display());
            }
        }
    }

    Ok(())
}
