//! Run one command dialogue on a host.
//!
//! Wait, response, search and report lists are `|`-delimited, the same way
//! they are written in an inventory file.
//!
//! # Usage
//!
//! Change a password:
//! ```bash
//! cargo run --example run_command -- --host web01 --user ops --password oldpass \
//!     --command passwd --search successfully \
//!     --wait 'current|New password|Retype' --response 'oldpass|newpass|newpass'
//! ```
//!
//! Check a service, reporting when it is absent:
//! ```bash
//! cargo run --example run_command -- --host web01 --user ops --key ~/.ssh/id_ed25519 \
//!     --command 'systemctl is-active nginx' --search 'active|$NF' --report 'UP|DOWN'
//! ```
//!
//! Responses of the form `$CT=<ciphertext>` are decrypted with the key file
//! given by `--cipher-key` (or the built-in passphrase).

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use reachsh::{
    Cipher, DialogueSpec, FileResultsLog, HostSession, NullResultsLog, ResultsLog,
    SessionBuilder,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, aborting.");
            std::process::exit(130);
        }
    });

    let args = Args::parse();

    let spec = DialogueSpec::from_delimited(
        &args.command,
        &args.search,
        &args.report,
        &args.wait,
        &args.response,
    )?;

    let cipher = match &args.cipher_key {
        Some(path) => Cipher::from_key_file(path)?,
        None => Cipher::default(),
    };
    let results: Arc<dyn ResultsLog> = match &args.results {
        Some(path) => Arc::new(FileResultsLog::append(path)?),
        None => Arc::new(NullResultsLog),
    };

    let mut builder = SessionBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .trust_hosts(args.trust_hosts)
        .agent_only(args.agent_only)
        .cipher(Arc::new(cipher))
        .results_log(Arc::clone(&results));
    if let Some(password) = &args.password {
        builder = builder.password(password);
    }
    if let Some(key_path) = &args.key {
        builder = builder.private_key(key_path);
    }

    let mut session = builder.build()?;

    println!("Connecting to {}:{}...", args.host, args.port);
    let status = session.connect().await;
    println!("{}: {}", args.host, status);
    if !status.is_connected() {
        results.flush();
        std::process::exit(1);
    }

    let result = session.run_dialogue(&spec).await?;
    println!("{}", "-".repeat(50));
    println!("{}", result.result);
    println!("{}", "-".repeat(50));
    println!("Outcome: {:?}, search: {:?}", result.outcome, result.search);
    if let Some(report) = &result.report {
        println!("Report: {}", report);
    }
    if !result.missing_waits.is_empty() {
        println!("Wait strings not seen: {:?}", result.missing_waits);
    }
    if !result.unanswered_waits.is_empty() {
        println!("Wait strings left unanswered: {:?}", result.unanswered_waits);
    }
    println!("Completed in {:?}", result.elapsed);

    session.close().await?;
    results.flush();

    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    key: Option<PathBuf>,
    agent_only: bool,
    trust_hosts: bool,
    command: String,
    search: String,
    report: String,
    wait: String,
    response: String,
    cipher_key: Option<PathBuf>,
    results: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut parsed = Self {
            host: "localhost".to_string(),
            port: 22,
            user: env::var("USER").unwrap_or_else(|_| "root".to_string()),
            password: None,
            key: None,
            agent_only: false,
            trust_hosts: false,
            command: "uname -a".to_string(),
            search: String::new(),
            report: String::new(),
            wait: String::new(),
            response: String::new(),
            cipher_key: None,
            results: None,
        };

        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--agent-only" => parsed.agent_only = true,
                "--trust-hosts" => parsed.trust_hosts = true,
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                flag => {
                    let Some(value) = args.next() else {
                        eprintln!("Missing value for {}", flag);
                        std::process::exit(2);
                    };
                    match flag {
                        "--host" | "-h" => parsed.host = value,
                        "--port" | "-p" => parsed.port = value.parse().unwrap_or(22),
                        "--user" | "-u" => parsed.user = value,
                        "--password" | "-P" => parsed.password = Some(value),
                        "--key" | "-k" => parsed.key = Some(PathBuf::from(value)),
                        "--command" | "-c" => parsed.command = value,
                        "--search" => parsed.search = value,
                        "--report" => parsed.report = value,
                        "--wait" => parsed.wait = value,
                        "--response" => parsed.response = value,
                        "--cipher-key" => parsed.cipher_key = Some(PathBuf::from(value)),
                        "--results" => parsed.results = Some(PathBuf::from(value)),
                        _ => eprintln!("Unknown argument: {}", flag),
                    }
                }
            }
        }

        parsed
    }

    fn print_help() {
        println!(
            r#"reachsh run_command example

USAGE:
    cargo run --example run_command -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>         Target host [default: localhost]
    -p, --port <PORT>         SSH port [default: 22]
    -u, --user <USER>         Username [default: $USER]
    -P, --password <PASS>     Password, also the key passphrase
    -k, --key <PATH>          Path to SSH private key
        --agent-only          Only use the SSH agent
        --trust-hosts         Accept unknown host keys
    -c, --command <CMD>       Command to run [default: uname -a]
        --search <LIST>       Search strings, '$NF' reports absence
        --report <LIST>       Report strings, one per search string
        --wait <LIST>         Strings to wait for
        --response <LIST>     Responses, one per wait string
        --cipher-key <PATH>   Passphrase file for $CT= responses
        --results <PATH>      Append result lines to this file
    --help                    Print this help message

Lists are '|'-delimited."#
        );
    }
}
