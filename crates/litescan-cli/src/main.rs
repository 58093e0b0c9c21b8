//! litescan command line:
//!
//! ```text
//! litescan <db-path> .dbinfo
//! litescan <db-path> .tables
//! litescan <db-path> SELECT ...
//! ```
//!
//! Results go to stdout; diagnostics and logs go to stderr. The process
//! exits zero on success and with the error's result code otherwise.

use std::process::ExitCode;
use std::time::Duration;

use litescan::{parse_statement, CancelToken, Database, PagerConfig, Result, ScanError};
use tracing_subscriber::EnvFilter;

/// Upper bound on one CLI command, parsing through output.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        eprintln!("usage: litescan <database> (.dbinfo | .tables | <sql>)");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("litescan: failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&args[0], &args[1..])) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("litescan: {err}");
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}

/// Run one command against one database, returning what goes to stdout.
async fn run(db_path: &str, command: &[String]) -> Result<String> {
    let cancel = CancelToken::new();
    let outcome = tokio::time::timeout(COMMAND_TIMEOUT, dispatch(db_path, command, &cancel)).await;
    match outcome {
        Ok(result) => result,
        Err(_) => {
            cancel.cancel();
            Err(ScanError::TimedOut {
                after: COMMAND_TIMEOUT,
            })
        }
    }
}

async fn dispatch(db_path: &str, command: &[String], cancel: &CancelToken) -> Result<String> {
    let db = Database::open(db_path, PagerConfig::default()).await?;

    match command[0].as_str() {
        ".dbinfo" => Ok(format!(
            "database page size: {}\nnumber of tables: {}\n",
            db.page_size(),
            db.user_table_count()
        )),
        ".tables" => {
            let mut out = String::new();
            for name in db.table_names() {
                out.push_str(name);
                out.push(' ');
            }
            out.push('\n');
            Ok(out)
        }
        _ => {
            let sql = command.join(" ");
            let stmt = parse_statement(&sql)?;
            let lines = db.execute(&stmt, cancel).await?;
            let mut out = String::new();
            for line in lines {
                out.push_str(&line);
                out.push('\n');
            }
            Ok(out)
        }
    }
}
