//! Command-line interface for pg-rowcheck

use crate::config::{
    BackupMode, DEFAULT_CONTAINER, DEFAULT_DB_URL, DEFAULT_REPORT_FILE, DEFAULT_SNAPSHOT_FILE,
    DEFAULT_THREADS,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pg-rowcheck")]
#[command(about = "Verify that PostgreSQL table contents survive an upgrade")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Connection and parallelism flags shared by every command
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Database connection string (base URL)
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DB_URL)]
    pub db_url: String,

    /// Database name to process
    #[arg(long, env = "DB_NAME")]
    pub db_name: String,

    /// Number of parallel workers and pooled connections
    #[arg(long, env = "DB_THREADS", default_value_t = DEFAULT_THREADS, value_parser = validate_threads)]
    pub threads: usize,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dump the database, then snapshot row counts, checksums and keys
    Backup {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// File to save the snapshot to
        #[arg(long, default_value = DEFAULT_SNAPSHOT_FILE)]
        snapshot_file: PathBuf,

        /// File to save the SQL dump to (default: <db>_backup_<timestamp>.sql)
        #[arg(long)]
        dump_file: Option<PathBuf>,

        /// Skip the physical backup, only take the snapshot
        #[arg(long)]
        skip_dump: bool,

        /// Where pg_dump runs
        #[arg(long, value_enum, default_value_t = BackupMode::Docker)]
        backup_mode: BackupMode,

        /// Container running the database server (docker mode)
        #[arg(long, env = "DB_CONTAINER", default_value = DEFAULT_CONTAINER)]
        container: String,
    },

    /// Compare the current database with a saved snapshot
    Compare {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Snapshot file to compare against
        #[arg(long, default_value = DEFAULT_SNAPSHOT_FILE)]
        snapshot_file: PathBuf,

        /// Output Excel file for the report
        #[arg(long, default_value = DEFAULT_REPORT_FILE)]
        output: PathBuf,
    },
}

fn validate_threads(s: &str) -> Result<usize, String> {
    let threads: usize = s
        .parse()
        .map_err(|_| format!("Invalid thread count: '{}'. Must be a positive integer.", s))?;

    if threads == 0 {
        return Err("Thread count must be greater than 0".to_string());
    }

    Ok(threads)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backup_with_all_flags() {
        let cli = Cli::try_parse_from([
            "pg-rowcheck",
            "backup",
            "--db-url",
            "postgresql://postgres:pw@db:5432",
            "--db-name",
            "logto",
            "--threads",
            "8",
            "--dump-file",
            "pre.sql",
            "--backup-mode",
            "local",
            "--container",
            "pg16",
        ])
        .unwrap();

        match cli.command {
            Commands::Backup {
                connection,
                dump_file,
                skip_dump,
                backup_mode,
                container,
                ..
            } => {
                assert_eq!(connection.db_name, "logto");
                assert_eq!(connection.threads, 8);
                assert_eq!(dump_file, Some(PathBuf::from("pre.sql")));
                assert!(!skip_dump);
                assert_eq!(backup_mode, BackupMode::Local);
                assert_eq!(container, "pg16");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn compare_uses_default_files() {
        let cli = Cli::try_parse_from([
            "pg-rowcheck",
            "compare",
            "--db-name",
            "logto",
            "--threads",
            "2",
        ])
        .unwrap();

        match cli.command {
            Commands::Compare {
                snapshot_file,
                output,
                ..
            } => {
                assert_eq!(snapshot_file, PathBuf::from("migration_snapshot.json"));
                assert_eq!(output, PathBuf::from("upgrade_diff_report.xlsx"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from([
            "pg-rowcheck",
            "compare",
            "--db-name",
            "app",
            "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn zero_threads_is_rejected() {
        let result = Cli::try_parse_from([
            "pg-rowcheck",
            "backup",
            "--db-name",
            "app",
            "--threads",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn thread_validator_messages() {
        assert_eq!(validate_threads("3"), Ok(3));
        assert!(validate_threads("many").unwrap_err().contains("positive integer"));
        assert!(validate_threads("0").is_err());
    }
}
