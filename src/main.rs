use anyhow::{bail, Context, Result};
use clap::Parser;
use scrublist::output::archive::{AUDIT_REPORT_ENTRY, CLEANED_LIST_ENTRY};
use scrublist::pipeline::{self, ProcessingOutcome, RawFile, RunOptions};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Clean a contact list against a suppression list"
)]
struct Args {
    /// Contact list to clean (CSV, TSV, or spreadsheet)
    contact: PathBuf,
    /// Suppression list to match against
    suppression: PathBuf,
    /// Directory for the generated archive and CSV artifacts
    #[arg(long, default_value = "./output")]
    output: PathBuf,
    /// Skip generating the removal audit report
    #[arg(long)]
    no_audit: bool,
    /// Keep rows whose email fails the syntax check
    #[arg(long)]
    keep_invalid: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    let args = Args::parse();

    // ─── 2) load both inputs into memory ─────────────────────────────
    let (contact_bytes, suppression_bytes) =
        tokio::try_join!(fs::read(&args.contact), fs::read(&args.suppression))
            .context("reading input files")?;

    let contact = RawFile {
        name: file_name(&args.contact),
        bytes: contact_bytes,
    };
    let suppression = RawFile {
        name: file_name(&args.suppression),
        bytes: suppression_bytes,
    };
    let options = RunOptions {
        generate_audit_report: !args.no_audit,
        remove_invalid_emails: !args.keep_invalid,
    };

    // ─── 3) run the pipeline off this thread ─────────────────────────
    let outcome = pipeline::run_in_worker(contact, suppression, options).await;

    // ─── 4) write artifacts & report ─────────────────────────────────
    let out = match outcome {
        ProcessingOutcome::Success(out) => out,
        ProcessingOutcome::Failure { message } => bail!(message),
    };

    if out.contact_has_multiple_sheets {
        warn!("contact file has multiple sheets; only the first was used");
    }
    if out.suppression_has_multiple_sheets {
        warn!("suppression file has multiple sheets; only the first was used");
    }

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let stem = args
        .contact
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("contact_list");
    let archive_path = args.output.join(format!("{stem}_cleaned.zip"));
    std::fs::write(&archive_path, &out.archive)
        .with_context(|| format!("writing {}", archive_path.display()))?;

    let cleaned_path = args.output.join(CLEANED_LIST_ENTRY);
    std::fs::write(&cleaned_path, out.cleaned_csv.as_bytes())
        .with_context(|| format!("writing {}", cleaned_path.display()))?;

    if let Some(audit) = &out.audit_csv {
        let audit_path = args.output.join(AUDIT_REPORT_ENTRY);
        std::fs::write(&audit_path, audit.as_bytes())
            .with_context(|| format!("writing {}", audit_path.display()))?;
    }

    info!("archive written to {}", archive_path.display());
    println!("{}", serde_json::to_string_pretty(&out.stats)?);

    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
