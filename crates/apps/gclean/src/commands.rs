//! Command execution

use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use mail::{
    ActionHandler, GmailAuth, GmailClient, GmailCredentials, IngestOptions, IngestWindow,
    MessageRecord, MessageStore, RemoteSearch, RemoteSink, RemoteSource, Settings,
    SqliteMessageStore,
};

use crate::cli::{Cli, Command, LiveCmd, LoadCmd, RetainCmd, RetainCommand, SelectCmd, SummaryCmd};
use crate::output;

/// Shared state resolved once per invocation
struct Session {
    settings: Settings,
    store_path: PathBuf,
    account: Option<String>,
}

impl Session {
    fn new(cli: &Cli) -> Result<Self> {
        let settings = Settings::load().context("Failed to load settings")?;
        let store_path = settings.resolve_store_path(cli.db.as_deref());
        Ok(Self {
            settings,
            store_path,
            account: cli.account.clone(),
        })
    }

    fn open_store(&self) -> Result<Arc<SqliteMessageStore>> {
        info!("Using store at {}", self.store_path.display());
        let store = SqliteMessageStore::new(&self.store_path)?;
        Ok(Arc::new(store))
    }

    fn gmail(&self) -> Result<Arc<GmailClient>> {
        let credentials = GmailCredentials::load()?;
        let auth = GmailAuth::new(credentials)?.login_hint(self.account.clone());
        Ok(Arc::new(GmailClient::new(auth)))
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let session = Session::new(&cli)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Load(cmd) => load(&session, cmd, &mut out),
        Command::Select(cmd) => select(&session, cmd, &mut out),
        Command::Summary(cmd) => summary(&session, cmd, &mut out),
        Command::Retain(cmd) => retain(&session, cmd, &mut out),
        Command::Live(cmd) => live(&session, cmd, &mut out),
    }
}

fn load(session: &Session, cmd: LoadCmd, out: &mut impl Write) -> Result<()> {
    let window = match (cmd.year, cmd.after, cmd.before) {
        (Some(year), _, _) => IngestWindow::year(year)?,
        (None, Some(after), Some(before)) => IngestWindow::new(after, before)?,
        _ => return Err(mail::Error::usage("give a year or both --after and --before").into()),
    };

    let store = session.open_store()?;
    let gmail = session.gmail()?;
    let options = IngestOptions {
        page_size: session.settings.page_size(),
        resume: cmd.resume,
    };

    let stats = mail::ingest_window(&*gmail, &*store, &window, &options)?;
    output::write_ingest_stats(out, &stats)?;
    Ok(())
}

fn select(session: &Session, cmd: SelectCmd, out: &mut impl Write) -> Result<()> {
    let store = session.open_store()?;
    let sink = || -> Result<Arc<dyn RemoteSink>> {
        let gmail: Arc<dyn RemoteSink> = session.gmail()?;
        Ok(gmail)
    };
    run_select(
        store,
        sink,
        &cmd,
        session.settings.batch_size(),
        &mut io::stdin().lock(),
        out,
    )
}

/// Print the selection, then delete it only with `--delete` and a confirmed prompt
///
/// The sink is only constructed once deletion is confirmed.
fn run_select(
    store: Arc<dyn MessageStore>,
    sink: impl FnOnce() -> Result<Arc<dyn RemoteSink>>,
    cmd: &SelectCmd,
    batch_size: usize,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<()> {
    let records = mail::select(
        store.as_ref(),
        &cmd.senders,
        cmd.from_file.as_deref(),
        &cmd.subjects,
    )?;

    output::write_records(out, &records)?;
    if let Some(path) = &cmd.out {
        write_lines(path, &records)?;
        writeln!(out, "Wrote {} lines to {}.", records.len(), path.display())?;
    }

    if !cmd.delete {
        writeln!(out, "Dry run: nothing was deleted. Run again with --delete to remove these messages.")?;
        return Ok(());
    }
    if records.is_empty() {
        return Ok(());
    }

    if !confirm_delete(input, out, records.len())? {
        return Ok(());
    }

    let handler = ActionHandler::new(sink()?, store);
    let result = handler.delete_selected(&records, batch_size)?;
    output::write_deletion_report(out, &result)?;
    Ok(())
}

fn summary(session: &Session, cmd: SummaryCmd, out: &mut impl Write) -> Result<()> {
    let store = session.open_store()?;
    let rows = store.summarize(cmd.include_deleted)?;
    output::write_summary(out, &rows)?;
    Ok(())
}

fn retain(session: &Session, cmd: RetainCmd, out: &mut impl Write) -> Result<()> {
    let store = session.open_store()?;

    match cmd.command {
        RetainCommand::List => {
            for addr in store.list_retained()? {
                writeln!(out, "{addr}")?;
            }
        }
        RetainCommand::Add { addrs } => {
            for addr in addrs {
                if store.add_retained(&addr)? {
                    writeln!(out, "Retained {addr}")?;
                } else {
                    writeln!(out, "{addr} was already retained")?;
                }
            }
        }
        RetainCommand::Remove { addrs } => {
            for addr in addrs {
                if store.remove_retained(&addr)? {
                    writeln!(out, "No longer retaining {addr}")?;
                } else {
                    writeln!(out, "{addr} was not retained")?;
                }
            }
        }
    }
    Ok(())
}

fn live(session: &Session, cmd: LiveCmd, out: &mut impl Write) -> Result<()> {
    let search = RemoteSearch::new()
        .subjects(cmd.subjects)
        .senders(cmd.senders)
        .newer_than(cmd.newer_than)?
        .older_than(cmd.older_than)?;
    info!("Live search: {}", search.query()?);

    let store = session.open_store()?;
    let gmail = session.gmail()?;
    run_live(
        &search,
        &*gmail,
        gmail.clone(),
        store,
        cmd.delete,
        &session.settings,
        &mut io::stdin().lock(),
        out,
    )
}

/// List live matches, then delete the eligible ones after confirmation
///
/// Retained senders and unfetchable matches are reported but never deleted.
#[allow(clippy::too_many_arguments)]
fn run_live(
    search: &RemoteSearch,
    source: &dyn RemoteSource,
    sink: Arc<dyn RemoteSink>,
    store: Arc<dyn MessageStore>,
    delete: bool,
    settings: &Settings,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<()> {
    let selection = search.select_live(source, store.as_ref(), settings.page_size())?;
    if selection.matched() == 0 {
        writeln!(out, "No messages found.")?;
        return Ok(());
    }

    writeln!(
        out,
        "Found {} messages matching: {}\n",
        selection.matched(),
        selection.query
    )?;
    output::write_records(out, &selection.records)?;
    output::write_live_exclusions(out, &selection)?;

    if !delete {
        writeln!(out, "\nRun again with --delete to remove these messages.")?;
        return Ok(());
    }
    if selection.records.is_empty() {
        return Ok(());
    }
    if !confirm_delete(input, out, selection.records.len())? {
        return Ok(());
    }

    let handler = ActionHandler::new(sink, store);
    let result = handler.delete_ids(&selection.ids(), settings.batch_size())?;
    output::write_deletion_report(out, &result)?;
    Ok(())
}

/// A declined prompt is a clean no-op
fn confirm_delete(input: &mut impl BufRead, out: &mut impl Write, count: usize) -> Result<bool> {
    let prompt = format!("Permanently delete these {count} messages?");
    let confirmed = output::confirm(input, out, &prompt)?;
    if !confirmed {
        writeln!(out, "Deletion cancelled.")?;
    }
    Ok(confirmed)
}

fn write_lines(path: &Path, records: &[MessageRecord]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for record in records {
        writeln!(writer, "{}", record.display_line())?;
    }
    writer.flush()?;
    Ok(())
}
