//! Terminal output for command results

use std::io::{self, BufRead, Write};

use mail::{
    BatchOutcome, DeletionResult, IngestStats, LiveSelection, MessageRecord, SenderSummary,
};

/// Print one line per record followed by the count
pub fn write_records(out: &mut impl Write, records: &[MessageRecord]) -> io::Result<()> {
    for record in records {
        writeln!(out, "{}", record.display_line())?;
    }
    writeln!(out, "\n{} messages selected.", records.len())
}

pub fn write_ingest_stats(out: &mut impl Write, stats: &IngestStats) -> io::Result<()> {
    if let Some(token) = &stats.resumed_from {
        writeln!(out, "Resumed from checkpoint {token}.")?;
    }
    writeln!(
        out,
        "Loaded {} messages for '{}' ({} pages, {:.1}s).",
        stats.upserted,
        stats.query,
        stats.pages,
        stats.duration_ms as f64 / 1000.0
    )?;
    if !stats.skipped.is_empty() {
        writeln!(out, "{} messages could not be fetched:", stats.skipped.len())?;
        for skipped in &stats.skipped {
            writeln!(out, "  {}: {}", skipped.id, skipped.reason)?;
        }
    }
    Ok(())
}

/// Report live matches that are left out of deletion
pub fn write_live_exclusions(out: &mut impl Write, selection: &LiveSelection) -> io::Result<()> {
    if !selection.retained.is_empty() {
        writeln!(
            out,
            "{} messages skipped as retained:",
            selection.retained.len()
        )?;
        for record in &selection.retained {
            writeln!(out, "  {}", record.display_line())?;
        }
    }
    if !selection.skipped.is_empty() {
        writeln!(
            out,
            "{} messages could not be fetched and will not be deleted:",
            selection.skipped.len()
        )?;
        for skipped in &selection.skipped {
            writeln!(out, "  {}: {}", skipped.id, skipped.reason)?;
        }
    }
    Ok(())
}

pub fn write_summary(out: &mut impl Write, rows: &[SenderSummary]) -> io::Result<()> {
    writeln!(out, "{:50} {:>8} {:>16}", "Sender", "Messages", "With attachments")?;
    writeln!(out, "{}", "-".repeat(76))?;
    for row in rows {
        writeln!(
            out,
            "{:50} {:>8} {:>16}",
            truncate(&row.from_addr, 50),
            row.total,
            row.with_attachment
        )?;
    }
    Ok(())
}

/// Report confirmed deletions and every failed batch with its ids
pub fn write_deletion_report(out: &mut impl Write, result: &DeletionResult) -> io::Result<()> {
    writeln!(
        out,
        "Deleted {} messages ({} marked deleted locally).",
        result.deleted_count(),
        result.marked_locally
    )?;

    let failures: Vec<_> = result.failures().collect();
    if failures.is_empty() {
        return Ok(());
    }

    writeln!(
        out,
        "{} of {} batches failed; these messages were not deleted:",
        failures.len(),
        result.batches.len()
    )?;
    for batch in failures {
        let reason = match &batch.outcome {
            BatchOutcome::Failed(reason) => reason.as_str(),
            BatchOutcome::Confirmed => "",
        };
        writeln!(out, "  batch {} ({} ids): {}", batch.index + 1, batch.ids.len(), reason)?;
        for id in &batch.ids {
            writeln!(out, "    {id}")?;
        }
    }
    Ok(())
}

/// Ask a yes/no question; only "y" or "yes" (any case) confirms
pub fn confirm(input: &mut impl BufRead, out: &mut impl Write, prompt: &str) -> io::Result<bool> {
    write!(out, "{prompt} (y/N): ")?;
    out.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(max - 3).collect();
        t.push_str("...");
        t
    }
}
