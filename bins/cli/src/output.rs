//! Printing of command results.

use clap::ValueEnum;
use misbuilder_core::gateway::MoveLine;
use misbuilder_core::mis::{DrilldownAction, ReportMatrix};
use misbuilder_core::reports::{JournalReport, OpenInvoiceReport, PrefixLineBalance};
use serde::Serialize;

/// Output format of every command.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    Json,
    /// Aligned text columns.
    Table,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints rows of cells with each column padded to its widest cell.
fn print_table(rows: &[Vec<String>]) {
    let columns = rows.iter().map(Vec::len).max().unwrap_or_default();
    let widths: Vec<usize> = (0..columns)
        .map(|i| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .max()
                .unwrap_or_default()
        })
        .collect();
    for row in rows {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, width))| {
                if i == 0 {
                    format!("{cell:<width$}")
                } else {
                    format!("{cell:>width$}")
                }
            })
            .collect();
        println!("{}", line.join("  ").trim_end());
    }
}

/// Prints a computed report.
pub fn matrix(format: OutputFormat, matrix: &ReportMatrix) -> anyhow::Result<()> {
    if let OutputFormat::Json = format {
        return print_json(matrix);
    }
    let mut rows = vec![
        std::iter::once(String::new())
            .chain(matrix.header.iter().map(|h| h.name.clone()))
            .collect::<Vec<_>>(),
        std::iter::once(String::new())
            .chain(matrix.header.iter().map(|h| h.date.clone()))
            .collect(),
    ];
    for row in &matrix.rows {
        let label = if row.label.is_empty() { &row.name } else { &row.label };
        rows.push(
            std::iter::once(label.clone())
                .chain(row.cells.iter().map(|c| c.rendered().replace('\u{A0}', " ")))
                .collect(),
        );
    }
    print_table(&rows);
    Ok(())
}

/// Prints a drill-down action and, when fetched, its move lines.
pub fn drilldown(format: OutputFormat, action: Option<&DrilldownAction>, lines: &[MoveLine]) -> anyhow::Result<()> {
    let Some(action) = action else {
        println!("Nothing to drill down into");
        return Ok(());
    };
    if let OutputFormat::Json = format {
        return print_json(&serde_json::json!({ "action": action, "lines": lines }));
    }
    println!("{}", action.name);
    println!("{}: {}", action.model, action.domain);
    if !lines.is_empty() {
        let mut rows = vec![vec![
            "date".to_string(),
            "entry".to_string(),
            "label".to_string(),
            "debit".to_string(),
            "credit".to_string(),
        ]];
        rows.extend(lines.iter().map(|l| {
            vec![
                l.date.to_string(),
                l.move_name.clone(),
                l.name.clone(),
                l.debit.to_string(),
                l.credit.to_string(),
            ]
        }));
        print_table(&rows);
    }
    Ok(())
}

/// Prints account prefix lines.
pub fn prefix_lines(format: OutputFormat, period: &str, lines: &[PrefixLineBalance]) -> anyhow::Result<()> {
    if let OutputFormat::Json = format {
        return print_json(&serde_json::json!({ "period": period, "lines": lines }));
    }
    let mut rows = vec![vec![
        period.to_string(),
        "debit".to_string(),
        "credit".to_string(),
        "balance".to_string(),
    ]];
    rows.extend(lines.iter().map(|l| {
        vec![
            l.name.clone(),
            l.debit.to_string(),
            l.credit.to_string(),
            l.balance.to_string(),
        ]
    }));
    print_table(&rows);
    Ok(())
}

/// Prints a journal report.
pub fn journal(format: OutputFormat, report: &JournalReport) -> anyhow::Result<()> {
    if let OutputFormat::Json = format {
        return print_json(report);
    }
    for journal in &report.journals {
        println!("{} ({}) from {} to {}", journal.name, journal.code, report.date_from, report.date_to);
        let mut rows = Vec::new();
        for entry in &journal.moves {
            for line in &entry.lines {
                rows.push(vec![
                    line.entry.clone(),
                    line.date.to_string(),
                    line.account_code.clone(),
                    line.partner.clone().unwrap_or_default(),
                    line.label.clone(),
                    line.taxes_description.clone(),
                    line.debit.to_string(),
                    line.credit.to_string(),
                ]);
            }
        }
        rows.push(vec![
            "Total".to_string(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            journal.debit.to_string(),
            journal.credit.to_string(),
        ]);
        print_table(&rows);
        for tax in &journal.taxes {
            println!(
                "  {}: base {} tax {}",
                tax.tax_code.as_deref().unwrap_or(&tax.tax_name),
                tax.base_balance,
                tax.tax_balance
            );
        }
        println!();
    }
    Ok(())
}

/// Prints an open invoice report.
pub fn open_invoices(format: OutputFormat, report: &OpenInvoiceReport) -> anyhow::Result<()> {
    if let OutputFormat::Json = format {
        return print_json(report);
    }
    println!(
        "{} at {} cleared on {}",
        report.account_filters, report.at_date, report.until_date
    );
    for account in &report.accounts {
        println!("{}", account.name);
        let mut rows = Vec::new();
        for partner in &account.partners {
            let name = partner.name.clone().unwrap_or_default();
            for line in &partner.lines {
                rows.push(vec![
                    name.clone(),
                    line.date.to_string(),
                    line.entry.clone(),
                    line.journal.clone(),
                    line.reference.clone().unwrap_or_default(),
                    line.label.clone(),
                    line.reconcile.clone().unwrap_or_default(),
                    line.due_date.map(|d| d.to_string()).unwrap_or_default(),
                    line.debit.to_string(),
                    line.credit.to_string(),
                ]);
            }
            rows.push(vec![
                format!("Total {name}"),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                partner.debit.to_string(),
                partner.credit.to_string(),
            ]);
        }
        print_table(&rows);
        println!();
    }
    Ok(())
}
