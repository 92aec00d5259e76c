use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use flowopt::model::{Candidate, EvaluationResult};
use flowopt::optimizer::{ProgressSnapshot, ResultSlot};
use flowopt::ranking::SortSpec;
use std::time::Duration;

fn join_keys<K: ToString>(keys: &[K]) -> String {
    keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(" > ")
}

fn fmt_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

fn metric_cells(r: &EvaluationResult) -> Vec<Cell> {
    vec![
        Cell::new(format!("{:.2}", r.net_tax_gains)).fg(Color::Cyan),
        Cell::new(format!("{:.2}", r.abs_tax_gains)),
        Cell::new(format!("{:.2}", r.sale_volume)),
        Cell::new(r.transaction_count),
        Cell::new(format!("{:.2}", r.wash_amount)).fg(Color::Red),
        Cell::new(format!("{:.3}", r.flow_mode)),
    ]
}

pub fn print_result_table(slot: ResultSlot, spec: &SortSpec, candidates: &[Candidate]) {
    println!("\nRanking {}: {}", slot, spec);
    if candidates.is_empty() {
        println!("   (no results)");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        Cell::new("#").add_attribute(Attribute::Bold),
        Cell::new("Net").fg(Color::Cyan),
        Cell::new("Abs"),
        Cell::new("Volume"),
        Cell::new("Txns"),
        Cell::new("Wash").fg(Color::Red),
        Cell::new("Flow"),
        Cell::new("Accounts"),
        Cell::new("Assets"),
    ]);

    for i in 1..=6 {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }

    for (rank, cand) in candidates.iter().enumerate() {
        let mut row = vec![Cell::new(rank + 1).add_attribute(Attribute::Bold)];
        row.extend(metric_cells(&cand.result));
        row.push(Cell::new(join_keys(&cand.result.account_keys)));
        row.push(Cell::new(join_keys(&cand.result.asset_keys)));
        table.add_row(row);
    }
    println!("{}", table);
}

pub fn format_progress_line(p: &ProgressSnapshot) -> String {
    let eta = match p.estimated_total() {
        Some(d) => format!(" | est {}", fmt_duration(d)),
        None if p.search_space.is_some() && p.candidates_per_second() > 0.0 => {
            " | est overflow".to_string()
        }
        None => String::new(),
    };
    format!(
        "{:>10} | {:6.2}% | units {}/{} | {:.0}/s | capped {:.1}%{}",
        p.status.to_string(),
        p.fraction_complete() * 100.0,
        p.work_units_completed,
        p.work_units_total,
        p.candidates_per_second(),
        p.recoverable_failure_rate() * 100.0,
        eta
    )
}

pub fn print_run_summary(p: &ProgressSnapshot) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let space = p
        .search_space
        .map_or_else(|| "overflow".to_string(), |n| n.to_string());
    let rows: Vec<(&str, String)> = vec![
        ("Elapsed", fmt_duration(p.elapsed)),
        ("Work units", format!("{} / {}", p.work_units_completed, p.work_units_total)),
        ("Search space", space),
        ("Evaluated", p.candidates_evaluated.to_string()),
        ("Capped (strict)", p.recoverable_failures.to_string()),
        ("Failed", p.unexpected_failures.to_string()),
        ("Discarded", p.discarded_calls.to_string()),
        ("Rate", format!("{:.0}/s", p.candidates_per_second())),
    ];

    for (label, value) in rows {
        table.add_row(vec![
            Cell::new(label).add_attribute(Attribute::Bold),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("\n{}", table);
}

pub fn print_estimate(
    flow_modes: usize,
    accounts: usize,
    assets: usize,
    space: Option<u128>,
    rate: Option<f64>,
) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        Cell::new("Flow modes").add_attribute(Attribute::Bold),
        Cell::new("Accounts"),
        Cell::new("Assets"),
        Cell::new("Candidates").fg(Color::Cyan),
        Cell::new("Est. time"),
    ]);

    let candidates = space.map_or_else(|| "overflow".to_string(), |n| n.to_string());
    let est = match (space, rate) {
        (Some(n), Some(r)) if r > 0.0 => Duration::try_from_secs_f64(n as f64 / r)
            .map_or_else(|_| "overflow".to_string(), fmt_duration),
        _ => "-".to_string(),
    };
    table.add_row(vec![
        Cell::new(flow_modes),
        Cell::new(accounts),
        Cell::new(assets),
        Cell::new(candidates).fg(Color::Cyan),
        Cell::new(est),
    ]);
    println!("\n{}", table);
}

pub fn print_evaluation(r: &EvaluationResult) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        Cell::new("Net").fg(Color::Cyan),
        Cell::new("Abs"),
        Cell::new("Volume"),
        Cell::new("Txns"),
        Cell::new("Wash").fg(Color::Red),
        Cell::new("Flow"),
    ]);
    table.add_row(metric_cells(r));
    println!("Accounts: {}", join_keys(&r.account_keys));
    println!("Assets:   {}", join_keys(&r.asset_keys));
    println!("{}", table);
}
