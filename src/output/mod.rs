use colored::Colorize;
use itertools::Itertools;

use crate::domain::{ClientPage, EmployeeRecord};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" | "table" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

const HEADERS: [&str; 10] = [
    "ID",
    "FIRST NAME",
    "LAST NAME",
    "BORN",
    "STARTED",
    "STREET",
    "CITY",
    "ZIP",
    "STATE",
    "DEPARTMENT",
];

fn row(record: &EmployeeRecord) -> [String; 10] {
    let f = &record.fields;
    [
        record.id.to_string(),
        f.first_name.clone(),
        f.last_name.clone(),
        f.date_of_birth.clone(),
        f.start_date.clone(),
        f.street.clone(),
        f.city.clone(),
        f.zipcode.clone(),
        f.state.to_string(),
        f.department.to_string(),
    ]
}

pub fn render_table(records: &[EmployeeRecord]) -> String {
    let rows: Vec<[String; 10]> = records.iter().map(row).collect();
    let mut widths = HEADERS.map(|h| h.chars().count());
    for r in rows.iter() {
        for (w, cell) in widths.iter_mut().zip(r.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let pad = |cell: &str, width: usize| format!("{cell:<width$}");
    let mut out = String::new();
    let header = HEADERS
        .iter()
        .zip(widths.iter())
        .map(|(h, w)| pad(h, *w))
        .join("  ");
    out.push_str(&header.trim_end().bold().to_string());
    out.push('\n');
    for r in rows.iter() {
        let line = r.iter().zip(widths.iter()).map(|(c, w)| pad(c, *w)).join("  ");
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// One-line paging summary, e.g. `page 3/10  rows 20-29 of 93  server pages 0,1`.
pub fn page_summary(page: &ClientPage) -> String {
    let rows = if page.employees.is_empty() {
        "no rows".to_string()
    } else {
        let first = page.page.saturating_mul(page.page_size);
        format!(
            "rows {}-{} of {}",
            first,
            first.saturating_add(page.employees.len() - 1),
            page.total_count
        )
    };
    format!(
        "page {}/{}  {}  server pages {}",
        page.page.saturating_add(1),
        page.last_page + 1,
        rows,
        page.server_pages.iter().join(",")
    )
}

pub fn render_page(page: &ClientPage, format: OutputFormat) -> Vec<u8> {
    match format {
        OutputFormat::Text => {
            let mut out = render_table(&page.employees);
            out.push_str(&format!(":: {}\n", page_summary(page).dimmed()));
            out.into_bytes()
        }
        OutputFormat::Json => {
            let mut out = serde_json::to_vec_pretty(page).unwrap_or_else(|_| b"{}".to_vec());
            out.push(b'\n');
            out
        }
    }
}

pub fn render_record(record: &EmployeeRecord, format: OutputFormat) -> Vec<u8> {
    match format {
        OutputFormat::Text => render_table(std::slice::from_ref(record)).into_bytes(),
        OutputFormat::Json => {
            let mut out = serde_json::to_vec_pretty(record).unwrap_or_else(|_| b"{}".to_vec());
            out.push(b'\n');
            out
        }
    }
}
