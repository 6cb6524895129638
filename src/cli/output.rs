//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use std::sync::Mutex;

use comfy_table::{ContentArrangement, Table};
use console::{style, Term};

use crate::bulk::AuditFinding;
use crate::item::{Item, Metadata};
use crate::progress::ProgressObserver;
use crate::util::lock;

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print a table of item metadata (Name, Type, Created, Modified).
pub fn print_items_table(items: &[Metadata]) {
    if items.is_empty() {
        info("No matching items.");
        tip("Run `pawkv set <NAME>` to add an item.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Name", "Type", "Created", "Modified"]);

    for m in items {
        table.add_row(vec![
            m.name.clone(),
            m.item_type.to_string(),
            m.created.format("%Y-%m-%d %H:%M:%S").to_string(),
            m.modified.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }

    println!("{table}");
}

/// Print one item field by field, secret value last.
pub fn print_item(item: &Item) {
    let meta = item.metadata();
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec!["Name".to_string(), meta.name.clone()]);
    table.add_row(vec!["Type".to_string(), meta.item_type.to_string()]);

    let fields = item.content_fields();
    if !fields.username.is_empty() {
        table.add_row(vec!["Username".to_string(), fields.username]);
    }
    if !fields.url.is_empty() {
        table.add_row(vec!["URL".to_string(), fields.url]);
    }
    if !fields.note.is_empty() {
        table.add_row(vec!["Note".to_string(), fields.note]);
    }
    if let Some(icon) = &meta.favicon {
        table.add_row(vec![
            "Icon".to_string(),
            format!("{} ({} bytes)", icon.host, icon.data.len()),
        ]);
    }
    table.add_row(vec![
        "Modified".to_string(),
        meta.modified.format("%Y-%m-%d %H:%M:%S").to_string(),
    ]);
    let label = match item {
        Item::Note(_) => "Body",
        _ => "Password",
    };
    table.add_row(vec![label.to_string(), item.secret_value().to_string()]);

    println!("{table}");
}

/// Print breached items, most exposed first.
pub fn print_findings_table(findings: &[AuditFinding]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Name", "Type", "Seen in breaches"]);

    for f in findings {
        table.add_row(vec![
            f.name().to_string(),
            f.item.item_type().to_string(),
            f.count.to_string(),
        ]);
    }

    println!("{table}");
}

/// Live `label done/total` line on stderr.
pub struct TermProgress {
    label: String,
    term: Term,
    shown: Mutex<usize>,
}

impl TermProgress {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            term: Term::stderr(),
            shown: Mutex::new(0),
        }
    }
}

impl ProgressObserver for TermProgress {
    fn on_progress(&self, completed: usize, total: usize) {
        let mut shown = lock(&self.shown);
        // Updates can arrive out of order; never move the line backwards.
        if completed <= *shown {
            return;
        }
        *shown = completed;

        let line = format!("{} {completed}/{total}", style(&self.label).dim());
        if self.term.is_term() {
            let _ = self.term.clear_line();
            let _ = self.term.write_str(&line);
            if completed == total {
                let _ = self.term.write_line("");
            }
        } else if completed == total {
            let _ = self.term.write_line(&line);
        }
    }
}
