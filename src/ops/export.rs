use std::fmt::Write;

use crate::model::{Checklist, Task};

const CSV_HEADER: &str = "Task,Section,Status,Notes,Required,Photo Required";
const NO_SECTION: &str = "No Section";

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

fn csv_row(out: &mut String, task: &Task, section: &str) {
    let status = if task.completed() { "Completed" } else { "Incomplete" };
    let fields = [
        csv_field(&task.text),
        csv_field(section),
        csv_field(status),
        csv_field(&task.notes),
        csv_field(yes_no(task.required)),
        csv_field(yes_no(task.photo_required)),
    ];
    out.push_str(&fields.join(","));
    out.push('\n');
}

/// One row per task: sectionless tasks first, then each section in order.
pub fn to_csv(checklist: &Checklist) -> String {
    let mut out = String::new();
    out.push_str(CSV_HEADER);
    out.push('\n');
    for task in &checklist.sectionless_tasks {
        csv_row(&mut out, task, NO_SECTION);
    }
    for section in &checklist.sections {
        for task in &section.tasks {
            csv_row(&mut out, task, &section.name);
        }
    }
    out
}

/// `Punch  List` → `Punch_List_checklist.csv`
pub fn export_file_name(checklist: &Checklist) -> String {
    let mut name = String::with_capacity(checklist.name.len());
    let mut in_space = false;
    for c in checklist.name.chars() {
        if !c.is_whitespace() {
            name.push(c);
        } else if !in_space {
            name.push('_');
        }
        in_space = c.is_whitespace();
    }
    format!("{name}_checklist.csv")
}

// ---------------------------------------------------------------------------
// Printable HTML
// ---------------------------------------------------------------------------

/// Progress bar colour tier
pub fn progress_tier(percentage: u8) -> &'static str {
    if percentage < 30 {
        "progress-red"
    } else if percentage < 70 {
        "progress-yellow"
    } else {
        "progress-green"
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const PRINT_STYLE: &str = "\
body { font-family: Arial, sans-serif; margin: 30px; }
h1 { color: #333; }
.checklist-header { margin-bottom: 20px; }
.section { margin-top: 20px; border-top: 1px solid #eee; padding-top: 10px; }
.section-header { font-weight: bold; margin-bottom: 10px; }
.task { margin-bottom: 8px; display: flex; align-items: flex-start; }
.task-status { margin-right: 10px; }
.completed { text-decoration: line-through; color: #888; }
.notes { color: #6b7280; font-size: 0.875em; }
.photo-status { color: #3b82f6; font-size: 0.75em; }
.required { color: red; }
.project-info { color: #666; margin-bottom: 20px; }
.progress { margin: 10px 0; background-color: #f3f4f6; border-radius: 9999px; height: 10px; }
.progress-bar { height: 10px; border-radius: 9999px; }
.progress-red { background-color: #ef4444; }
.progress-yellow { background-color: #f59e0b; }
.progress-green { background-color: #10b981; }
@media print { body { margin: 0.5cm; } .no-print { display: none; } }
";

fn progress_bar(out: &mut String, percentage: u8) {
    let _ = writeln!(
        out,
        "<div class=\"progress\"><div class=\"progress-bar {}\" style=\"width: {}%\"></div></div>",
        progress_tier(percentage),
        percentage
    );
}

fn task_html(out: &mut String, task: &Task) {
    let done = task.completed();
    out.push_str("<div class=\"task\">\n");
    let _ = writeln!(out, "<div class=\"task-status\">{}</div>", if done { "☑" } else { "☐" });
    let _ = writeln!(out, "<div class=\"{}\">", if done { "completed" } else { "" });
    let required = if task.required { " <span class=\"required\">*</span>" } else { "" };
    let _ = writeln!(out, "<div>{}{}</div>", escape_html(&task.text), required);
    if !task.notes.is_empty() {
        let _ = writeln!(out, "<div class=\"notes\">{}</div>", escape_html(&task.notes));
    }
    if task.photo_required {
        let status = if task.has_photos() { "Photos attached" } else { "Photo required" };
        let _ = writeln!(out, "<div class=\"photo-status\">{status}</div>");
    }
    out.push_str("</div>\n</div>\n");
}

/// A standalone printable page for one checklist
pub fn to_printable_html(checklist: &Checklist, project_name: &str) -> String {
    let name = escape_html(&checklist.name);
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<title>{name} - Checklist</title>");
    let _ = writeln!(out, "<style>\n{PRINT_STYLE}</style>");
    out.push_str("</head>\n<body>\n<div class=\"checklist-header\">\n");
    let _ = writeln!(out, "<h1>{name}</h1>");
    let _ = writeln!(out, "<div class=\"project-info\">Project: {}</div>", escape_html(project_name));
    let _ = writeln!(out, "<div>Completion: {}%</div>", checklist.completion_percentage);
    progress_bar(&mut out, checklist.completion_percentage);
    out.push_str("</div>\n");

    if !checklist.sectionless_tasks.is_empty() {
        out.push_str("<div>\n");
        for task in &checklist.sectionless_tasks {
            task_html(&mut out, task);
        }
        out.push_str("</div>\n");
    }

    for section in &checklist.sections {
        out.push_str("<div class=\"section\">\n");
        let _ = writeln!(
            out,
            "<div class=\"section-header\">{} ({}%)</div>",
            escape_html(&section.name),
            section.completion_percentage
        );
        progress_bar(&mut out, section.completion_percentage);
        for task in &section.tasks {
            task_html(&mut out, task);
        }
        out.push_str("</div>\n");
    }

    out.push_str("<div class=\"no-print\" style=\"margin-top: 30px; text-align: center;\">\n");
    out.push_str("<button onclick=\"window.print();\">Print Checklist</button>\n</div>\n");
    out.push_str("</body>\n</html>\n");
    out
}
