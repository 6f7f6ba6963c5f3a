use polars::prelude::{AnyValue, DataFrame};
use std::collections::BTreeSet;
use std::env;
use std::io::{self, Write};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use work_planner::{FieldValue, Plan, PlanConfig, PlanError, Task, TaskField};

fn cell_text(av: &AnyValue<'_>) -> String {
    match av {
        AnyValue::Null => String::new(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::Boolean(true) => "yes".to_string(),
        AnyValue::Boolean(false) => String::new(),
        _ => av.to_string(),
    }
}

fn render_df_as_text_table(df: &DataFrame) -> String {
    let columns = df.get_columns();
    let col_names: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();

    let cells: Vec<Vec<String>> = (0..df.height())
        .map(|row_idx| {
            columns
                .iter()
                .map(|col| col.get(row_idx).map(|av| cell_text(&av)).unwrap_or_default())
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = col_names.iter().map(|n| n.chars().count()).collect();
    for row in &cells {
        for (ci, cell) in row.iter().enumerate() {
            widths[ci] = widths[ci].max(cell.chars().count());
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let line = |values: &[String]| {
        let mut out = String::from("|");
        for (ci, value) in values.iter().enumerate() {
            let pad = widths[ci].saturating_sub(value.chars().count());
            out.push(' ');
            out.push_str(value);
            out.push_str(&" ".repeat(pad));
            out.push_str(" |");
        }
        out
    };

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&line(&col_names));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for row in &cells {
        out.push_str(&line(row));
        out.push('\n');
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

fn show(plan: &Plan) {
    match plan.to_dataframe() {
        Ok(df) => println!("{}", render_df_as_text_table(&df)),
        Err(e) => println!("Error: {}", e),
    }
}

fn print_help() {
    println!(
        "Commands:\n  help                               Show this help\n  show                               Show the task table\n  add <title...>                     Append a task\n  blank                              Append a blank row\n  set <row> <field> <value...>       Edit a task field (title, duration, start, end, work,\n                                     predecessors, resources, type, priority, deadline, comment)\n  clear <row> <field>                Clear a task field\n  resource <initials>                Add a resource\n  indent <rows_csv>                  Indent rows (e.g. 2,3)\n  outdent <rows_csv>                 Outdent rows\n  schedule                           Reschedule every task\n  load <path>                        Replace the plan with a JSON definition\n  csv <path>                         Write the task table as CSV\n  efforts <path>                     Write the effort ledger as CSV\n  quit|exit                          Exit"
    );
}

fn parse_field(name: &str) -> Option<TaskField> {
    let field = match name.to_ascii_lowercase().as_str() {
        "title" => TaskField::Title,
        "duration" => TaskField::Duration,
        "start" => TaskField::Start,
        "end" => TaskField::End,
        "work" => TaskField::Work,
        "predecessors" | "preds" => TaskField::Predecessors,
        "resources" | "res" => TaskField::Resources,
        "type" => TaskField::Type,
        "priority" => TaskField::Priority,
        "deadline" => TaskField::Deadline,
        "comment" => TaskField::Comment,
        _ => return None,
    };
    Some(field)
}

fn parse_rows(s: &str) -> BTreeSet<usize> {
    s.split(',')
        .filter_map(|p| p.trim().parse::<usize>().ok())
        .collect()
}

/// Validate first, then commit, so a rejected edit leaves the plan untouched.
fn edit(plan: &mut Plan, row: usize, field: TaskField, value: FieldValue) {
    let result = plan
        .set_task_value(row, field, value.clone(), false)
        .and_then(|()| plan.set_task_value(row, field, value, true));
    match result {
        Ok(()) => println!("Task {} updated.", row),
        Err(e) => println!("Error: {}", e),
    }
}

fn schedule(plan: &mut Plan) {
    match plan.schedule() {
        Ok(report) => {
            println!(
                "Scheduled {} tasks ({} efforts, {} leveled)",
                report.scheduled,
                report.efforts,
                report.leveled.len()
            );
            for failure in &report.failures {
                println!("Failed: {}", failure);
            }
            for row in plan.late_tasks() {
                println!("Late: task {}", row);
            }
            show(plan);
        }
        Err(e) => println!("Schedule error: {}", e),
    }
}

fn load(path: &str) -> Result<Plan, PlanError> {
    PlanConfig::from_json_file(path)?.to_plan()
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let started = match env::args().nth(1) {
        Some(path) => load(&path).inspect(|_| info!(path = %path, "plan loaded")),
        None => Plan::initialise(),
    };
    let mut plan = match started {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!("Work Planner (CLI) - type 'help' for commands\n");
    show(&plan);

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let (cmd, rest) = input.split_once(' ').unwrap_or((input, ""));
        let rest = rest.trim();

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "show" => show(&plan),
            "add" => {
                if rest.is_empty() {
                    println!("Usage: add <title...>");
                    continue;
                }
                let row = plan.add_task(Task::new(rest));
                println!("Added task {}.", row);
            }
            "blank" => {
                let row = plan.add_task(Task::blank());
                println!("Added blank row {}.", row);
            }
            "set" | "clear" => {
                let mut parts = rest.splitn(3, ' ');
                let row_s = parts.next().unwrap_or("");
                let field_s = parts.next().unwrap_or("");
                let value_s = parts.next().unwrap_or("").trim();
                let row: usize = match row_s.parse() {
                    Ok(v) => v,
                    Err(_) => {
                        println!("Invalid row");
                        continue;
                    }
                };
                let Some(field) = parse_field(field_s) else {
                    println!("Unknown field '{}'", field_s);
                    continue;
                };
                let value = if cmd == "clear" {
                    FieldValue::Empty
                } else if value_s.is_empty() {
                    println!("Usage: set <row> <field> <value...>");
                    continue;
                } else {
                    FieldValue::from(value_s)
                };
                edit(&mut plan, row, field, value);
            }
            "resource" => {
                if rest.is_empty() {
                    println!("Usage: resource <initials>");
                    continue;
                }
                match plan.add_resource_named(rest) {
                    Ok(id) => println!("Added resource {} ({}).", id.0, rest),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "indent" | "outdent" => {
                let rows = parse_rows(rest);
                let moved = if cmd == "indent" {
                    plan.indent_tasks(&rows)
                } else {
                    plan.outdent_tasks(&rows)
                };
                if moved.is_empty() {
                    println!("Nothing to {}.", cmd);
                } else {
                    let list: Vec<String> = moved.iter().map(|r| r.to_string()).collect();
                    println!("Moved rows {}.", list.join(","));
                }
            }
            "schedule" => schedule(&mut plan),
            "load" => match load(rest) {
                Ok(loaded) => {
                    plan = loaded;
                    println!("Plan loaded from {}", rest);
                    show(&plan);
                }
                Err(e) => {
                    warn!(path = %rest, error = %e, "load failed");
                    println!("Error: {}", e);
                }
            },
            "csv" => match plan.write_tasks_csv(rest) {
                Ok(()) => println!("Tasks written to {}", rest),
                Err(e) => println!("Error: {}", e),
            },
            "efforts" => match plan.write_efforts_csv(rest) {
                Ok(()) => println!("Efforts written to {}", rest),
                Err(e) => println!("Error: {}", e),
            },
            _ => println!("Unknown command. Type 'help'."),
        }
    }
}
