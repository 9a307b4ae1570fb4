use chrono::{DateTime, Utc};
use chrono_humanize::Humanize;
use comfy_table::{Attribute, Cell, Color, Row, Table};
use ding_core::models::{Priority, RepeatRule, Task};

pub fn display_tasks(tasks: &[Task], now: DateTime<Utc>) {
    if tasks.is_empty() {
        println!("No reminders found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Due", "Repeat", "Tags"]);

    for task in tasks {
        let mut row = Row::new();
        row.add_cell(Cell::new(&task.id.to_string()[..7]));

        let mut display_title = String::new();
        if !task.repeat.is_none() {
            display_title.push('↻');
            display_title.push(' ');
        }
        display_title.push_str(&task.title);

        let mut title_cell = Cell::new(display_title);
        if task.done || task.archived {
            title_cell = title_cell
                .add_attribute(Attribute::CrossedOut)
                .fg(Color::DarkGrey);
        } else {
            title_cell = match task.priority {
                Priority::High => title_cell.fg(Color::Red).add_attribute(Attribute::Bold),
                Priority::Normal => title_cell,
                Priority::Low => title_cell.fg(Color::Green),
            };
        }
        row.add_cell(title_cell);

        let due_text = task.due_at.humanize();
        let due_cell = if task.is_overdue(now) {
            Cell::new(format!("{due_text} (overdue)")).fg(Color::Red)
        } else if task.done {
            Cell::new(due_text).fg(Color::DarkGrey)
        } else if task.due_at.date_naive() == now.date_naive() {
            Cell::new(due_text).fg(Color::Yellow)
        } else {
            Cell::new(due_text)
        };
        row.add_cell(due_cell);

        row.add_cell(Cell::new(describe_repeat(&task.repeat)));
        row.add_cell(Cell::new(task.tags.join(", ")));
        table.add_row(row);
    }

    println!("{table}");
}

fn describe_repeat(rule: &RepeatRule) -> String {
    const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
    match rule {
        RepeatRule::None => "-".to_string(),
        RepeatRule::Daily { interval } => match interval {
            0 | 1 => "daily".to_string(),
            n => format!("every {n} days"),
        },
        RepeatRule::Weekly {
            interval,
            by_weekday,
        } => {
            let days: Vec<&str> = by_weekday
                .iter()
                .filter(|d| **d <= 6)
                .map(|d| DAY_NAMES[usize::from(*d)])
                .collect();
            let days = if days.is_empty() {
                String::new()
            } else {
                format!(" on {}", days.join(","))
            };
            match interval {
                0 | 1 => format!("weekly{days}"),
                n => format!("every {n} weeks{days}"),
            }
        }
        RepeatRule::Monthly { interval, by_day } => {
            let day = by_day.map(|d| format!(" on day {d}")).unwrap_or_default();
            match interval {
                0 | 1 => format!("monthly{day}"),
                n => format!("every {n} months{day}"),
            }
        }
    }
}
