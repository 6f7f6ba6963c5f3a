use crate::error::PlanResult;
use crate::plan::Plan;
use crate::task::Task;
use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::debug;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// One task row as exported to CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub row: usize,
    pub title: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub duration: String,
    pub start: String,
    pub end: String,
    pub work: String,
    pub predecessors: String,
    pub resources: String,
    pub priority: u32,
    pub deadline: String,
    pub indent: i32,
    pub summary: bool,
    pub late: bool,
}

impl TaskRecord {
    fn from_task(row: usize, task: &Task) -> Self {
        Self {
            row,
            title: task.title.clone().unwrap_or_default(),
            task_type: task.task_type.label().to_string(),
            duration: task.duration.to_string(),
            start: format_datetime(task.start),
            end: format_datetime(task.end),
            work: task.work.map(|w| w.to_string()).unwrap_or_default(),
            predecessors: task.predecessors.to_string(),
            resources: task.resources.to_string(),
            priority: task.priority,
            deadline: format_datetime(task.deadline),
            indent: task.indent,
            summary: task.is_summary(),
            late: task.is_late(),
        }
    }
}

/// One effort from the ledger as exported to CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffortRecord {
    pub task: usize,
    pub resource: String,
    pub quantity: f64,
    pub start: String,
    pub end: String,
}

fn format_datetime(dt: Option<NaiveDateTime>) -> String {
    dt.map(|dt| dt.format(DATETIME_FORMAT).to_string())
        .unwrap_or_default()
}

fn datetime_series(name: &'static str, values: Vec<Option<i64>>) -> PolarsResult<Series> {
    Series::new(PlSmallStr::from_static(name), values)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
}

fn millis(dt: Option<NaiveDateTime>) -> Option<i64> {
    dt.map(|dt| dt.and_utc().timestamp_millis())
}

impl Plan {
    /// Non-blank task rows, project row excluded.
    pub fn task_records(&self) -> Vec<TaskRecord> {
        self.tasks()
            .not_blank()
            .map(|(row, task)| TaskRecord::from_task(row, task))
            .collect()
    }

    pub fn effort_records(&self) -> Vec<EffortRecord> {
        self.work()
            .efforts()
            .iter()
            .map(|effort| EffortRecord {
                task: effort.task,
                resource: self
                    .resources()
                    .get(effort.resource)
                    .ok()
                    .and_then(|res| res.initials.clone())
                    .unwrap_or_else(|| format!("#{}", effort.resource.0)),
                quantity: effort.quantity,
                start: format_datetime(Some(effort.start)),
                end: format_datetime(Some(effort.end)),
            })
            .collect()
    }

    /// Task table with typed columns; start, end and deadline are millisecond datetimes.
    pub fn to_dataframe(&self) -> PlanResult<DataFrame> {
        let rows: Vec<(usize, &Task)> = self.tasks().not_blank().collect();

        let ids: Vec<u32> = rows.iter().map(|(row, _)| *row as u32).collect();
        let titles: Vec<&str> = rows
            .iter()
            .map(|(_, task)| task.title.as_deref().unwrap_or(""))
            .collect();
        let types: Vec<&str> = rows.iter().map(|(_, task)| task.task_type.label()).collect();
        let durations: Vec<String> = rows.iter().map(|(_, task)| task.duration.to_string()).collect();
        let works: Vec<Option<String>> = rows
            .iter()
            .map(|(_, task)| task.work.map(|w| w.to_string()))
            .collect();
        let priorities: Vec<u32> = rows.iter().map(|(_, task)| task.priority).collect();
        let indents: Vec<i32> = rows.iter().map(|(_, task)| task.indent).collect();
        let summaries: Vec<bool> = rows.iter().map(|(_, task)| task.is_summary()).collect();
        let late: Vec<bool> = rows.iter().map(|(_, task)| task.is_late()).collect();

        let columns: Vec<Column> = vec![
            Series::new(PlSmallStr::from_static("row"), ids).into_column(),
            Series::new(PlSmallStr::from_static("title"), titles).into_column(),
            Series::new(PlSmallStr::from_static("type"), types).into_column(),
            Series::new(PlSmallStr::from_static("duration"), durations).into_column(),
            datetime_series("start", rows.iter().map(|(_, t)| millis(t.start)).collect())?.into_column(),
            datetime_series("end", rows.iter().map(|(_, t)| millis(t.end)).collect())?.into_column(),
            Series::new(PlSmallStr::from_static("work"), works).into_column(),
            Series::new(PlSmallStr::from_static("priority"), priorities).into_column(),
            Series::new(PlSmallStr::from_static("indent"), indents).into_column(),
            Series::new(PlSmallStr::from_static("summary"), summaries).into_column(),
            datetime_series("deadline", rows.iter().map(|(_, t)| millis(t.deadline)).collect())?
                .into_column(),
            Series::new(PlSmallStr::from_static("late"), late).into_column(),
        ];
        Ok(DataFrame::new(columns)?)
    }

    pub fn write_tasks_csv<P: AsRef<Path>>(&self, path: P) -> PlanResult<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);
        let records = self.task_records();
        for record in &records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        debug!(rows = records.len(), "task table written");
        Ok(())
    }

    pub fn write_efforts_csv<P: AsRef<Path>>(&self, path: P) -> PlanResult<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);
        let records = self.effort_records();
        for record in &records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        debug!(efforts = records.len(), "effort ledger written");
        Ok(())
    }
}
