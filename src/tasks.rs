use crate::error::{PlanError, PlanResult};
use crate::task::{Predecessors, Task};
use std::collections::{BTreeMap, BTreeSet};

/// Ordered task rows. Row 0 is the project summary and always spans every row.
#[derive(Debug, Clone)]
pub struct Tasks {
    tasks: Vec<Task>,
}

impl Default for Tasks {
    fn default() -> Self {
        Self::new()
    }
}

impl Tasks {
    pub const PROJECT_TITLE: &'static str = "PROJECT";

    pub fn new() -> Self {
        let mut project = Task::new(Self::PROJECT_TITLE);
        project.indent = -1;
        let mut tasks = Self {
            tasks: vec![project],
        };
        tasks.update_summary_markers();
        tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when there are no rows besides the project row.
    pub fn is_empty(&self) -> bool {
        self.tasks.len() <= 1
    }

    pub fn get(&self, row: usize) -> PlanResult<&Task> {
        self.tasks
            .get(row)
            .ok_or_else(|| PlanError::not_found("task", row.to_string()))
    }

    pub(crate) fn get_mut(&mut self, row: usize) -> PlanResult<&mut Task> {
        self.tasks
            .get_mut(row)
            .ok_or_else(|| PlanError::not_found("task", row.to_string()))
    }

    pub(crate) fn replace(&mut self, row: usize, task: Task) -> PlanResult<()> {
        *self.get_mut(row)? = task;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Task)> {
        self.tasks.iter().enumerate()
    }

    /// Rows holding a real (non-blank) task, excluding the project row.
    pub fn not_blank(&self) -> impl Iterator<Item = (usize, &Task)> {
        self.iter().skip(1).filter(|(_, task)| !task.is_blank())
    }

    pub fn not_blank_count(&self) -> usize {
        self.not_blank().count()
    }

    pub fn is_valid_reference(&self, row: usize) -> bool {
        row >= 1 && self.tasks.get(row).is_some_and(|task| !task.is_blank())
    }

    /// Append a task and return its row.
    pub fn push(&mut self, task: Task) -> usize {
        self.tasks.push(task);
        self.update_summary_markers();
        self.tasks.len() - 1
    }

    /// Insert a task before `row`, shifting later rows and the ids that name them.
    pub fn insert(&mut self, row: usize, task: Task) -> PlanResult<()> {
        if row == 0 || row > self.tasks.len() {
            return Err(PlanError::not_found("task", row.to_string()));
        }
        for existing in &mut self.tasks {
            existing.predecessors.row_inserted(row);
        }
        self.tasks.insert(row, task);
        self.update_summary_markers();
        Ok(())
    }

    /// Remove `row`, dropping predecessor references to it and shifting later ids.
    pub fn remove(&mut self, row: usize) -> PlanResult<Task> {
        if row == 0 || row >= self.tasks.len() {
            return Err(PlanError::not_found("task", row.to_string()));
        }
        let removed = self.tasks.remove(row);
        for existing in &mut self.tasks {
            existing.predecessors.row_removed(row);
        }
        self.update_summary_markers();
        Ok(removed)
    }

    /// Subset of `rows` that can be indented.
    pub fn can_indent(&self, rows: &BTreeSet<usize>) -> BTreeSet<usize> {
        rows.iter()
            .copied()
            .filter(|&row| {
                let Some(task) = self.movable(row) else {
                    return false;
                };
                let above = (0..row)
                    .rev()
                    .map(|r| &self.tasks[r])
                    .find(|other| !other.is_blank());
                above.is_some_and(|other| task.indent <= other.indent)
            })
            .collect()
    }

    /// Subset of `rows` that can be outdented.
    pub fn can_outdent(&self, rows: &BTreeSet<usize>) -> BTreeSet<usize> {
        rows.iter()
            .copied()
            .filter(|&row| self.movable(row).is_some_and(|task| task.indent > 0))
            .collect()
    }

    /// Indent every legal row in `rows` together with its summary subtree.
    /// Returns the rows actually indented.
    pub fn indent(&mut self, rows: &BTreeSet<usize>) -> BTreeSet<usize> {
        let legal = self.can_indent(rows);
        self.shift_subtrees(&legal, 1);
        legal
    }

    /// Outdent every legal row in `rows` together with its summary subtree.
    pub fn outdent(&mut self, rows: &BTreeSet<usize>) -> BTreeSet<usize> {
        let legal = self.can_outdent(rows);
        self.shift_subtrees(&legal, -1);
        legal
    }

    /// Recompute summary start/end markers for every non-blank row.
    pub fn update_summary_markers(&mut self) {
        for row in 0..self.tasks.len() {
            if self.tasks[row].is_blank() {
                self.tasks[row].summary_end = None;
                continue;
            }
            let indent = self.tasks[row].indent;

            let mut end = None;
            for check in row + 1..self.tasks.len() {
                let other = &self.tasks[check];
                if other.is_blank() {
                    continue;
                }
                if other.indent <= indent {
                    break;
                }
                end = Some(check);
            }

            let start = (0..row)
                .rev()
                .find(|&r| !self.tasks[r].is_blank() && self.tasks[r].indent < indent);

            let task = &mut self.tasks[row];
            task.summary_end = end;
            if let Some(start) = start {
                task.summary_start = start;
            }
        }

        let last = self.tasks.len().saturating_sub(1);
        if let Some(project) = self.tasks.first_mut() {
            project.summary_end = Some(last);
        }
    }

    /// Leaf rows inside a summary's span, or just `row` for a leaf.
    pub fn leaves_of(&self, row: usize) -> Vec<usize> {
        let Some(task) = self.tasks.get(row) else {
            return Vec::new();
        };
        match task.summary_end {
            Some(end) => (row + 1..=end.min(self.tasks.len().saturating_sub(1)))
                .filter(|&r| {
                    let other = &self.tasks[r];
                    !other.is_blank() && !other.is_summary()
                })
                .collect(),
            None if !task.is_blank() => vec![row],
            None => Vec::new(),
        }
    }

    /// Summary rows enclosing `row`, nearest first, excluding the project row.
    pub fn summaries_of(&self, row: usize) -> Vec<usize> {
        let mut found = Vec::new();
        let mut current = row;
        while let Some(task) = self.tasks.get(current) {
            let parent = task.summary_start;
            if parent == 0 || parent >= current {
                break;
            }
            found.push(parent);
            current = parent;
        }
        found
    }

    /// Strip predecessor references to self, blank, or missing rows.
    /// Returns the previous text of every task that changed.
    pub fn clean_predecessors(&mut self) -> BTreeMap<usize, String> {
        let valid: Vec<bool> = (0..self.tasks.len())
            .map(|row| self.is_valid_reference(row))
            .collect();
        let mut changed = BTreeMap::new();
        for (row, task) in self.tasks.iter_mut().enumerate().skip(1) {
            if task.is_blank() {
                continue;
            }
            let before = task.predecessors.to_string();
            task.predecessors
                .clean(row, |id| valid.get(id).copied().unwrap_or(false));
            if task.predecessors.to_string() != before {
                changed.insert(row, before);
            }
        }
        changed
    }

    /// Put back predecessor text previously returned by [`Tasks::clean_predecessors`].
    pub fn restore_predecessors(&mut self, previous: &BTreeMap<usize, String>) -> PlanResult<()> {
        for (row, text) in previous {
            let preds = Predecessors::parse(text)?;
            self.get_mut(*row)?.predecessors = preds;
        }
        Ok(())
    }

    fn movable(&self, row: usize) -> Option<&Task> {
        if row <= 1 {
            return None;
        }
        self.tasks.get(row).filter(|task| !task.is_blank())
    }

    fn shift_subtrees(&mut self, rows: &BTreeSet<usize>, delta: i32) {
        let mut covered_to = 0;
        for &row in rows {
            if row <= covered_to {
                continue;
            }
            let end = self.tasks[row].summary_end.unwrap_or(row);
            for task in &mut self.tasks[row..=end] {
                if !task.is_blank() {
                    task.indent += delta;
                }
            }
            covered_to = end;
        }
        self.update_summary_markers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_of(indents: &[i32]) -> Tasks {
        let mut tasks = Tasks::new();
        for (idx, indent) in indents.iter().enumerate() {
            let mut task = Task::new(format!("T{}", idx + 1));
            task.indent = *indent;
            tasks.push(task);
        }
        tasks
    }

    fn rows(items: &[usize]) -> BTreeSet<usize> {
        items.iter().copied().collect()
    }

    #[test]
    fn project_row_spans_everything() {
        let tasks = plan_of(&[0, 0, 0]);
        assert_eq!(tasks.get(0).unwrap().summary_end, Some(3));
        assert_eq!(tasks.get(0).unwrap().indent, -1);
    }

    #[test]
    fn summary_markers_follow_indent() {
        let tasks = plan_of(&[0, 1, 1, 0]);
        assert_eq!(tasks.get(1).unwrap().summary_end, Some(3));
        assert_eq!(tasks.get(2).unwrap().summary_start, 1);
        assert!(!tasks.get(4).unwrap().is_summary());
        assert_eq!(tasks.leaves_of(1), vec![2, 3]);
        assert_eq!(tasks.summaries_of(3), vec![1]);
    }

    #[test]
    fn rows_zero_and_one_never_move() {
        let tasks = plan_of(&[1, 1, 1]);
        let indentable = tasks.can_indent(&rows(&[0, 1, 2]));
        assert_eq!(indentable, rows(&[2]));
        assert!(!tasks.can_outdent(&rows(&[0, 1, 2, 3])).contains(&1));
        assert!(!tasks.can_outdent(&rows(&[0, 1, 2, 3])).contains(&0));
    }

    #[test]
    fn indent_moves_summary_subtree_and_rejects_illegal_rows() {
        let mut tasks = plan_of(&[0, 0, 1, 0]);
        // row 3 is already deeper than row 2
        assert!(tasks.indent(&rows(&[3])).is_empty());
        assert_eq!(tasks.get(3).unwrap().indent, 1);

        assert_eq!(tasks.indent(&rows(&[2])), rows(&[2]));
        assert_eq!(tasks.get(2).unwrap().indent, 1);
        assert_eq!(tasks.get(3).unwrap().indent, 2);
        assert_eq!(tasks.get(1).unwrap().summary_end, Some(3));

        assert_eq!(tasks.outdent(&rows(&[2])), rows(&[2]));
        assert_eq!(tasks.get(3).unwrap().indent, 1);
    }

    #[test]
    fn blank_rows_are_skipped_by_markers() {
        let mut tasks = plan_of(&[0, 1]);
        tasks.insert(2, Task::blank()).unwrap();
        assert_eq!(tasks.get(1).unwrap().summary_end, Some(3));
        assert_eq!(tasks.get(2).unwrap().summary_end, None);
    }

    #[test]
    fn insert_and_remove_renumber_predecessors() {
        let mut tasks = plan_of(&[0, 0, 0]);
        tasks.get_mut(3).unwrap().predecessors = Predecessors::parse("1, 2").unwrap();
        tasks.insert(2, Task::new("New")).unwrap();
        assert_eq!(tasks.get(4).unwrap().predecessors.to_string(), "1, 3");
        tasks.remove(1).unwrap();
        assert_eq!(tasks.get(3).unwrap().predecessors.to_string(), "2");
        assert!(tasks.remove(0).is_err());
    }

    #[test]
    fn clean_predecessors_reports_previous_text() {
        let mut tasks = plan_of(&[0, 0]);
        tasks.push(Task::blank());
        tasks.get_mut(2).unwrap().predecessors = Predecessors::parse("1, 2, 3, 9").unwrap();
        let changed = tasks.clean_predecessors();
        assert_eq!(changed.get(&2).map(String::as_str), Some("1, 2, 3, 9"));
        assert_eq!(tasks.get(2).unwrap().predecessors.to_string(), "1");

        tasks.restore_predecessors(&changed).unwrap();
        assert_eq!(tasks.get(2).unwrap().predecessors.to_string(), "1, 2, 3, 9");
    }
}
