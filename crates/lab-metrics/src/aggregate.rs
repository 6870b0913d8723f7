use crate::record::TrialRecord;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub count: usize,
    pub pass_at_1: f64,
    pub ca_mean: f64,
    pub pr_mean: f64,
    pub srs_mean: f64,
}

pub fn summarise<'a, I>(records: I) -> SummaryStatistics
where
    I: IntoIterator<Item = &'a TrialRecord>,
{
    let mut count = 0usize;
    let mut resolved = 0usize;
    let (mut ca, mut pr, mut srs) = (0.0, 0.0, 0.0);
    for record in records {
        count += 1;
        if record.resolved {
            resolved += 1;
        }
        ca += record.constraint_adherence;
        pr += record.process_redundancy;
        srs += record.selective_reasoning_failure_rate;
    }
    if count == 0 {
        return SummaryStatistics::default();
    }
    let n = count as f64;
    SummaryStatistics {
        count,
        pass_at_1: resolved as f64 / n,
        ca_mean: ca / n,
        pr_mean: pr / n,
        srs_mean: srs / n,
    }
}

#[derive(Debug, Clone)]
pub struct TaskGroup<'a> {
    pub task_id: &'a str,
    pub records: Vec<&'a TrialRecord>,
}

/// Partitions by `task_id`, groups ordered by first appearance.
pub fn group_by_task(records: &[TrialRecord]) -> Vec<TaskGroup<'_>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<TaskGroup<'_>> = Vec::new();
    for record in records {
        let slot = *index.entry(record.task_id.as_str()).or_insert_with(|| {
            groups.push(TaskGroup {
                task_id: record.task_id.as_str(),
                records: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].records.push(record);
    }
    groups
}

/// Per-task statistics in first-seen task order. Serializes as a JSON object
/// whose key order is that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskSummaries(pub Vec<(String, SummaryStatistics)>);

impl TaskSummaries {
    pub fn get(&self, task_id: &str) -> Option<&SummaryStatistics> {
        self.0.iter().find(|(id, _)| id == task_id).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SummaryStatistics)> {
        self.0.iter().map(|(id, s)| (id.as_str(), s))
    }
}

impl Serialize for TaskSummaries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (task_id, stats) in &self.0 {
            map.serialize_entry(task_id, stats)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TaskSummaries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = TaskSummaries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of task id to summary statistics")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((task_id, stats)) =
                    access.next_entry::<String, SummaryStatistics>()?
                {
                    out.push((task_id, stats));
                }
                Ok(TaskSummaries(out))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub overall: SummaryStatistics,
    pub per_task: TaskSummaries,
}

impl Aggregation {
    /// Filters by `task_filter` first, then summarises overall and per task.
    /// Excluded records touch no statistic.
    pub fn compute(records: &[TrialRecord], task_filter: Option<&str>) -> Self {
        let kept: Vec<TrialRecord> = match task_filter {
            Some(task_id) => records
                .iter()
                .filter(|r| r.task_id == task_id)
                .cloned()
                .collect(),
            None => records.to_vec(),
        };
        let per_task = group_by_task(&kept)
            .into_iter()
            .map(|group| (group.task_id.to_string(), summarise(group.records)))
            .collect();
        Aggregation {
            overall: summarise(&kept),
            per_task: TaskSummaries(per_task),
        }
    }
}
