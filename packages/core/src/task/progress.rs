//! Progress messages and job references.

use crate::error::{Error, Result};
use crate::xml::{self, DataNode};

/// The server's acknowledgement of an asynchronous request.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRef {
    /// Opaque job id. Progress messages carry it as `taskId`.
    pub id: String,
    pub href: Option<String>,
    pub node: DataNode,
}

impl TaskRef {
    /// Parse a `<task>` acknowledgement body.
    pub fn parse(body: &str) -> Result<Self> {
        let node = xml::deserialize(body)?;
        let id = node
            .value("id")
            .or_else(|| node.value("taskId"))
            .ok_or_else(|| Error::Marshalling(format!("<{}> carries no task id", node.name())))?
            .to_string();
        Ok(Self {
            id,
            href: node.attribute("href").map(str::to_string),
            node,
        })
    }
}

/// State of one sub-task of a composite job.
#[derive(Debug, Clone, PartialEq)]
pub struct SubTask {
    pub id: Option<String>,
    pub state: String,
}

/// One progress-update message for a job.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub task_id: String,
    pub state: String,
    pub status: Option<String>,
    pub percentage: Option<f64>,
    pub sub_tasks: Vec<SubTask>,
    /// Href of the job, from `<job href="..."/>`; its `/progress-update`
    /// holds the full result.
    pub job_href: Option<String>,
    /// The job's result payload, when the message carries one.
    pub data: Option<DataNode>,
    pub node: DataNode,
}

impl ProgressUpdate {
    pub fn parse(body: &str) -> Result<Self> {
        Self::from_node(xml::deserialize(body)?)
    }

    pub fn from_node(node: DataNode) -> Result<Self> {
        let task_id = node
            .value("taskId")
            .ok_or_else(|| Error::Marshalling(format!("<{}> carries no taskId", node.name())))?
            .to_string();

        let sub_tasks = node
            .children_named("subTask")
            .into_iter()
            .map(|s| SubTask {
                id: s.value("id").or_else(|| s.value("taskId")).map(str::to_string),
                state: s.value("state").unwrap_or_default().to_string(),
            })
            .collect();

        Ok(Self {
            task_id,
            state: node.value("state").unwrap_or_default().to_string(),
            status: node.value("status").map(str::to_string),
            percentage: node.value("percentage").and_then(|p| p.trim().parse().ok()),
            sub_tasks,
            job_href: node
                .child("job")
                .and_then(|j| j.attribute("href"))
                .map(str::to_string),
            data: node.child("data").cloned(),
            node,
        })
    }

    /// The job is finished: its own state is done, or it has sub-tasks and
    /// every one of them is done.
    pub fn is_complete(&self) -> bool {
        if is_done(&self.state) {
            return true;
        }
        !self.sub_tasks.is_empty() && self.sub_tasks.iter().all(|s| is_done(&s.state))
    }
}

/// Completion test for a single state string. Case-insensitive.
pub fn is_done(state: &str) -> bool {
    state.trim().eq_ignore_ascii_case("done")
}
