//! Asynchronous job tracking over a server-side message queue.
//!
//! A [`TaskMonitor`] owns one queue on the server. Passing it to a POST
//! (see [`crate::navigator::RequestOptions::task`]) adds `?queue=<location>`
//! to the request, and the server then publishes progress-update messages
//! for the started job to that queue. The monitor pulls them with
//! long-polling requests until the job completes or the queue goes quiet
//! for too long.
//!
//! ```text
//! create ─► Created ─► pull ─► Waiting ⇄ MessageReceived ─► Complete | Exhausted
//!                                                     delete(self) ─► Deleted
//! ```

mod progress;

use std::collections::HashMap;
use std::thread;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::Client;
use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::transport::HttpRequest;

pub use progress::{is_done, ProgressUpdate, SubTask, TaskRef};

/// Where a monitor is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Created,
    Waiting,
    MessageReceived,
    Complete,
    Exhausted,
    Deleted,
}

const QUEUE_CONTENT_TYPE: &str = "application/hornetq.jms.queue+xml";
const NEXT_HEADER: &str = "msg-consume-next";
const WAIT_HEADER: &str = "accept-wait";

/// A progress-update queue and its pull consumer.
#[derive(Debug)]
pub struct TaskMonitor {
    client: Client,
    config: MonitorConfig,
    queue_name: String,
    queue_url: String,
    next_pull: String,
    state: MonitorState,
}

impl TaskMonitor {
    /// Create a monitor on a freshly-named queue (`<prefix>-<uuid>`).
    pub fn create(client: &Client, config: MonitorConfig) -> Result<Self> {
        let name = format!("{}-{}", config.queue_prefix, Uuid::now_v7().simple());
        Self::with_queue_name(client, name, config)
    }

    /// Create (or reuse) the queue `name` and attach a pull consumer.
    ///
    /// The server answers an existing queue with 412, which is accepted.
    pub fn with_queue_name(
        client: &Client,
        name: impl Into<String>,
        config: MonitorConfig,
    ) -> Result<Self> {
        let name = name.into();
        let queue_path = queue_path(&config, &name);

        let body = format!(r#"<queue name="{name}"><durable>false</durable></queue>"#);
        let response = client.send(
            HttpRequest::post(&config.queues_path)
                .header("Content-Type", QUEUE_CONTENT_TYPE)
                .body(body),
        )?;
        if response.status != 201 && response.status != 412 {
            return Err(Error::api(format!("failed to create queue {name}"), response));
        }

        client.send(HttpRequest::head(&queue_path))?;

        let consumers = format!("{queue_path}/pull-consumers");
        let response = client.send(HttpRequest::post(&consumers))?;
        if response.status != 201 {
            return Err(Error::api(
                format!("failed to create pull consumer on {name}"),
                response,
            ));
        }
        let next_pull = response
            .header(NEXT_HEADER)
            .map(strip_to_path)
            .ok_or_else(|| {
                Error::api(format!("pull consumer on {name} gave no {NEXT_HEADER}"), response.clone())
            })?;

        let queue_url = format!(
            "{}{}",
            config.queue_location_base.trim_end_matches('/'),
            queue_path
        );
        info!("task_monitor: created queue {name}");

        Ok(Self {
            client: client.clone(),
            config,
            queue_name: name,
            queue_url,
            next_pull,
            state: MonitorState::Created,
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Location handed to the server in `?queue=`.
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// Path the next pull will POST to.
    pub fn next_pull_url(&self) -> &str {
        &self.next_pull
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Pull one message, blocking server-side for up to the wait interval.
    ///
    /// Returns `None` when nothing arrived. The next pull URL is updated
    /// whenever the server supplies a new one, message or not.
    pub fn pull_message(&mut self) -> Result<Option<ProgressUpdate>> {
        self.state = MonitorState::Waiting;
        let response = self.client.send(
            HttpRequest::post(&self.next_pull)
                .header(WAIT_HEADER, self.config.wait_interval.as_secs().to_string()),
        )?;

        match response.header(NEXT_HEADER) {
            Some(next) if !next.is_empty() => self.next_pull = strip_to_path(next),
            _ => debug!("task_monitor: pull on {} gave no next URL", self.queue_name),
        }

        if response.status != 200 {
            debug!("task_monitor: empty pull on {} ({})", self.queue_name, response.status);
            return Ok(None);
        }

        let message = ProgressUpdate::parse(&response.body)?;
        debug!(
            "task_monitor: task {} is {} ({:?}%)",
            message.task_id, message.state, message.percentage
        );
        self.state = MonitorState::MessageReceived;
        Ok(Some(message))
    }

    /// Block until task `id` completes and return its final progress update.
    ///
    /// Messages for other tasks reset the empty-pull counter but are
    /// otherwise ignored. Fails with [`Error::TaskNotProgressing`] after
    /// `max_consecutive_empty` empty pulls in a row.
    pub fn wait_for_task(&mut self, id: &str) -> Result<ProgressUpdate> {
        let mut empty = 0;
        while empty < self.config.max_consecutive_empty {
            let Some(message) = self.pull_message()? else {
                empty += 1;
                self.pause(empty);
                continue;
            };
            empty = 0;

            if message.task_id != id {
                debug!("task_monitor: skipping progress for unrelated task {}", message.task_id);
                continue;
            }
            if message.is_complete() {
                let result = self.final_update(message)?;
                self.state = MonitorState::Complete;
                return Ok(result);
            }
        }

        self.state = MonitorState::Exhausted;
        warn!(
            "task_monitor: no progress on {} after {} empty pulls",
            self.queue_name, self.config.max_consecutive_empty
        );
        Err(Error::TaskNotProgressing(id.to_string()))
    }

    /// Block until every task in `ids` completes, or the queue goes quiet.
    ///
    /// Returns final updates in completion order, one per entry of `ids`,
    /// so an id listed twice yields its update twice. When the empty-pull
    /// budget runs out first, returns only the tasks that finished; this is
    /// not an error, so compare the length against `ids`.
    pub fn wait_for_tasks(&mut self, ids: &[String]) -> Result<Vec<ProgressUpdate>> {
        let mut pending: HashMap<&str, usize> = HashMap::new();
        for id in ids {
            *pending.entry(id.as_str()).or_default() += 1;
        }
        let mut results = Vec::with_capacity(ids.len());
        let mut empty = 0;

        while !pending.is_empty() {
            let Some(message) = self.pull_message()? else {
                empty += 1;
                if empty >= self.config.max_consecutive_empty {
                    break;
                }
                self.pause(empty);
                continue;
            };
            empty = 0;

            if !message.is_complete() {
                continue;
            }
            if let Some(copies) = pending.remove(message.task_id.as_str()) {
                let update = self.final_update(message)?;
                results.extend(vec![update; copies]);
            }
        }

        if pending.is_empty() {
            self.state = MonitorState::Complete;
        } else {
            self.state = MonitorState::Exhausted;
            warn!(
                "task_monitor: {} of {} tasks finished before {} went quiet",
                results.len(),
                ids.len(),
                self.queue_name
            );
        }
        Ok(results)
    }

    /// Delete the queue. Requires 204.
    pub fn delete(mut self) -> Result<()> {
        let path = queue_path(&self.config, &self.queue_name);
        let response = self.client.send(HttpRequest::delete(&path))?;
        if response.status != 204 {
            return Err(Error::TeardownFailure {
                queue: self.queue_name,
                status: response.status,
            });
        }
        self.state = MonitorState::Deleted;
        info!("task_monitor: deleted queue {}", self.queue_name);
        Ok(())
    }

    /// The completing message names its job; the job's own progress-update
    /// holds the full result.
    fn final_update(&self, message: ProgressUpdate) -> Result<ProgressUpdate> {
        let Some(job_href) = &message.job_href else {
            return Ok(message);
        };
        let url = format!("{}/progress-update", strip_to_path(job_href).trim_end_matches('/'));
        let response = self.client.send(HttpRequest::get(&url))?;
        if response.status != 200 {
            return Err(Error::api(format!("GET {url} failed"), response));
        }
        ProgressUpdate::parse(&response.body)
    }

    /// Sleep between empty pulls, except after the one that ends the wait.
    fn pause(&self, empty: u32) {
        if empty < self.config.max_consecutive_empty && !self.config.wait_interval.is_zero() {
            thread::sleep(self.config.wait_interval);
        }
    }
}

// --- helpers -----------------------------------------------------------------

fn queue_path(config: &MonitorConfig, name: &str) -> String {
    format!("{}/jms.queue.{name}", config.queues_path.trim_end_matches('/'))
}

/// Reduce an absolute URL to its path and query, so pulls go through the
/// configured transport rather than the server's internal address.
fn strip_to_path(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(parsed) => match parsed.query() {
            Some(q) => format!("{}?{q}", parsed.path()),
            None => parsed.path().to_string(),
        },
        Err(_) => raw.to_string(),
    }
}

// --- tests -------------------------------------------------------------------
