//! Test doubles shared by the controller's unit tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use edgewatch_core::{InstanceState, OwnedInstance, Region, ResourceTag};
use edgewatch_providers::{
    ComputeError, ComputeRepository, InMemoryComputeRepository, LaunchParams, TagFilter,
};
use std::collections::HashSet;
use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputeOp {
    Run,
    Tag,
    Describe,
    Terminate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComputeCall {
    Run { region: Region, params: LaunchParams },
    Tag { region: Region, ids: Vec<String> },
    Describe { region: Region },
    Terminate { region: Region, ids: Vec<String> },
}

impl ComputeCall {
    pub fn op(&self) -> ComputeOp {
        match self {
            ComputeCall::Run { .. } => ComputeOp::Run,
            ComputeCall::Tag { .. } => ComputeOp::Tag,
            ComputeCall::Describe { .. } => ComputeOp::Describe,
            ComputeCall::Terminate { .. } => ComputeOp::Terminate,
        }
    }
}

/// In-memory compute provider that records every call and can fail chosen operations.
///
/// Calls are recorded before failure injection, so a failed call still shows up.
#[derive(Default)]
pub struct RecordingComputeRepository {
    inner: InMemoryComputeRepository,
    calls: Mutex<Vec<ComputeCall>>,
    failing: Mutex<HashSet<ComputeOp>>,
}

impl RecordingComputeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryComputeRepository {
        &self.inner
    }

    pub fn fail_on(&self, op: ComputeOp) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn calls(&self) -> Vec<ComputeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_of(&self, op: ComputeOp) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.op() == op)
            .count()
    }

    fn record(&self, call: ComputeCall) -> Result<(), ComputeError> {
        let op = call.op();
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(&op) {
            return Err(ComputeError::Transport(format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl ComputeRepository for RecordingComputeRepository {
    async fn run_instances(
        &self,
        region: Region,
        params: &LaunchParams,
    ) -> Result<Vec<String>, ComputeError> {
        self.record(ComputeCall::Run {
            region,
            params: params.clone(),
        })?;
        self.inner.run_instances(region, params).await
    }

    async fn create_tags(
        &self,
        region: Region,
        resource_ids: &[String],
        tags: &[ResourceTag],
    ) -> Result<(), ComputeError> {
        self.record(ComputeCall::Tag {
            region,
            ids: resource_ids.to_vec(),
        })?;
        self.inner.create_tags(region, resource_ids, tags).await
    }

    async fn describe_instances(
        &self,
        region: Region,
        filter: &TagFilter,
    ) -> Result<Vec<OwnedInstance>, ComputeError> {
        self.record(ComputeCall::Describe { region })?;
        self.inner.describe_instances(region, filter).await
    }

    async fn terminate_instances(
        &self,
        region: Region,
        instance_ids: &[String],
    ) -> Result<(), ComputeError> {
        self.record(ComputeCall::Terminate {
            region,
            ids: instance_ids.to_vec(),
        })?;
        self.inner.terminate_instances(region, instance_ids).await
    }
}

/// A launch time `secs` seconds after a fixed epoch.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs)
}

/// Insert an owned instance directly, bypassing the call log.
pub fn seed(
    repo: &RecordingComputeRepository,
    instance_id: &str,
    region: Region,
    launch_time: DateTime<Utc>,
    state: InstanceState,
) {
    repo.inner()
        .insert(
            OwnedInstance::new(instance_id, launch_time, state, region),
            vec![ResourceTag::ownership()],
        )
        .unwrap();
}

/// Shared sink for formatted log lines.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `future` to completion and return its output with everything it logged.
pub fn capture_logs<F: Future>(future: F) -> (F::Output, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let output = tracing::subscriber::with_default(subscriber, || tokio_test::block_on(future));
    (output, buffer.contents())
}
