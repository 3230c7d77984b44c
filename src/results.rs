//! Result collection after a run completes
//!
//! Artifact identifiers are flat, but their ARN path encodes where they belong:
//!
//! ```text
//! arn:...:artifact:{project}/{run}/{job}/{suite}/{test}/{artifact}
//! ```
//!
//! Jobs, suites and tests are listed to map the `{job}/{suite}/{test}` part to
//! display names, and each artifact is written to
//! `{root}/{job name}/{suite name}/{test name}/{artifact}-{name}.{extension}`.

use anyhow::{Context, Result, anyhow, bail};
use futures::future::try_join_all;
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::{ALL_ARTIFACTS, ARTIFACT_CATEGORIES};
use crate::error::RunnerError;
use crate::paging::{collect_all, pages};
use crate::service::{Artifact, DeviceFarm, NamedResource, Transfer};
use crate::telemetry::{TelemetryEvent, TelemetrySink};

/// Index of the first segment after the resource type in a hierarchical ARN
/// (the one following `{project}/{run}`)
const JOB_SEGMENT: usize = 2;

/// The `depth` ancestry segments starting at the job segment, slash-joined
fn ancestry_key(arn: &str, depth: usize) -> Option<String> {
    let segments: Vec<&str> = arn.split('/').collect();
    let end = JOB_SEGMENT + depth;
    (segments.len() >= end).then(|| segments[JOB_SEGMENT..end].join("/"))
}

/// Which artifacts to download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSelection {
    All,
    Types(HashSet<String>),
}

impl ArtifactSelection {
    /// Parse a comma-separated list of artifact types
    ///
    /// Returns `None` when nothing was requested. `ALL` anywhere in the list
    /// selects everything.
    pub fn parse(input: &str) -> Option<Self> {
        let types: HashSet<String> = input
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        if types.is_empty() {
            None
        } else if types.contains(ALL_ARTIFACTS) {
            Some(ArtifactSelection::All)
        } else {
            Some(ArtifactSelection::Types(types))
        }
    }

    pub fn matches(&self, artifact: &Artifact) -> bool {
        match self {
            ArtifactSelection::All => true,
            ArtifactSelection::Types(types) => types.contains(&artifact.artifact_type),
        }
    }
}

/// Display names (`[job, suite, test]`) for each `{job}/{suite}/{test}` ancestry key
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    tests: HashMap<String, Vec<String>>,
}

impl NameIndex {
    /// Build the index from the three listing levels
    pub fn from_hierarchy(
        jobs: &[NamedResource],
        suites: &[NamedResource],
        tests: &[NamedResource],
    ) -> Result<Self> {
        let job_names: HashMap<String, &str> = jobs
            .iter()
            .filter_map(|job| Some((ancestry_key(&job.arn, 1)?, job.name.as_str())))
            .collect();

        let mut suite_names = HashMap::new();
        for suite in suites {
            let key = ancestry_key(&suite.arn, 2)
                .ok_or_else(|| anyhow!("Suite ARN {} has no job ancestry", suite.arn))?;
            let job_key = ancestry_key(&suite.arn, 1).unwrap_or_default();
            let job_name = job_names
                .get(&job_key)
                .ok_or_else(|| anyhow!("Suite {} belongs to an unknown job", suite.arn))?;
            suite_names.insert(key, vec![job_name.to_string(), suite.name.clone()]);
        }

        let mut test_names = HashMap::new();
        for test in tests {
            let key = ancestry_key(&test.arn, 3)
                .ok_or_else(|| anyhow!("Test ARN {} has no suite ancestry", test.arn))?;
            let suite_key = ancestry_key(&test.arn, 2).unwrap_or_default();
            let mut names: Vec<String> = suite_names
                .get(&suite_key)
                .cloned()
                .ok_or_else(|| anyhow!("Test {} belongs to an unknown suite", test.arn))?;
            names.push(test.name.clone());
            test_names.insert(key, names);
        }

        Ok(Self { tests: test_names })
    }

    /// Job, suite and test names of the test an artifact belongs to
    pub fn lookup(&self, artifact_arn: &str) -> Option<&[String]> {
        let key = ancestry_key(artifact_arn, 3)?;
        self.tests.get(&key).map(Vec::as_slice)
    }
}

/// Append `name` below `path`, refusing anything that would leave it
fn push_name(path: &mut PathBuf, name: &str) -> Result<()> {
    let mut pushed = false;
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => {
                path.push(part);
                pushed = true;
            }
            Component::CurDir => {}
            _ => bail!("Refusing to write outside the artifact folder: {:?}", name),
        }
    }
    if !pushed {
        bail!("Empty folder name {:?} in artifact path", name);
    }
    Ok(())
}

/// Local path an artifact is written to
///
/// The artifact's own ARN segment prefixes the file name so that artifacts
/// sharing test, name and extension do not overwrite each other. The result
/// always lies below `root`.
pub fn artifact_path(root: &Path, index: &NameIndex, artifact: &Artifact) -> Result<PathBuf> {
    let unique = artifact
        .arn
        .split('/')
        .nth(JOB_SEGMENT + 3)
        .ok_or_else(|| anyhow!("Artifact ARN {} has no artifact segment", artifact.arn))?;
    let folders = index
        .lookup(&artifact.arn)
        .ok_or_else(|| anyhow!("No test found for artifact {}", artifact.arn))?;

    let mut path = root.to_path_buf();
    for name in folders {
        push_name(&mut path, name)?;
    }

    let file_name = format!("{}-{}.{}", unique, artifact.name, artifact.extension);
    let mut components = Path::new(&file_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) => path.push(part),
        _ => bail!("Refusing to write outside the artifact folder: {:?}", file_name),
    }
    Ok(path)
}

pub struct ResultCollector {
    service: Arc<dyn DeviceFarm>,
    transfer: Arc<dyn Transfer>,
    telemetry: TelemetrySink,
}

impl ResultCollector {
    pub fn new(
        service: Arc<dyn DeviceFarm>,
        transfer: Arc<dyn Transfer>,
        telemetry: TelemetrySink,
    ) -> Self {
        Self {
            service,
            transfer,
            telemetry,
        }
    }

    /// List jobs, then their suites, then their tests, and index test names
    ///
    /// Siblings are listed concurrently; each level waits for its parent level.
    pub async fn build_name_index(&self, run_arn: &str) -> Result<NameIndex> {
        let service = self.service.as_ref();

        let jobs = collect_all(pages(move |token| service.list_jobs(run_arn, token)))
            .await
            .context("Failed to list jobs")?;

        info!("Job results:");
        for job in &jobs {
            let counters = job.counters.clone().unwrap_or_default();
            info!("{}: {}.", job.name, counters);
        }

        let suites: Vec<NamedResource> = try_join_all(jobs.iter().map(|job| {
            let job_arn = job.arn.as_str();
            collect_all(pages(move |token| service.list_suites(job_arn, token)))
        }))
        .await
        .context("Failed to list suites")?
        .into_iter()
        .flatten()
        .collect();

        let tests: Vec<NamedResource> = try_join_all(suites.iter().map(|suite| {
            let suite_arn = suite.arn.as_str();
            collect_all(pages(move |token| service.list_tests(suite_arn, token)))
        }))
        .await
        .context("Failed to list tests")?
        .into_iter()
        .flatten()
        .collect();

        let jobs: Vec<NamedResource> = jobs
            .into_iter()
            .map(|job| NamedResource::new(job.arn, job.name))
            .collect();

        NameIndex::from_hierarchy(&jobs, &suites, &tests)
    }

    /// List every artifact category concurrently and keep the selected ones
    pub async fn discover_artifacts(
        &self,
        run_arn: &str,
        selection: &ArtifactSelection,
    ) -> Result<Vec<Artifact>> {
        let service = self.service.as_ref();

        let per_category = try_join_all(ARTIFACT_CATEGORIES.iter().map(|&category| {
            collect_all(pages(move |token| {
                service.list_artifacts(run_arn, category, token)
            }))
        }))
        .await?;

        Ok(per_category
            .into_iter()
            .flatten()
            .filter(|artifact| selection.matches(artifact))
            .collect())
    }

    async fn download_artifact(
        &self,
        root: &Path,
        index: &NameIndex,
        artifact: &Artifact,
    ) -> Result<PathBuf> {
        let path = artifact_path(root, index, artifact)?;
        if let Some(folder) = path.parent() {
            tokio::fs::create_dir_all(folder)
                .await
                .with_context(|| format!("Failed to create {}", folder.display()))?;
        }

        let bytes = self
            .transfer
            .get(&artifact.url)
            .await
            .map_err(|e| RunnerError::transfer(&artifact.url, e))?;

        info!("Downloading {}...", path.display());
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        self.telemetry.emit(TelemetryEvent::ArtifactDownloaded {
            bytes: bytes.len() as u64,
        });
        Ok(path)
    }

    /// Download the selected artifacts of a completed run under `root`
    ///
    /// Returns the written paths. Any failed download fails the collection.
    pub async fn collect(
        &self,
        run_arn: &str,
        root: &Path,
        selection: &ArtifactSelection,
    ) -> Result<Vec<PathBuf>> {
        let (artifacts, index) = tokio::try_join!(
            self.discover_artifacts(run_arn, selection),
            self.build_name_index(run_arn),
        )?;

        self.telemetry.emit(TelemetryEvent::ArtifactsDiscovered {
            count: artifacts.len(),
        });
        if artifacts.is_empty() {
            info!("No artifacts matched the requested types");
            return Ok(Vec::new());
        }

        info!("Downloading {} test artifacts...", artifacts.len());
        try_join_all(
            artifacts
                .iter()
                .map(|artifact| self.download_artifact(root, &index, artifact)),
        )
        .await
    }
}
