// src/iteration/store.rs — Filesystem layout for iterations
//
// <project>/.specloop/iterations/iteration-<N>/
//     document.md        the document as extracted
//     claims.json        ExtractionResult
//     verification.json  VerificationReport
//     gap-report.md      rendered gap report
//
// Iteration directories are allocated with `create_dir`, which fails if the
// directory exists, so concurrent allocators never share a number. Artifacts are
// written to a temp file and then moved into place.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::types::{IterationSummary, Stage};
use crate::claims::{ComplianceScore, ExtractionResult, VerificationReport};
use crate::infra::errors::SpecLoopError;
use crate::infra::paths;

const DIR_PREFIX: &str = "iteration-";

/// Guard against an allocation loop spinning forever on a broken filesystem.
const MAX_ALLOCATION_ATTEMPTS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Document,
    Claims,
    Verification,
    GapReport,
}

impl Artifact {
    pub fn file_name(&self) -> &'static str {
        match self {
            Artifact::Document => "document.md",
            Artifact::Claims => "claims.json",
            Artifact::Verification => "verification.json",
            Artifact::GapReport => "gap-report.md",
        }
    }

    /// The CLI stage that writes this artifact.
    pub fn produced_by(&self) -> &'static str {
        match self {
            Artifact::Document | Artifact::Claims => "extract",
            Artifact::Verification => "verify",
            Artifact::GapReport => "report",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IterationStore {
    root: PathBuf,
}

impl IterationStore {
    /// Store for the project rooted at `project_dir`.
    pub fn for_project(project_dir: &Path) -> Self {
        Self {
            root: paths::iterations_dir(project_dir),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, iteration: u32) -> PathBuf {
        self.root.join(format!("{DIR_PREFIX}{iteration}"))
    }

    pub fn path(&self, iteration: u32, artifact: Artifact) -> PathBuf {
        self.dir(iteration).join(artifact.file_name())
    }

    /// Existing iteration numbers, ascending.
    pub fn list(&self) -> Result<Vec<u32>, SpecLoopError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut numbers: Vec<u32> = entries
            .flatten()
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|e| parse_dir_name(&e.file_name().to_string_lossy()))
            .collect();
        numbers.sort_unstable();
        Ok(numbers)
    }

    pub fn latest(&self) -> Result<Option<u32>, SpecLoopError> {
        Ok(self.list()?.last().copied())
    }

    /// An explicit iteration must exist; no iteration means the latest one.
    pub fn resolve(&self, iteration: Option<u32>) -> Result<u32, SpecLoopError> {
        match iteration {
            Some(n) if n > 0 && self.dir(n).is_dir() => Ok(n),
            Some(n) => Err(SpecLoopError::IterationNotFound(n)),
            None => self.latest()?.ok_or(SpecLoopError::NoIterations),
        }
    }

    /// Claim the next iteration number by creating its directory.
    pub fn allocate_next(&self) -> Result<u32, SpecLoopError> {
        std::fs::create_dir_all(&self.root)?;
        let mut candidate = self.latest()?.unwrap_or(0) + 1;

        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            match std::fs::create_dir(self.dir(candidate)) {
                Ok(()) => {
                    tracing::debug!(iteration = candidate, "Iteration allocated");
                    return Ok(candidate);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => candidate += 1,
                Err(e) => return Err(e.into()),
            }
        }
        Err(SpecLoopError::InvariantViolation(format!(
            "could not allocate an iteration under {} after {} attempts",
            self.root.display(),
            MAX_ALLOCATION_ATTEMPTS
        )))
    }

    /// Run `fill` against a freshly allocated iteration; on failure the iteration is
    /// removed again so a half-written directory never becomes the latest one.
    pub fn populate<T>(
        &self,
        iteration: u32,
        fill: impl FnOnce(&Self) -> Result<T, SpecLoopError>,
    ) -> Result<T, SpecLoopError> {
        fill(self).inspect_err(|_| {
            if let Err(e) = std::fs::remove_dir_all(self.dir(iteration)) {
                tracing::warn!(iteration, error = %e, "Could not discard partial iteration");
            }
        })
    }

    pub fn exists(&self, iteration: u32, artifact: Artifact) -> bool {
        self.path(iteration, artifact).is_file()
    }

    /// Fail early when a stage would clobber an artifact it is not allowed to replace.
    pub fn ensure_writable(
        &self,
        iteration: u32,
        artifact: Artifact,
        force: bool,
    ) -> Result<(), SpecLoopError> {
        if !force && self.exists(iteration, artifact) {
            return Err(SpecLoopError::ArtifactExists {
                iteration,
                artifact: artifact.file_name(),
            });
        }
        Ok(())
    }

    /// Write an artifact atomically. Without `force`, an existing artifact is never replaced.
    pub fn write(
        &self,
        iteration: u32,
        artifact: Artifact,
        contents: &str,
        force: bool,
    ) -> Result<PathBuf, SpecLoopError> {
        self.ensure_writable(iteration, artifact, force)?;

        let dir = self.dir(iteration);
        if !dir.is_dir() {
            return Err(SpecLoopError::IterationNotFound(iteration));
        }
        let dst = dir.join(artifact.file_name());
        let tmp = dir.join(format!(
            ".{}.{}.tmp",
            artifact.file_name(),
            uuid::Uuid::new_v4().simple()
        ));

        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(contents.as_bytes())?;
        f.flush()?;
        f.sync_all()?;
        drop(f);

        let placed = if force {
            std::fs::rename(&tmp, &dst)
        } else {
            // hard_link refuses to replace an existing file, closing the check/write race.
            std::fs::hard_link(&tmp, &dst).and_then(|()| std::fs::remove_file(&tmp))
        };

        if let Err(e) = placed {
            let _ = std::fs::remove_file(&tmp);
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                return Err(SpecLoopError::ArtifactExists {
                    iteration,
                    artifact: artifact.file_name(),
                });
            }
            return Err(e.into());
        }

        tracing::debug!(iteration, artifact = artifact.file_name(), "Artifact written");
        Ok(dst)
    }

    pub fn write_json<T: Serialize>(
        &self,
        iteration: u32,
        artifact: Artifact,
        value: &T,
        force: bool,
    ) -> Result<PathBuf, SpecLoopError> {
        let json = serde_json::to_string_pretty(value)?;
        self.write(iteration, artifact, &json, force)
    }

    /// Read an artifact, reporting which stage has to run first when it is missing.
    pub fn read(&self, iteration: u32, artifact: Artifact) -> Result<String, SpecLoopError> {
        match std::fs::read_to_string(self.path(iteration, artifact)) {
            Ok(s) => Ok(s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SpecLoopError::MissingArtifact {
                    iteration,
                    artifact: artifact.file_name(),
                    stage: artifact.produced_by(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn read_json<T: DeserializeOwned>(
        &self,
        iteration: u32,
        artifact: Artifact,
    ) -> Result<T, SpecLoopError> {
        let content = self.read(iteration, artifact)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn load_extraction(&self, iteration: u32) -> Result<ExtractionResult, SpecLoopError> {
        let extraction: ExtractionResult = self.read_json(iteration, Artifact::Claims)?;
        if extraction.iteration != iteration {
            return Err(SpecLoopError::InvariantViolation(format!(
                "{} records iteration {}",
                self.path(iteration, Artifact::Claims).display(),
                extraction.iteration
            )));
        }
        extraction.check_invariants()?;
        Ok(extraction)
    }

    pub fn load_verification(&self, iteration: u32) -> Result<VerificationReport, SpecLoopError> {
        self.read_json(iteration, Artifact::Verification)
    }

    /// Stage, counts and score for every iteration on disk.
    pub fn history(&self) -> Result<Vec<IterationSummary>, SpecLoopError> {
        self.list()?.into_iter().map(|n| self.summarize(n)).collect()
    }

    fn summarize(&self, n: u32) -> Result<IterationSummary, SpecLoopError> {
        let mut summary = IterationSummary {
            iteration: n,
            stage: Stage::Empty,
            claims: None,
            testable: None,
            verdicts: None,
            score: None,
        };
        if !self.exists(n, Artifact::Claims) {
            return Ok(summary);
        }

        let extraction = self.load_extraction(n)?;
        summary.stage = Stage::Extracted;
        summary.claims = Some(extraction.total_claims);
        summary.testable = Some(extraction.testable_claims);

        if self.exists(n, Artifact::Verification) {
            let verification = self.load_verification(n)?;
            let score = ComplianceScore::compute(&extraction, &verification)?;
            summary.stage = Stage::Verified;
            summary.verdicts = Some(score.verdicts);
            summary.score = Some(score.score);
        }
        if summary.stage == Stage::Verified && self.exists(n, Artifact::GapReport) {
            summary.stage = Stage::Reported;
        }
        Ok(summary)
    }
}

/// Only canonical names count: `iteration-05` would never match `dir(5)`.
fn parse_dir_name(name: &str) -> Option<u32> {
    let digits = name.strip_prefix(DIR_PREFIX)?;
    digits
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0 && n.to_string() == digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{Category, Claim, Severity};

    fn store() -> (tempfile::TempDir, IterationStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = IterationStore::for_project(dir.path());
        (dir, store)
    }

    // ─── numbering ──────────────────────────────────────────────

    #[test]
    fn test_parse_dir_name() {
        assert_eq!(parse_dir_name("iteration-12"), Some(12));
        assert_eq!(parse_dir_name("iteration-0"), None);
        assert_eq!(parse_dir_name("iteration-x"), None);
        assert_eq!(parse_dir_name("iteration-"), None);
        assert_eq!(parse_dir_name("run-3"), None);
        assert_eq!(parse_dir_name("iteration-05"), None);
        assert_eq!(parse_dir_name("iteration-+5"), None);
    }

    #[test]
    fn test_non_canonical_dirs_ignored() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.root().join("iteration-05")).unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(matches!(
            store.resolve(None).unwrap_err(),
            SpecLoopError::NoIterations
        ));

        std::fs::create_dir_all(store.dir(2)).unwrap();
        assert_eq!(store.resolve(None).unwrap(), 2);
        assert!(store.dir(store.resolve(None).unwrap()).is_dir());
    }

    #[test]
    fn test_failed_populate_discards_iteration() {
        let (_dir, store) = store();
        let n = store.allocate_next().unwrap();
        let err = store
            .populate(n, |s| {
                s.write(n, Artifact::Document, "# doc", false)?;
                s.write(n, Artifact::Document, "# again", false)
            })
            .unwrap_err();
        assert!(matches!(err, SpecLoopError::ArtifactExists { .. }));
        assert!(!store.dir(n).exists());
        assert_eq!(store.latest().unwrap(), None);
        assert_eq!(store.allocate_next().unwrap(), 1);
    }

    #[test]
    fn test_successful_populate_keeps_iteration() {
        let (_dir, store) = store();
        let n = store.allocate_next().unwrap();
        let path = store
            .populate(n, |s| s.write(n, Artifact::Document, "# doc", false))
            .unwrap();
        assert!(path.is_file());
        assert_eq!(store.latest().unwrap(), Some(n));
    }

    #[test]
    fn test_empty_store() {
        let (_dir, store) = store();
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.latest().unwrap(), None);
        assert!(matches!(
            store.resolve(None).unwrap_err(),
            SpecLoopError::NoIterations
        ));
    }

    #[test]
    fn test_latest_is_max_with_gaps() {
        let (_dir, store) = store();
        for n in [1, 2, 4] {
            std::fs::create_dir_all(store.dir(n)).unwrap();
        }
        std::fs::write(store.root().join("iteration-9"), "a file, not a dir").unwrap();
        std::fs::create_dir_all(store.root().join("scratch")).unwrap();

        assert_eq!(store.list().unwrap(), vec![1, 2, 4]);
        assert_eq!(store.resolve(None).unwrap(), 4);
        assert_eq!(store.resolve(Some(2)).unwrap(), 2);
        assert!(matches!(
            store.resolve(Some(3)).unwrap_err(),
            SpecLoopError::IterationNotFound(3)
        ));
        assert_eq!(store.allocate_next().unwrap(), 5);
    }

    #[test]
    fn test_allocate_never_repeats() {
        let (_dir, store) = store();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = store.clone();
                std::thread::spawn(move || s.allocate_next().unwrap())
            })
            .collect();
        let mut got: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        got.sort_unstable();
        assert_eq!(got, (1..=8).collect::<Vec<_>>());
    }

    // ─── artifacts ──────────────────────────────────────────────

    #[test]
    fn test_write_once_then_force() {
        let (_dir, store) = store();
        let n = store.allocate_next().unwrap();
        store.write(n, Artifact::Document, "v1", false).unwrap();

        let err = store.write(n, Artifact::Document, "v2", false).unwrap_err();
        assert!(matches!(err, SpecLoopError::ArtifactExists { .. }));
        assert_eq!(store.read(n, Artifact::Document).unwrap(), "v1");

        store.write(n, Artifact::Document, "v3", true).unwrap();
        assert_eq!(store.read(n, Artifact::Document).unwrap(), "v3");

        let leftovers: Vec<_> = std::fs::read_dir(store.dir(n))
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_write_to_unallocated_iteration_fails() {
        let (_dir, store) = store();
        let err = store.write(3, Artifact::Document, "x", false).unwrap_err();
        assert!(matches!(err, SpecLoopError::IterationNotFound(3)));
    }

    #[test]
    fn test_missing_artifact_names_stage() {
        let (_dir, store) = store();
        let n = store.allocate_next().unwrap();
        match store.read(n, Artifact::Verification).unwrap_err() {
            SpecLoopError::MissingArtifact {
                iteration,
                artifact,
                stage,
            } => {
                assert_eq!(iteration, n);
                assert_eq!(artifact, "verification.json");
                assert_eq!(stage, "verify");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_extraction_roundtrip_and_tamper_check() {
        let (_dir, store) = store();
        let n = store.allocate_next().unwrap();
        let claim = Claim {
            id: "C1".into(),
            section: "1".into(),
            category: Category::Legal,
            severity: Severity::Low,
            text: "t".into(),
            testable: false,
        };
        let result = ExtractionResult::new(n, "policy", vec![claim]);
        store
            .write_json(n, Artifact::Claims, &result, false)
            .unwrap();
        let loaded = store.load_extraction(n).unwrap();
        assert_eq!(loaded.claims, result.claims);

        let mut tampered = result.clone();
        tampered.testable_claims = 1;
        store
            .write_json(n, Artifact::Claims, &tampered, true)
            .unwrap();
        assert!(matches!(
            store.load_extraction(n).unwrap_err(),
            SpecLoopError::InvariantViolation(_)
        ));
    }
}
