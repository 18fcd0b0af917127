//! Single-slot mailbox between the coordinator and a match worker.
//!
//! Each launch creates a fresh [`Job`] tagged with the next generation.
//! The worker holds the only [`JobWriter`] for it and publishes the outcome
//! once; the `done` flag is stored last with `Release` and loaded first with
//! `Acquire`, so the outcome fields are visible once `done` is observed.
//! An abandoned job keeps its generation, so a late publish can never be
//! mistaken for the outcome of a newer attempt.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use fpterm_core::{Error, Result, TemplateId};

const NO_SUBJECT: i32 = -1;

/// What a finished attempt reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchOutcome {
    pub matched: bool,
    pub subject: Option<TemplateId>,
    pub score: u16,
}

impl MatchOutcome {
    pub fn hit(subject: TemplateId, score: u16) -> Self {
        Self {
            matched: true,
            subject: Some(subject),
            score,
        }
    }

    /// Unsuccessful attempt, whatever the cause.
    pub fn failed() -> Self {
        Self::default()
    }

    /// A hit that scores strictly above `threshold`.
    pub fn is_accepted(&self, threshold: u16) -> bool {
        self.matched && self.subject.is_some() && self.score > threshold
    }
}

/// Shared record of one attempt.
#[derive(Debug)]
pub struct Job {
    generation: u64,
    done: AtomicBool,
    matched: AtomicBool,
    subject: AtomicI32,
    score: AtomicU32,
}

impl Job {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            done: AtomicBool::new(false),
            matched: AtomicBool::new(false),
            subject: AtomicI32::new(NO_SUBJECT),
            score: AtomicU32::new(0),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn read_outcome(&self) -> MatchOutcome {
        let subject = self.subject.load(Ordering::Relaxed);
        MatchOutcome {
            matched: self.matched.load(Ordering::Relaxed),
            subject: u16::try_from(subject)
                .ok()
                .and_then(|raw| TemplateId::new(raw).ok()),
            score: u16::try_from(self.score.load(Ordering::Relaxed)).unwrap_or(u16::MAX),
        }
    }
}

/// Write end of a job, owned by exactly one worker.
///
/// Dropping a writer that never published records a failed outcome, so a
/// worker that dies mid-attempt still completes its job.
#[derive(Debug)]
pub struct JobWriter {
    job: Arc<Job>,
    published: bool,
}

impl JobWriter {
    pub fn generation(&self) -> u64 {
        self.job.generation
    }

    /// Publish the outcome and mark the job done.
    pub fn publish(mut self, outcome: MatchOutcome) {
        self.write(outcome);
    }

    fn write(&mut self, outcome: MatchOutcome) {
        let subject = outcome
            .subject
            .map_or(NO_SUBJECT, |id| i32::from(id.as_u16()));
        self.job.matched.store(outcome.matched, Ordering::Relaxed);
        self.job.subject.store(subject, Ordering::Relaxed);
        self.job
            .score
            .store(u32::from(outcome.score), Ordering::Relaxed);
        // Must stay the last store.
        self.job.done.store(true, Ordering::Release);
        self.published = true;
    }
}

impl Drop for JobWriter {
    fn drop(&mut self) {
        if !self.published {
            tracing::debug!(generation = self.job.generation, "Job dropped unpublished");
            self.write(MatchOutcome::failed());
        }
    }
}

/// Coordinator-side owner of the current job.
#[derive(Debug, Default)]
pub struct JobSlot {
    current: Option<Arc<Job>>,
    generation: u64,
}

impl JobSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a launched job has not been consumed or abandoned yet.
    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Generation of the most recent launch.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Forget the current job without reading it.
    ///
    /// Returns the abandoned generation, if any. The worker may still
    /// publish into it; nothing will read that write.
    pub fn abandon(&mut self) -> Option<u64> {
        let job = self.current.take()?;
        tracing::debug!(generation = job.generation, "Job abandoned");
        Some(job.generation)
    }

    /// Start a new generation and hand out its writer.
    ///
    /// # Errors
    ///
    /// Returns `Error::JobActive` if the previous job is still active.
    pub fn launch(&mut self) -> Result<JobWriter> {
        if let Some(job) = &self.current {
            return Err(Error::JobActive {
                generation: job.generation,
            });
        }
        self.generation += 1;
        let job = Arc::new(Job::new(self.generation));
        self.current = Some(Arc::clone(&job));
        Ok(JobWriter {
            job,
            published: false,
        })
    }

    /// Copy out the outcome once the current job is done, clearing the slot.
    ///
    /// Returns `None` while the worker is still running.
    pub fn take_result(&mut self) -> Option<MatchOutcome> {
        let job = self.current.as_ref()?;
        if !job.is_done() {
            return None;
        }
        if job.generation != self.generation {
            tracing::warn!(
                job = job.generation,
                expected = self.generation,
                "Discarding stale job"
            );
            self.current = None;
            return None;
        }
        let outcome = job.read_outcome();
        self.current = None;
        Some(outcome)
    }
}
