//! # Store de Jobs
//! src/jobs/store.rs
//!
//! Mapa id → job para las interacciones fuera de banda (cambiar variante,
//! cancelar). Un id está presente si y solo si el job está `Queued` o
//! `Running`.

use crate::error::SchedulerError;
use crate::jobs::job::Job;
use crate::jobs::types::JobId;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct JobStore {
    jobs: HashMap<JobId, Job>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra un job nuevo. Falla si ya hay uno vivo con el mismo id.
    pub fn register(&mut self, job: Job) -> Result<(), SchedulerError> {
        if self.jobs.contains_key(job.id()) {
            return Err(SchedulerError::DuplicateJob(job.id().clone()));
        }
        self.jobs.insert(job.id().clone(), job);
        Ok(())
    }

    pub fn lookup(&self, id: &JobId) -> Result<&Job, SchedulerError> {
        self.jobs
            .get(id)
            .ok_or_else(|| SchedulerError::NotFound(id.clone()))
    }

    pub fn lookup_mut(&mut self, id: &JobId) -> Result<&mut Job, SchedulerError> {
        self.jobs
            .get_mut(id)
            .ok_or_else(|| SchedulerError::NotFound(id.clone()))
    }

    pub fn unregister(&mut self, id: &JobId) -> Result<Job, SchedulerError> {
        self.jobs
            .remove(id)
            .ok_or_else(|| SchedulerError::NotFound(id.clone()))
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.jobs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
