use crate::loading_map::LoadingTicket;
use crate::manager::ResourceManager;
use stockpile_base::{LoadError, LoadResult, ResourceHandle};

/// Result of advancing a staged load by one step
#[derive(Debug, Clone)]
pub enum LoadStatus {
    InProgress,
    Done,
    Failed(LoadError),
}

/// A load split into steps, produced by `FormatLoader::load_interactive`. The owner calls `poll`
/// until it stops returning `InProgress`. Dropping the job early cancels it, so implementations
/// must be able to release partial state from their destructor.
pub trait InteractiveLoader {
    /// Do the next unit of work
    fn poll(&mut self) -> LoadStatus;

    /// The loaded resource, once `poll` returned `Done`
    fn resource(&self) -> Option<ResourceHandle>;

    /// Progress reporting, not interpreted by the registry. Must not decrease.
    fn stage(&self) -> usize {
        0
    }

    fn stage_count(&self) -> usize {
        0
    }

    /// Run to completion. Override if the loader can do better than polling in a loop.
    fn wait(&mut self) -> LoadStatus {
        loop {
            match self.poll() {
                LoadStatus::InProgress => continue,
                status => return status,
            }
        }
    }
}

/// Job wrapping a result that is already known. Reports it on the first poll.
pub struct CompletedInteractiveLoader {
    result: LoadResult<ResourceHandle>,
    polled: bool,
}

impl CompletedInteractiveLoader {
    pub fn new(result: LoadResult<ResourceHandle>) -> Self {
        CompletedInteractiveLoader {
            result,
            polled: false,
        }
    }
}

impl InteractiveLoader for CompletedInteractiveLoader {
    fn poll(&mut self) -> LoadStatus {
        self.polled = true;
        match &self.result {
            Ok(_) => LoadStatus::Done,
            Err(e) => LoadStatus::Failed(e.clone()),
        }
    }

    fn resource(&self) -> Option<ResourceHandle> {
        if self.polled {
            self.result.as_ref().ok().cloned()
        } else {
            None
        }
    }

    fn stage(&self) -> usize {
        self.polled as usize
    }

    fn stage_count(&self) -> usize {
        1
    }
}

/// Observable state of an `InteractiveLoad`. A job dropped before reaching `Success` or `Failure`
/// is canceled, which can't be observed since the job no longer exists.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InteractiveLoadState {
    Fresh,
    Running,
    Success,
    Failure,
}

enum JobState {
    Fresh,
    Running,
    Success(ResourceHandle),
    Failure(LoadError),
}

/// A staged load started through `ResourceManager::load_interactive`.
///
/// Owns the cycle-detection ticket for the requested path until it reaches a terminal state or is
/// dropped. The ticket ties the job to the thread that created it.
pub struct InteractiveLoad {
    manager: ResourceManager,
    // Path as given by the caller, passed to the loaded callback
    requested_path: String,
    // Canonical path, the cache key
    local_path: String,
    // Path the loader actually reads
    remapped_path: String,
    job: Option<Box<dyn InteractiveLoader>>,
    state: JobState,
    ticket: Option<LoadingTicket>,
    no_cache: bool,
    translation_remapped: bool,
    // Resource came straight out of the cache, nothing to register on completion
    from_cache: bool,
}

impl InteractiveLoad {
    pub(crate) fn new(
        manager: ResourceManager,
        requested_path: &str,
        local_path: &str,
        remapped_path: &str,
        job: Box<dyn InteractiveLoader>,
        ticket: Option<LoadingTicket>,
        no_cache: bool,
        translation_remapped: bool,
    ) -> Self {
        InteractiveLoad {
            manager,
            requested_path: requested_path.to_string(),
            local_path: local_path.to_string(),
            remapped_path: remapped_path.to_string(),
            job: Some(job),
            state: JobState::Fresh,
            ticket,
            no_cache,
            translation_remapped,
            from_cache: false,
        }
    }

    pub(crate) fn from_cache(
        manager: ResourceManager,
        local_path: &str,
        resource: ResourceHandle,
    ) -> Self {
        InteractiveLoad {
            manager,
            requested_path: local_path.to_string(),
            local_path: local_path.to_string(),
            remapped_path: local_path.to_string(),
            job: Some(Box::new(CompletedInteractiveLoader::new(Ok(resource)))),
            state: JobState::Fresh,
            ticket: None,
            no_cache: false,
            translation_remapped: false,
            from_cache: true,
        }
    }

    /// Canonical path of the resource being loaded
    pub fn path(&self) -> &str {
        &self.local_path
    }

    /// Path after remapping, what the format loader reads
    pub fn remapped_path(&self) -> &str {
        &self.remapped_path
    }

    pub fn state(&self) -> InteractiveLoadState {
        match self.state {
            JobState::Fresh => InteractiveLoadState::Fresh,
            JobState::Running => InteractiveLoadState::Running,
            JobState::Success(_) => InteractiveLoadState::Success,
            JobState::Failure(_) => InteractiveLoadState::Failure,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, JobState::Success(_) | JobState::Failure(_))
    }

    /// True while this job holds the cycle-detection ticket for its path
    pub fn holds_ticket(&self) -> bool {
        self.ticket.is_some()
    }

    pub fn stage(&self) -> usize {
        self.job.as_ref().map(|x| x.stage()).unwrap_or(0)
    }

    pub fn stage_count(&self) -> usize {
        self.job.as_ref().map(|x| x.stage_count()).unwrap_or(0)
    }

    /// The resource, after the job succeeded
    pub fn resource(&self) -> Option<ResourceHandle> {
        match &self.state {
            JobState::Success(resource) => Some(resource.clone()),
            _ => None,
        }
    }

    /// The error, after the job failed
    pub fn error(&self) -> Option<&LoadError> {
        match &self.state {
            JobState::Failure(e) => Some(e),
            _ => None,
        }
    }

    /// Advance the load by one step. Polling a finished job returns its final status again.
    pub fn poll(&mut self) -> LoadStatus {
        profiling::scope!("InteractiveLoad::poll");
        if let Some(status) = self.terminal_status() {
            return status;
        }

        self.state = JobState::Running;
        let status = match self.job.as_mut() {
            Some(job) => job.poll(),
            None => LoadStatus::Failed(LoadError::CantOpen(self.local_path.clone())),
        };
        self.advance(status)
    }

    /// Polls until the job finishes, returning the resource
    pub fn wait(&mut self) -> LoadResult<ResourceHandle> {
        profiling::scope!("InteractiveLoad::wait");
        if self.terminal_status().is_none() {
            self.state = JobState::Running;
            let status = match self.job.as_mut() {
                Some(job) => job.wait(),
                None => LoadStatus::Failed(LoadError::CantOpen(self.local_path.clone())),
            };
            self.advance(status);
        }

        // Finished jobs report their final status immediately. Otherwise the handler's wait gave
        // up early and we fall back to polling.
        loop {
            match self.poll() {
                LoadStatus::InProgress => continue,
                LoadStatus::Done => {
                    return self
                        .resource()
                        .ok_or_else(|| LoadError::CantOpen(self.local_path.clone()))
                }
                LoadStatus::Failed(e) => return Err(e),
            }
        }
    }

    fn terminal_status(&self) -> Option<LoadStatus> {
        match &self.state {
            JobState::Success(_) => Some(LoadStatus::Done),
            JobState::Failure(e) => Some(LoadStatus::Failed(e.clone())),
            _ => None,
        }
    }

    fn advance(
        &mut self,
        status: LoadStatus,
    ) -> LoadStatus {
        match status {
            LoadStatus::InProgress => LoadStatus::InProgress,
            LoadStatus::Done => match self.complete() {
                Ok(resource) => {
                    self.state = JobState::Success(resource);
                    LoadStatus::Done
                }
                Err(e) => {
                    self.fail(e.clone());
                    LoadStatus::Failed(e)
                }
            },
            LoadStatus::Failed(e) => {
                self.fail(e.clone());
                LoadStatus::Failed(e)
            }
        }
    }

    fn complete(&mut self) -> LoadResult<ResourceHandle> {
        let resource = self
            .job
            .as_ref()
            .and_then(|x| x.resource())
            .ok_or_else(|| LoadError::LoadFailed {
                path: self.remapped_path.clone(),
                cause: None,
            })?;

        if self.from_cache {
            return Ok(resource);
        }

        let resource = self.manager.complete_load(
            &self.local_path,
            &self.remapped_path,
            resource,
            self.no_cache,
            self.translation_remapped,
        );

        self.ticket = None;
        self.manager
            .notify_loaded(&resource, &self.requested_path);
        Ok(resource)
    }

    fn fail(
        &mut self,
        error: LoadError,
    ) {
        log::debug!("Interactive load of {} failed: {}", self.local_path, error);
        self.state = JobState::Failure(error);
        self.ticket = None;
    }
}

impl Drop for InteractiveLoad {
    fn drop(&mut self) {
        if !self.is_finished() {
            log::debug!("Interactive load of {} canceled", self.local_path);
        }

        // Let the handler release its partial state before the path is released for reloading
        self.job = None;
        self.ticket = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockpile_base::{ErrorKind, Resource, ResourceCore};
    use std::sync::Arc;

    #[derive(Default)]
    struct TestResource {
        core: ResourceCore,
    }

    impl Resource for TestResource {
        fn core(&self) -> &ResourceCore {
            &self.core
        }

        fn resource_type(&self) -> &str {
            "TestResource"
        }
    }

    #[test]
    fn completed_loader_reports_on_first_poll() {
        let mut job = CompletedInteractiveLoader::new(Ok(Arc::new(TestResource::default())));
        assert!(job.resource().is_none());
        assert_eq!(job.stage(), 0);
        assert!(matches!(job.poll(), LoadStatus::Done));
        assert!(job.resource().is_some());
        assert_eq!(job.stage(), job.stage_count());
    }

    #[test]
    fn completed_loader_reports_errors() {
        let mut job =
            CompletedInteractiveLoader::new(Err(LoadError::CantOpen("res://a.png".to_string())));
        match job.wait() {
            LoadStatus::Failed(e) => assert_eq!(e.kind(), ErrorKind::CantOpen),
            _ => unreachable!(),
        }
        assert!(job.resource().is_none());
    }
}
