//! Progress reporting for publish operations
//!
//! The reconciler reports each stage transition and per-file event to an
//! injected observer instead of writing to a global logger directly.

use std::cell::RefCell;
use std::fmt;
use std::path::Path;

/// Stages of a publish operation, in the order they are entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PublishStage {
    Searching,
    Found,
    Creating,
    Archiving,
    Uploading,
    Verifying,
    Annotating,
    Publishing,
    RollingBack,
    Done,
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishStage::Searching => "searching",
            PublishStage::Found => "found",
            PublishStage::Creating => "creating",
            PublishStage::Archiving => "archiving",
            PublishStage::Uploading => "uploading",
            PublishStage::Verifying => "verifying",
            PublishStage::Annotating => "annotating",
            PublishStage::Publishing => "publishing",
            PublishStage::RollingBack => "rolling back",
            PublishStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Per-file events during the upload stage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileEvent {
    Uploaded,
    Replaced,
    SkippedMissing,
    Unchanged,
}

pub trait PublishObserver {
    fn stage(&self, stage: PublishStage);

    fn file(&self, _path: &Path, _event: FileEvent) {}
}

/// Forwards progress to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl PublishObserver for TracingObserver {
    fn stage(&self, stage: PublishStage) {
        tracing::info!("Stage: {}", stage);
    }

    fn file(&self, path: &Path, event: FileEvent) {
        match event {
            FileEvent::Uploaded => tracing::info!("Uploaded {}", path.display()),
            FileEvent::Replaced => {
                tracing::info!("Replaced existing remote copy of {}", path.display())
            }
            FileEvent::SkippedMissing => {
                tracing::warn!("Skipping {}: file does not exist locally", path.display())
            }
            FileEvent::Unchanged => tracing::debug!("Unchanged since last upload: {}", path.display()),
        }
    }
}

/// Keeps every reported stage; handy for asserting on the state machine.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    stages: RefCell<Vec<PublishStage>>,
}

impl RecordingObserver {
    pub fn stages(&self) -> Vec<PublishStage> {
        self.stages.borrow().clone()
    }

    pub fn reached(&self, stage: PublishStage) -> bool {
        self.stages.borrow().contains(&stage)
    }
}

impl PublishObserver for RecordingObserver {
    fn stage(&self, stage: PublishStage) {
        self.stages.borrow_mut().push(stage);
    }
}

impl<T: PublishObserver + ?Sized> PublishObserver for std::rc::Rc<T> {
    fn stage(&self, stage: PublishStage) {
        (**self).stage(stage)
    }

    fn file(&self, path: &Path, event: FileEvent) {
        (**self).file(path, event)
    }
}
