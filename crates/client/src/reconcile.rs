//! The union point of the push and polling observers.
//!
//! Observations may arrive twice, late or out of order. The reconciler
//! keeps the furthest-along state, applies a terminal transition exactly
//! once and never publishes `completed` without a result URL.

use printframe_core::status::UpscaleStatus;
use printframe_core::types::DbId;
use printframe_core::upscale_job::JobStatusSnapshot;

/// What the UI renders for a job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobView {
    pub job_id: DbId,
    pub status: UpscaleStatus,
    /// Present exactly when `status` is completed.
    pub result_url: Option<String>,
    pub error_message: Option<String>,
}

/// Result of feeding one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Stale, duplicate or arrived after the terminal state.
    Ignored,
    /// The published view changed.
    Updated,
    /// The job finished but its result URL is not known yet; fetch a
    /// fresh snapshot and feed it back.
    NeedsSnapshot,
}

#[derive(Debug)]
pub struct Reconciler {
    job_id: DbId,
    view: Option<JobView>,
}

impl Reconciler {
    pub fn new(job_id: DbId) -> Self {
        Self { job_id, view: None }
    }

    pub fn view(&self) -> Option<&JobView> {
        self.view.as_ref()
    }

    /// True once a terminal state has been applied. Nothing changes after.
    pub fn is_settled(&self) -> bool {
        self.view.as_ref().is_some_and(|v| v.status.is_terminal())
    }

    /// Feed a push event. Push events never carry the result URL.
    pub fn apply_push(&mut self, job_id: DbId, status: UpscaleStatus, error_message: Option<String>) -> Outcome {
        if job_id != self.job_id || !self.advances(status) {
            return Outcome::Ignored;
        }
        if status == UpscaleStatus::Completed {
            return Outcome::NeedsSnapshot;
        }
        self.publish(JobView {
            job_id,
            status,
            result_url: None,
            error_message,
        })
    }

    /// Feed an authoritative status snapshot from the API.
    pub fn apply_snapshot(&mut self, snapshot: &JobStatusSnapshot) -> Outcome {
        if snapshot.job_id != self.job_id || !self.advances(snapshot.status) {
            return Outcome::Ignored;
        }
        let result_url = match snapshot.status {
            UpscaleStatus::Completed => match &snapshot.result_url {
                Some(url) => Some(url.clone()),
                None => return Outcome::NeedsSnapshot,
            },
            _ => None,
        };
        self.publish(JobView {
            job_id: snapshot.job_id,
            status: snapshot.status,
            result_url,
            error_message: snapshot.error_message.clone(),
        })
    }

    /// Whether `status` is at least as far along as the current view.
    fn advances(&self, status: UpscaleStatus) -> bool {
        match &self.view {
            None => true,
            Some(current) if current.status.is_terminal() => false,
            Some(current) => status.rank() >= current.status.rank(),
        }
    }

    fn publish(&mut self, next: JobView) -> Outcome {
        // An equal-rank repeat without the message must not wipe it.
        let next = match &self.view {
            Some(current) if current.status == next.status && next.error_message.is_none() => JobView {
                error_message: current.error_message.clone(),
                ..next
            },
            _ => next,
        };
        if self.view.as_ref() == Some(&next) {
            return Outcome::Ignored;
        }
        self.view = Some(next);
        Outcome::Updated
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn snapshot(status: UpscaleStatus, result_url: Option<&str>) -> JobStatusSnapshot {
        JobStatusSnapshot {
            job_id: 1,
            status,
            result_url: result_url.map(str::to_string),
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn status_never_regresses() {
        let mut r = Reconciler::new(1);
        assert_eq!(r.apply_push(1, UpscaleStatus::Processing, None), Outcome::Updated);
        assert_eq!(r.apply_snapshot(&snapshot(UpscaleStatus::Pending, None)), Outcome::Ignored);
        assert_eq!(r.view().unwrap().status, UpscaleStatus::Processing);
    }

    #[test]
    fn duplicates_from_both_observers_are_ignored() {
        let mut r = Reconciler::new(1);
        assert_eq!(r.apply_snapshot(&snapshot(UpscaleStatus::Processing, None)), Outcome::Updated);
        assert_eq!(r.apply_push(1, UpscaleStatus::Processing, None), Outcome::Ignored);
        assert_eq!(r.apply_snapshot(&snapshot(UpscaleStatus::Processing, None)), Outcome::Ignored);
    }

    #[test]
    fn completed_push_asks_for_a_snapshot_instead_of_publishing() {
        let mut r = Reconciler::new(1);
        r.apply_push(1, UpscaleStatus::Processing, None);
        assert_eq!(r.apply_push(1, UpscaleStatus::Completed, None), Outcome::NeedsSnapshot);
        assert_eq!(r.view().unwrap().status, UpscaleStatus::Processing);
        assert!(!r.is_settled());
    }

    #[test]
    fn completed_snapshot_without_url_is_not_published() {
        let mut r = Reconciler::new(1);
        assert_eq!(r.apply_snapshot(&snapshot(UpscaleStatus::Completed, None)), Outcome::NeedsSnapshot);
        assert!(r.view().is_none());

        assert_eq!(
            r.apply_snapshot(&snapshot(UpscaleStatus::Completed, Some("https://signed/r.jpg"))),
            Outcome::Updated
        );
        let view = r.view().unwrap();
        assert_eq!(view.result_url.as_deref(), Some("https://signed/r.jpg"));
        assert!(r.is_settled());
    }

    #[test]
    fn terminal_transition_is_applied_once() {
        let mut r = Reconciler::new(1);
        r.apply_snapshot(&snapshot(UpscaleStatus::Completed, Some("https://signed/a.jpg")));
        assert_eq!(
            r.apply_snapshot(&snapshot(UpscaleStatus::Completed, Some("https://signed/b.jpg"))),
            Outcome::Ignored
        );
        assert_eq!(r.apply_push(1, UpscaleStatus::Failed, Some("late".into())), Outcome::Ignored);
        assert_eq!(r.view().unwrap().result_url.as_deref(), Some("https://signed/a.jpg"));
    }

    #[test]
    fn failure_push_is_terminal_with_its_message() {
        let mut r = Reconciler::new(1);
        assert_eq!(
            r.apply_push(1, UpscaleStatus::Failed, Some("Upscaler returned 500".into())),
            Outcome::Updated
        );
        assert!(r.is_settled());
        assert_eq!(r.view().unwrap().error_message.as_deref(), Some("Upscaler returned 500"));
    }

    #[test]
    fn other_jobs_are_ignored() {
        let mut r = Reconciler::new(1);
        assert_eq!(r.apply_push(2, UpscaleStatus::Processing, None), Outcome::Ignored);
        assert!(r.view().is_none());
    }
}
