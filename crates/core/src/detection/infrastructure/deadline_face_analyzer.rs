use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_analyzer::{AdapterError, FaceAnalyzer};
use crate::shared::frame::Frame;

type Reply = (u64, Result<Vec<Detection>, AdapterError>);

struct Job {
    id: u64,
    frame: Frame,
}

/// Decorator that bounds every `analyze` call with a deadline.
///
/// The inner analyzer lives on a dedicated worker thread. When a call
/// overruns, the caller gets [`AdapterError::Timeout`] immediately; the
/// late reply is discarded when it eventually arrives. At most one job
/// waits behind the running one; while that slot is taken, calls time out
/// at once without queueing their frame.
pub struct DeadlineFaceAnalyzer {
    jobs: Sender<Job>,
    replies: Receiver<Reply>,
    timeout: Duration,
    next_id: u64,
}

impl DeadlineFaceAnalyzer {
    pub fn new(mut inner: Box<dyn FaceAnalyzer>, timeout: Duration) -> Self {
        let (jobs, job_rx) = crossbeam_channel::bounded::<Job>(1);
        let (reply_tx, replies) = crossbeam_channel::unbounded::<Reply>();

        thread::spawn(move || {
            for job in job_rx {
                let result = inner.analyze(&job.frame);
                if reply_tx.send((job.id, result)).is_err() {
                    break;
                }
            }
        });

        Self {
            jobs,
            replies,
            timeout,
            next_id: 0,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl FaceAnalyzer for DeadlineFaceAnalyzer {
    fn analyze(&mut self, frame: &Frame) -> Result<Vec<Detection>, AdapterError> {
        if self.jobs.is_full() {
            log::debug!("Analysis worker busy; skipping frame");
            return Err(AdapterError::Timeout(self.timeout));
        }

        let id = self.next_id;
        self.next_id += 1;

        let deadline = Instant::now() + self.timeout;
        let job = Job {
            id,
            frame: frame.clone(),
        };
        match self.jobs.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => return Err(AdapterError::Timeout(self.timeout)),
            Err(TrySendError::Disconnected(_)) => return Err(worker_stopped()),
        }

        loop {
            match self.replies.recv_deadline(deadline) {
                Ok((reply_id, result)) if reply_id == id => return result,
                Ok((stale, _)) => log::debug!("Discarding late analysis reply #{stale}"),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(AdapterError::Timeout(self.timeout));
                }
                Err(RecvTimeoutError::Disconnected) => return Err(worker_stopped()),
            }
        }
    }
}

fn worker_stopped() -> AdapterError {
    AdapterError::Unavailable("analysis worker stopped".into())
}
