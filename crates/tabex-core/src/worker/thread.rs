//! Dedicated background thread serving extraction requests.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, trace};

use super::{ExtractRequest, WorkerMessage, handle_with};
use crate::error::{Result, TabexError, WorkerError};
use crate::models::config::TabexConfig;
use crate::models::table::Table;
use crate::pdf::{PdfExtractor, PdfProcessor};

type Job = (ExtractRequest, Sender<WorkerMessage>);

/// Background extraction worker.
///
/// Requests are processed one at a time, in submission order, on a single
/// dedicated thread. The caller and the worker share nothing but channels.
/// There is no cancellation: a submitted request runs to completion or
/// error even if its receiver is dropped.
pub struct TableWorker {
    requests: Sender<Job>,
    thread: JoinHandle<()>,
}

impl TableWorker {
    /// Start the worker thread.
    pub fn spawn(config: TabexConfig) -> Result<Self> {
        Self::spawn_with(config, |config: &TabexConfig| {
            PdfExtractor::new().with_skip_blank(config.extraction.skip_blank_fragments)
        })
    }

    /// Start the worker thread with a custom PDF processor, built fresh for
    /// every request.
    pub fn spawn_with<P, F>(config: TabexConfig, make_processor: F) -> Result<Self>
    where
        P: PdfProcessor + Sync,
        F: Fn(&TabexConfig) -> P + Send + 'static,
    {
        config.validate()?;
        let (requests, jobs) = unbounded::<Job>();

        let thread = thread::Builder::new()
            .name("tabex-worker".to_string())
            .spawn(move || serve(jobs, config, make_processor))
            .map_err(|e| WorkerError::Spawn(e.to_string()))?;

        Ok(Self { requests, thread })
    }

    /// Queue a request and return the receiver of its messages.
    pub fn submit(&self, request: ExtractRequest) -> Result<Receiver<WorkerMessage>> {
        let (reply, messages) = unbounded();
        self.requests
            .send((request, reply))
            .map_err(|_| WorkerError::Disconnected)?;
        Ok(messages)
    }

    /// Submit a request and block until it finishes, forwarding progress.
    pub fn extract(&self, request: ExtractRequest, mut on_progress: impl FnMut(f64)) -> Result<Table> {
        let messages = self.submit(request)?;

        for message in messages {
            match message {
                WorkerMessage::Progress { value } => on_progress(value),
                WorkerMessage::Complete { data } => return Ok(data),
                WorkerMessage::Error { error } => return Err(TabexError::Extraction(error)),
            }
        }

        Err(WorkerError::Disconnected.into())
    }

    /// Stop accepting requests and wait for queued ones to finish.
    pub fn shutdown(self) -> Result<()> {
        let Self { requests, thread } = self;
        drop(requests);
        thread
            .join()
            .map_err(|_| WorkerError::Spawn("worker thread panicked".to_string()))?;
        Ok(())
    }
}

fn serve<P, F>(jobs: Receiver<Job>, config: TabexConfig, make_processor: F)
where
    P: PdfProcessor + Sync,
    F: Fn(&TabexConfig) -> P,
{
    debug!("Worker started");

    for (request, reply) in jobs {
        handle_with(make_processor(&config), request, &config, |message| {
            // The requester may have gone away; the request still runs to
            // completion.
            if reply.send(message).is_err() {
                trace!("Dropping message for disconnected requester");
            }
        });
    }

    debug!("Worker stopped");
}
