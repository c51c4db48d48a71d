//! Shared fixtures for the integration tests
//!
//! `ScriptedEngine` plays the native engine: every accepted upload runs its
//! script on a worker thread and reports through the notification sink.

#![allow(dead_code)]

use media_upload_bridge::{
    CompletionPayload, EngineFailure, ErrorEvent, EventBus, ListenerHandle, NotificationSink,
    ProgressEvent, UploadEngine, UploadRequest, UploadedFile,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

#[derive(Clone)]
pub enum Step {
    Progress(f64),
    /// Succeed, echoing the request's tags and metadata
    Complete,
    /// Succeed with a transcription attached
    CompleteWithTranscription(&'static str, f64),
    Fail(&'static str),
    /// Block until the test opens the gate
    Gate,
}

pub struct ScriptedEngine {
    script: Vec<Step>,
    queued: Mutex<VecDeque<Vec<Step>>>,
    refuse_start: Option<EngineFailure>,
    started: AtomicUsize,
    gate: Mutex<Option<Receiver<()>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ScriptedEngine {
    /// Every upload runs `script`
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script,
            queued: Mutex::new(VecDeque::new()),
            refuse_start: None,
            started: AtomicUsize::new(0),
            gate: Mutex::new(None),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// The n-th upload runs the n-th script; later uploads complete immediately
    pub fn sequence(scripts: Vec<Vec<Step>>) -> Self {
        let engine = Self::new(vec![Step::Complete]);
        *engine.queued.lock().unwrap() = scripts.into();
        engine
    }

    /// An engine that refuses every start
    pub fn refusing(failure: EngineFailure) -> Self {
        Self {
            refuse_start: Some(failure),
            ..Self::new(Vec::new())
        }
    }

    /// Install a gate and return the sender that opens it
    pub fn gated(script: Vec<Step>) -> (Self, Sender<()>) {
        let (tx, rx) = channel();
        let engine = Self::new(script);
        *engine.gate.lock().unwrap() = Some(rx);
        (engine, tx)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Wait for every worker thread to finish its script
    pub fn join_workers(&self) {
        let workers: Vec<_> = self.workers.lock().unwrap().drain(..).collect();
        for worker in workers {
            worker.join().unwrap();
        }
    }
}

impl UploadEngine for ScriptedEngine {
    fn start_upload(
        &self,
        request: &UploadRequest,
        sink: NotificationSink,
    ) -> Result<(), EngineFailure> {
        if let Some(failure) = &self.refuse_start {
            return Err(failure.clone());
        }
        self.started.fetch_add(1, Ordering::SeqCst);

        let script = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.script.clone());
        let gate = self.gate.lock().unwrap().take();
        let url = format!("https://cdn.example.com/{}.mp4", request.id());
        let tags = request.tags().clone();
        let metadata = request.metadata().clone();

        let worker = thread::spawn(move || {
            for step in script {
                match step {
                    Step::Progress(p) => sink.progress(p),
                    Step::Complete => sink.complete(
                        UploadedFile::new(url.clone())
                            .tags(tags.clone())
                            .metadata(metadata.clone()),
                    ),
                    Step::CompleteWithTranscription(t, len) => sink.complete(
                        UploadedFile::new(url.clone())
                            .tags(tags.clone())
                            .metadata(metadata.clone())
                            .transcription(t, len),
                    ),
                    Step::Fail(message) => {
                        sink.fail(EngineFailure::new(message).with_cause("remote endpoint"))
                    }
                    Step::Gate => {
                        if let Some(gate) = &gate {
                            let _ = gate.recv();
                        }
                    }
                }
            }
        });
        self.workers.lock().unwrap().push(worker);

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Progress(ProgressEvent),
    Completion(CompletionPayload),
    Error(ErrorEvent),
}

/// Everything delivered on the bus, in delivery order
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Recorded>>>,
}

impl EventLog {
    pub fn attach(bus: &EventBus) -> (Self, Vec<ListenerHandle>) {
        let log = Self::default();
        let p = log.clone();
        let c = log.clone();
        let e = log.clone();
        let handles = vec![
            bus.subscribe_progress(move |ev| p.push(Recorded::Progress(ev.clone()))),
            bus.subscribe_completion(move |ev| c.push(Recorded::Completion(ev.clone()))),
            bus.subscribe_error(move |ev| e.push(Recorded::Error(ev.clone()))),
        ];
        (log, handles)
    }

    fn push(&self, event: Recorded) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<ProgressEvent> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Progress(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn terminal_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| !matches!(e, Recorded::Progress(_)))
            .count()
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
