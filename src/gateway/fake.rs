//! Scripted gateways for tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{ChatPrompt, GatewayError, LlmGateway, SpeechRequest, TtsGateway};

/// Replays queued results; once the queue is empty every call echoes the
/// user message back as `"reply to: <message>"`.
#[derive(Default)]
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<String, GatewayError>>>,
    prompts: Mutex<Vec<ChatPrompt>>,
}

impl ScriptedLlm {
    pub fn with_script(script: Vec<Result<String, GatewayError>>) -> Self {
        ScriptedLlm {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<ChatPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmGateway for ScriptedLlm {
    async fn complete(&self, prompt: &ChatPrompt) -> Result<String, GatewayError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(format!("reply to: {}", prompt.user)),
        }
    }
}

/// Returns a tiny WAV for every request, or fails every request when down.
pub struct FakeTts {
    down: bool,
    calls: AtomicUsize,
    requests: Mutex<Vec<SpeechRequest>>,
}

impl FakeTts {
    pub const WAV: &'static [u8] = b"RIFF\x24\x00\x00\x00WAVEfmt ";

    pub fn up() -> Self {
        FakeTts {
            down: false,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn down() -> Self {
        FakeTts {
            down: true,
            ..FakeTts::up()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SpeechRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TtsGateway for FakeTts {
    async fn speak(&self, request: &SpeechRequest) -> Result<Bytes, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if self.down {
            return Err(GatewayError::Failed("TTS service returned 503 Service Unavailable".into()));
        }
        Ok(Bytes::from_static(FakeTts::WAV))
    }
}
