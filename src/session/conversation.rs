use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{from_data_url, to_data_url, AudioOutput, Debouncer, SessionBackend, SessionError};
use crate::models::{Conversation, Message, Role};
use crate::types::SaveConversationRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Sending,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Synthesize every assistant reply in the background as it arrives.
    pub auto_voice: bool,
    pub save_debounce: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            auto_voice: true,
            save_debounce: Duration::from_secs(1),
        }
    }
}

struct State {
    conversation_id: Option<Uuid>,
    messages: Vec<Message>,
    status: SessionStatus,
    /// Index of the user message whose send has not been answered yet.
    unconfirmed: Option<usize>,
    now_playing: Option<usize>,
}

impl State {
    /// The transcript minus any message still waiting on the server.
    fn confirmed(&self) -> &[Message] {
        &self.messages[..self.unconfirmed.unwrap_or(self.messages.len())]
    }
}

struct Shared {
    backend: Arc<dyn SessionBackend>,
    output: Arc<dyn AudioOutput>,
    character_id: Uuid,
    auto_voice: bool,
    state: Mutex<State>,
    save_lock: tokio::sync::Mutex<()>,
    debouncer: Debouncer,
    saves: AtomicUsize,
    voice_jobs: AtomicUsize,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds an activity counter up for as long as it lives, so an abandoned
/// future cannot leave it raised.
struct Activity<'a>(&'a AtomicUsize);

impl<'a> Activity<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Activity(counter)
    }
}

impl Drop for Activity<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The optimistic user message of a send in progress. Unless confirmed, it
/// is withdrawn on drop, including when the send future is abandoned.
struct PendingSend<'a> {
    shared: &'a Shared,
    rollback_len: usize,
    confirmed: bool,
}

impl<'a> PendingSend<'a> {
    fn begin(shared: &'a Shared, text: &str) -> Result<Self, SessionError> {
        let mut state = shared.state();
        if state.status == SessionStatus::Sending {
            return Err(SessionError::Busy);
        }
        let rollback_len = state.messages.len();
        state.status = SessionStatus::Sending;
        state.messages.push(Message::user(text));
        state.unconfirmed = Some(rollback_len);

        Ok(PendingSend {
            shared,
            rollback_len,
            confirmed: false,
        })
    }

    /// Appends the reply and returns its index.
    fn confirm(mut self, reply: &str) -> usize {
        let shared = self.shared;
        let mut state = shared.state();
        state.messages.push(Message::assistant(reply));
        state.status = SessionStatus::Idle;
        state.unconfirmed = None;
        self.confirmed = true;
        state.messages.len() - 1
    }
}

impl Drop for PendingSend<'_> {
    fn drop(&mut self) {
        if self.confirmed {
            return;
        }
        // Only a send appends, so everything past the old length is ours.
        // Voice patches on earlier messages stay.
        let mut state = self.shared.state();
        state.messages.truncate(self.rollback_len);
        state.status = SessionStatus::Idle;
        state.unconfirmed = None;
    }
}

/// One open chat screen. Cloning is cheap and every clone drives the same
/// transcript.
#[derive(Clone)]
pub struct ConversationSession {
    shared: Arc<Shared>,
}

impl ConversationSession {
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        output: Arc<dyn AudioOutput>,
        character_id: Uuid,
        options: SessionOptions,
    ) -> Self {
        Self::build(backend, output, character_id, None, Vec::new(), options)
    }

    /// Continues a stored conversation; later saves update it in place.
    pub fn resume(
        backend: Arc<dyn SessionBackend>,
        output: Arc<dyn AudioOutput>,
        conversation: Conversation,
        options: SessionOptions,
    ) -> Self {
        Self::build(
            backend,
            output,
            conversation.character_id,
            Some(conversation.id),
            conversation.messages,
            options,
        )
    }

    fn build(
        backend: Arc<dyn SessionBackend>,
        output: Arc<dyn AudioOutput>,
        character_id: Uuid,
        conversation_id: Option<Uuid>,
        messages: Vec<Message>,
        options: SessionOptions,
    ) -> Self {
        ConversationSession {
            shared: Arc::new(Shared {
                backend,
                output,
                character_id,
                auto_voice: options.auto_voice,
                state: Mutex::new(State {
                    conversation_id,
                    messages,
                    status: SessionStatus::Idle,
                    unconfirmed: None,
                    now_playing: None,
                }),
                save_lock: tokio::sync::Mutex::new(()),
                debouncer: Debouncer::new(options.save_debounce),
                saves: AtomicUsize::new(0),
                voice_jobs: AtomicUsize::new(0),
            }),
        }
    }

    pub fn character_id(&self) -> Uuid {
        self.shared.character_id
    }

    pub fn conversation_id(&self) -> Option<Uuid> {
        self.shared.state().conversation_id
    }

    pub fn messages(&self) -> Vec<Message> {
        self.shared.state().messages.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.state().status
    }

    pub fn is_saving(&self) -> bool {
        self.shared.saves.load(Ordering::SeqCst) > 0
    }

    pub fn is_generating_voice(&self) -> bool {
        self.shared.voice_jobs.load(Ordering::SeqCst) > 0
    }

    pub fn now_playing(&self) -> Option<usize> {
        self.shared.state().now_playing
    }

    /// Sends `text` and returns the character's reply. The user message shows
    /// up immediately and is withdrawn if the exchange fails.
    pub async fn send(&self, text: &str) -> Result<String, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::Validation("message is empty".into()));
        }

        let pending = PendingSend::begin(&self.shared, text)?;

        let reply = match self.shared.backend.chat(self.shared.character_id, text).await {
            Ok(reply) => reply,
            Err(err) => {
                drop(pending);
                warn!("Send failed, withdrew message: {}", err);
                return Err(err);
            }
        };
        let index = pending.confirm(&reply);

        self.schedule_save();

        if self.shared.auto_voice {
            let session = self.clone();
            tokio::spawn(async move {
                if let Err(err) = session.generate_voice(index).await {
                    warn!("Voice generation for message {} failed: {}", index, err);
                }
            });
        }

        Ok(reply)
    }

    /// Synthesizes the assistant message at `index` and stores the audio on
    /// it. A message that already has audio is left untouched.
    pub async fn generate_voice(&self, index: usize) -> Result<(), SessionError> {
        let text = {
            let state = self.shared.state();
            match state.messages.get(index) {
                Some(message) if message.role == Role::Assistant => {
                    if message.voice_url.is_some() {
                        return Ok(());
                    }
                    message.content.clone()
                }
                _ => {
                    return Err(SessionError::Validation(format!(
                        "message {} is not an assistant reply",
                        index
                    )))
                }
            }
        };

        let audio = {
            let _active = Activity::enter(&self.shared.voice_jobs);
            self.shared
                .backend
                .synthesize(self.shared.character_id, &text)
                .await?
        };

        let patched = {
            let mut state = self.shared.state();
            match state.messages.get_mut(index) {
                Some(message) if message.voice_url.is_none() && message.content == text => {
                    message.voice_url = Some(to_data_url(&audio));
                    true
                }
                _ => false,
            }
        };

        if patched {
            debug!("Attached {} bytes of audio to message {}", audio.len(), index);
            self.schedule_save();
        }
        Ok(())
    }

    /// Saves right away instead of waiting out the debounce. Returns the
    /// conversation id, or `None` when there is nothing to persist yet.
    pub async fn flush(&self) -> Result<Option<Uuid>, SessionError> {
        self.shared.debouncer.cancel();

        let empty = self.shared.state().confirmed().is_empty();
        if empty {
            return Ok(self.conversation_id());
        }
        self.save_now().await.map(Some)
    }

    /// Plays the audio attached to message `index`, stopping whatever was
    /// playing before.
    pub fn play(&self, index: usize) -> Result<(), SessionError> {
        let mut state = self.shared.state();
        let voice_url = state
            .messages
            .get(index)
            .and_then(|message| message.voice_url.as_deref())
            .ok_or_else(|| SessionError::Audio(format!("message {} has no audio", index)))?;
        let audio = from_data_url(voice_url)?;

        if state.now_playing.take().is_some() {
            self.shared.output.stop();
        }
        self.shared.output.start(audio)?;
        state.now_playing = Some(index);
        Ok(())
    }

    pub fn stop(&self) {
        if self.shared.state().now_playing.take().is_some() {
            self.shared.output.stop();
        }
    }

    fn schedule_save(&self) {
        let session = self.clone();
        self.shared.debouncer.schedule(async move {
            if let Err(err) = session.save_now().await {
                error!("Failed to save conversation: {}", err);
            }
        });
    }

    /// Saves are serialized so a save without an id always finishes, and its
    /// id is adopted, before the next one builds its request. A message still
    /// being sent is left out until the server has answered it.
    async fn save_now(&self) -> Result<Uuid, SessionError> {
        let _guard = self.shared.save_lock.lock().await;

        let request = {
            let state = self.shared.state();
            SaveConversationRequest {
                conversation_id: state.conversation_id,
                character_id: self.shared.character_id,
                title: None,
                messages: state.confirmed().to_vec(),
            }
        };

        let id = {
            let _active = Activity::enter(&self.shared.saves);
            self.shared.backend.save(&request).await?
        };

        let mut state = self.shared.state();
        if state.conversation_id.is_none() {
            info!("Conversation {} created", id);
        }
        state.conversation_id = Some(id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::Utc;
    use std::collections::VecDeque;
    use tokio::time::{sleep, timeout};

    const WAV: &[u8] = b"RIFF\x24\x00\x00\x00WAVEfmt ";

    #[derive(Default)]
    struct FakeBackend {
        chat_delay: Duration,
        synth_delay: Duration,
        save_delay: Duration,
        chat_failures: Mutex<VecDeque<SessionError>>,
        saves: Mutex<Vec<SaveConversationRequest>>,
        created: Mutex<Vec<Uuid>>,
    }

    impl FakeBackend {
        fn saves(&self) -> Vec<SaveConversationRequest> {
            self.saves.lock().unwrap().clone()
        }

        fn created(&self) -> Vec<Uuid> {
            self.created.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SessionBackend for FakeBackend {
        async fn chat(&self, _character_id: Uuid, message: &str) -> Result<String, SessionError> {
            sleep(self.chat_delay).await;
            if let Some(err) = self.chat_failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            Ok(format!("reply to: {}", message))
        }

        async fn synthesize(&self, _character_id: Uuid, _text: &str) -> Result<Bytes, SessionError> {
            sleep(self.synth_delay).await;
            Ok(Bytes::from_static(WAV))
        }

        async fn save(&self, request: &SaveConversationRequest) -> Result<Uuid, SessionError> {
            self.saves.lock().unwrap().push(request.clone());
            sleep(self.save_delay).await;
            Ok(match request.conversation_id {
                Some(id) => id,
                None => {
                    let id = Uuid::new_v4();
                    self.created.lock().unwrap().push(id);
                    id
                }
            })
        }
    }

    #[derive(Default)]
    struct FakeOutput {
        events: Mutex<Vec<String>>,
    }

    impl AudioOutput for FakeOutput {
        fn start(&self, audio: Bytes) -> Result<(), SessionError> {
            self.events.lock().unwrap().push(format!("start {}", audio.len()));
            Ok(())
        }

        fn stop(&self) {
            self.events.lock().unwrap().push("stop".into());
        }
    }

    fn quiet() -> SessionOptions {
        SessionOptions {
            auto_voice: false,
            ..Default::default()
        }
    }

    fn session(backend: &Arc<FakeBackend>, options: SessionOptions) -> ConversationSession {
        ConversationSession::new(
            backend.clone(),
            Arc::new(FakeOutput::default()),
            Uuid::new_v4(),
            options,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn sends_within_the_window_share_one_save() {
        let backend = Arc::new(FakeBackend::default());
        let session = session(&backend, quiet());

        session.send("Hello").await.unwrap();
        sleep(Duration::from_millis(500)).await;
        session.send("How are you?").await.unwrap();
        assert!(backend.saves().is_empty());

        sleep(Duration::from_secs(2)).await;

        let saves = backend.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].conversation_id, None);
        assert_eq!(saves[0].messages.len(), 4);
        assert_eq!(session.conversation_id(), Some(backend.created()[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn voice_patch_is_saved_under_the_same_id() {
        let backend = Arc::new(FakeBackend {
            synth_delay: Duration::from_secs(3),
            ..Default::default()
        });
        let session = session(&backend, SessionOptions::default());

        let reply = session.send("Hello").await.unwrap();
        assert_eq!(reply, "reply to: Hello");

        sleep(Duration::from_millis(1500)).await;
        assert_eq!(backend.saves().len(), 1);
        assert!(session.is_generating_voice());

        sleep(Duration::from_secs(5)).await;
        assert!(!session.is_generating_voice());

        let saves = backend.saves();
        assert_eq!(saves.len(), 2);
        let id = backend.created()[0];
        assert_eq!(saves[0].messages[1].voice_url, None);
        assert_eq!(saves[1].conversation_id, Some(id));
        assert_eq!(
            saves[1].messages[1].voice_url.as_deref(),
            Some(to_data_url(WAV).as_str())
        );
        assert_eq!(backend.created().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_send_withdraws_the_message() {
        let backend = Arc::new(FakeBackend::default());
        backend.chat_failures.lock().unwrap().push_back(SessionError::Server {
            status: 502,
            message: "LLM unavailable".into(),
        });
        let session = session(&backend, quiet());

        let err = session.send("Hello").await.unwrap_err();
        assert!(matches!(err, SessionError::Server { status: 502, .. }));
        assert!(session.messages().is_empty());
        assert_eq!(session.status(), SessionStatus::Idle);

        sleep(Duration::from_secs(2)).await;
        assert!(backend.saves().is_empty());

        // The session is usable again afterwards.
        session.send("Hello again").await.unwrap();
        assert_eq!(session.messages().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_send_keeps_earlier_voice() {
        let backend = Arc::new(FakeBackend::default());
        let session = session(&backend, quiet());

        session.send("Hello").await.unwrap();
        session.generate_voice(1).await.unwrap();
        backend.chat_failures.lock().unwrap().push_back(SessionError::Busy);
        session.send("And then?").await.unwrap_err();

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].voice_url.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_send_is_busy() {
        let backend = Arc::new(FakeBackend {
            chat_delay: Duration::from_secs(2),
            ..Default::default()
        });
        let session = session(&backend, quiet());

        let first = tokio::spawn({
            let session = session.clone();
            async move { session.send("Hello").await }
        });
        tokio::task::yield_now().await;
        assert_eq!(session.status(), SessionStatus::Sending);

        let err = session.send("Me too").await.unwrap_err();
        assert!(matches!(err, SessionError::Busy));

        first.await.unwrap().unwrap();
        assert_eq!(session.status(), SessionStatus::Idle);
        assert_eq!(session.messages().len(), 2);
    }

    #[tokio::test]
    async fn blank_text_is_rejected() {
        let backend = Arc::new(FakeBackend::default());
        let session = session(&backend, quiet());

        let err = session.send("   ").await.unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));
        assert!(session.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_saves_now_and_drops_the_pending_save() {
        let backend = Arc::new(FakeBackend::default());
        let session = session(&backend, quiet());

        assert_eq!(session.flush().await.unwrap(), None);

        session.send("Hello").await.unwrap();
        let id = session.flush().await.unwrap();
        assert_eq!(backend.saves().len(), 1);
        assert_eq!(id, session.conversation_id());

        sleep(Duration::from_secs(2)).await;
        assert_eq!(backend.saves().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn saves_wait_for_the_id_of_the_first() {
        let backend = Arc::new(FakeBackend {
            save_delay: Duration::from_secs(1),
            ..Default::default()
        });
        let session = session(&backend, quiet());

        session.send("Hello").await.unwrap();
        // Debounced save starts at 1s and holds until 2s.
        sleep(Duration::from_millis(1500)).await;
        assert!(session.is_saving());

        let id = session.flush().await.unwrap();

        let saves = backend.saves();
        assert_eq!(saves.len(), 2);
        assert_eq!(saves[0].conversation_id, None);
        assert_eq!(saves[1].conversation_id, id);
        assert_eq!(backend.created().len(), 1);
    }

    #[tokio::test]
    async fn one_clip_at_a_time() {
        let backend = Arc::new(FakeBackend::default());
        let output = Arc::new(FakeOutput::default());
        let voiced = |text: &str| Message {
            voice_url: Some(to_data_url(WAV)),
            ..Message::assistant(text)
        };
        let conversation = stored_conversation(vec![
            Message::user("Hello"),
            voiced("Hi!"),
            Message::user("Sing"),
            voiced("La la la"),
        ]);
        let session =
            ConversationSession::resume(backend, output.clone(), conversation, quiet());

        assert!(matches!(session.play(0), Err(SessionError::Audio(_))));
        session.play(1).unwrap();
        session.play(3).unwrap();
        assert_eq!(session.now_playing(), Some(3));

        session.stop();
        session.stop();
        assert_eq!(session.now_playing(), None);

        let start = format!("start {}", WAV.len());
        assert_eq!(
            *output.events.lock().unwrap(),
            vec![start.clone(), "stop".to_string(), start, "stop".to_string()]
        );
    }

    fn stored_conversation(messages: Vec<Message>) -> Conversation {
        Conversation {
            id: Uuid::new_v4(),
            user_id: "user_1".into(),
            character_id: Uuid::new_v4(),
            title: "Hello".into(),
            messages,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_message_at: Utc::now(),
        }
    }

    fn contents(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.content.as_str()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn save_during_a_send_leaves_out_the_unanswered_message() {
        let backend = Arc::new(FakeBackend {
            chat_delay: Duration::from_secs(2),
            ..Default::default()
        });
        let session = session(&backend, quiet());

        // Answered at 2s; its debounced save fires at 3s.
        session.send("Hello").await.unwrap();
        sleep(Duration::from_millis(500)).await;

        backend.chat_failures.lock().unwrap().push_back(SessionError::Server {
            status: 502,
            message: "LLM unavailable".into(),
        });
        let doomed = tokio::spawn({
            let session = session.clone();
            async move { session.send("Doomed").await }
        });

        sleep(Duration::from_secs(1)).await;
        let saves = backend.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(contents(&saves[0].messages), ["Hello", "reply to: Hello"]);
        assert_eq!(session.messages().len(), 3);

        doomed.await.unwrap().unwrap_err();
        sleep(Duration::from_secs(2)).await;

        let saves = backend.saves();
        let last = saves.last().unwrap();
        assert_eq!(last.messages, session.messages());
        assert_eq!(contents(&session.messages()), ["Hello", "reply to: Hello"]);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_send_withdraws_its_message() {
        let backend = Arc::new(FakeBackend {
            chat_delay: Duration::from_secs(3),
            ..Default::default()
        });
        let session = session(&backend, quiet());

        let abandoned = timeout(Duration::from_secs(1), session.send("Hello")).await;
        assert!(abandoned.is_err());
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(session.messages().is_empty());

        session.send("Hello again").await.unwrap();
        assert_eq!(session.messages().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_work_clears_activity_flags() {
        let backend = Arc::new(FakeBackend {
            synth_delay: Duration::from_secs(3),
            save_delay: Duration::from_secs(3),
            ..Default::default()
        });
        let session = ConversationSession::resume(
            backend.clone(),
            Arc::new(FakeOutput::default()),
            stored_conversation(vec![Message::user("Hello"), Message::assistant("Hi!")]),
            quiet(),
        );

        let voice = timeout(Duration::from_secs(1), session.generate_voice(1)).await;
        assert!(voice.is_err());
        assert!(!session.is_generating_voice());

        let flush = timeout(Duration::from_secs(1), session.flush()).await;
        assert!(flush.is_err());
        assert!(!session.is_saving());

        // The save lock was released with the abandoned flush.
        let id = session.flush().await.unwrap();
        assert_eq!(id, session.conversation_id());
        assert_eq!(backend.saves().len(), 2);
    }
}
