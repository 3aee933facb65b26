use std::sync::Arc;
use std::time::Instant;
use ratatui::layout::Rect;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::client::{ChatBackend, ChatClient, ServiceStatus};
use crate::clipboard::ClipboardManager;
use crate::config::Config;
use crate::conversation::{ConversationStore, OutboundRequest};
use crate::error::ChatError;
use crate::markdown::{literal_lines, CodeBlock, MarkdownRenderer, RenderedMessage};
use crate::state::Role;
use crate::theme::Theme;
use crate::ui::{wrap_message, WrappedMessage};
use crate::view::ViewSync;

pub const SUGGESTED_PROMPTS: [&str; 4] = [
    "Write a Python function to reverse a string",
    "Explain machine learning concepts",
    "Create a REST API with FastAPI",
    "Help me with data science in pandas",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Startup values resolved from CLI, environment and config file
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: String,
    pub dark_mode: bool,
    pub scroll_threshold: u16,
}

/// The one request in flight and the generation it was sent under
struct PendingReply {
    generation: u64,
    task: JoinHandle<Result<String, ChatError>>,
}

/// Rendered transcript, rebuilt when the conversation is cleared or the theme
/// changes
#[derive(Default)]
struct RenderCache {
    generation: u64,
    dark: bool,
    messages: Vec<RenderedMessage>,
}

/// Rendered messages wrapped to the chat width. Follows the render cache and
/// starts over when the width changes.
#[derive(Default)]
struct WrapCache {
    width: usize,
    generation: u64,
    dark: bool,
    messages: Vec<WrappedMessage>,
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Input line
    pub input: String,
    pub input_cursor: usize, // in chars, not bytes

    pub conversation: ConversationStore,
    pub view: ViewSync,
    pub theme: Theme,
    pub endpoint: String,

    // None while the startup probe is running
    pub service_status: Option<Result<ServiceStatus, String>>,

    // Code block selection; rows are filled in by the renderer
    pub selected_code_block: Option<usize>,
    pub code_block_rows: Vec<u16>,

    pub animation_frame: u8,

    // Areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub jump_area: Option<Rect>,

    backend: Arc<dyn ChatBackend>,
    pending_reply: Option<PendingReply>,
    status_task: Option<JoinHandle<Result<ServiceStatus, ChatError>>>,
    renderer: MarkdownRenderer,
    render_cache: RenderCache,
    wrap_cache: WrapCache,
    clipboard: Option<ClipboardManager>,
    persist_theme: bool,
}

impl App {
    /// Build the app against the real endpoint and start the status probe.
    /// Must be called inside the tokio runtime.
    pub fn new(settings: Settings) -> Self {
        let client = ChatClient::new(&settings.endpoint);

        let probe = client.clone();
        let status_task = tokio::spawn(async move { probe.status().await });

        let mut app = Self::with_backend(
            Arc::new(client),
            settings.endpoint,
            Theme::from_dark_mode(settings.dark_mode),
            settings.scroll_threshold,
        );
        app.status_task = Some(status_task);
        app.persist_theme = true;
        app
    }

    pub fn with_backend(
        backend: Arc<dyn ChatBackend>,
        endpoint: String,
        theme: Theme,
        scroll_threshold: u16,
    ) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            input: String::new(),
            input_cursor: 0,
            conversation: ConversationStore::new(),
            view: ViewSync::new(scroll_threshold),
            theme,
            endpoint,
            service_status: None,
            selected_code_block: None,
            code_block_rows: Vec::new(),
            animation_frame: 0,
            chat_area: None,
            jump_area: None,
            backend,
            pending_reply: None,
            status_task: None,
            renderer: MarkdownRenderer::new(),
            render_cache: RenderCache::default(),
            wrap_cache: WrapCache::default(),
            clipboard: None,
            persist_theme: false,
        }
    }

    /// Send the input line. Does nothing if it is blank or a reply is pending.
    pub fn submit(&mut self) {
        let Some(outbound) = self.conversation.begin_send(&self.input) else {
            return;
        };
        self.input.clear();
        self.input_cursor = 0;

        let OutboundRequest { generation, request } = outbound;
        let backend = Arc::clone(&self.backend);
        let task = tokio::spawn(async move { backend.send(&request).await });
        self.pending_reply = Some(PendingReply { generation, task });
    }

    /// Collect finished background work: the reply task and the status probe
    pub async fn poll_tasks(&mut self) {
        if self.pending_reply.as_ref().is_some_and(|p| p.task.is_finished()) {
            if let Some(PendingReply { generation, task }) = self.pending_reply.take() {
                let result = task.await.map_err(ChatError::from).and_then(|reply| reply);
                self.conversation.settle(generation, result);
            }
        }

        if self.status_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.status_task.take() {
                let result = task.await.map_err(ChatError::from).and_then(|status| status);
                match &result {
                    Ok(status) => info!(
                        status = %status.status,
                        providers = ?status.ai_providers,
                        message = status.message.as_deref().unwrap_or(""),
                        "chat service status"
                    ),
                    Err(err) => warn!(error = %err, "chat service status unavailable"),
                }
                self.service_status = Some(result.map_err(|err| err.to_string()));
            }
        }
    }

    pub fn is_waiting_for_reply(&self) -> bool {
        self.pending_reply.is_some()
    }

    /// Feed the message count to the view and fire any due auto-scroll
    pub fn sync_view(&mut self, now: Instant) {
        self.view.on_message_count(self.conversation.len(), now);
        self.view.tick(now);
    }

    pub fn clear_chat(&mut self) {
        self.conversation.clear();
        self.selected_code_block = None;
        self.code_block_rows.clear();
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        if self.persist_theme {
            if let Err(err) = Config::save_dark_mode(self.theme.is_dark) {
                warn!(error = %err, "could not save theme preference");
            }
        }
    }

    pub fn tick_animation(&mut self) {
        if self.conversation.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Rendered form of every message, oldest first
    pub fn rendered_messages(&mut self) -> &[RenderedMessage] {
        let generation = self.conversation.generation();
        let dark = self.theme.is_dark;
        let cache = &mut self.render_cache;

        if cache.generation != generation
            || cache.dark != dark
            || cache.messages.len() > self.conversation.len()
        {
            *cache = RenderCache {
                generation,
                dark,
                messages: Vec::new(),
            };
        }

        for message in &self.conversation.messages()[cache.messages.len()..] {
            let rendered = match message.role {
                Role::User => RenderedMessage {
                    lines: literal_lines(&message.content, &self.theme),
                    code_blocks: Vec::new(),
                },
                Role::Assistant => self.renderer.render(&message.content, &self.theme),
            };
            cache.messages.push(rendered);
        }

        &cache.messages
    }

    /// Every message as terminal rows at `width`. Only messages added since
    /// the last call are wrapped.
    pub fn wrapped_messages(&mut self, width: usize) -> &[WrappedMessage] {
        let generation = self.conversation.generation();
        let dark = self.theme.is_dark;
        let mut cache = std::mem::take(&mut self.wrap_cache);

        if cache.width != width
            || cache.generation != generation
            || cache.dark != dark
            || cache.messages.len() > self.conversation.len()
        {
            cache = WrapCache {
                width,
                generation,
                dark,
                messages: Vec::new(),
            };
        }

        let start = cache.messages.len();
        let headers: Vec<(Role, String)> = self.conversation.messages()[start..]
            .iter()
            .map(|m| (m.role, m.local_time()))
            .collect();
        let theme = self.theme.clone();
        let rendered = self.rendered_messages();
        for ((role, time), message) in headers.iter().zip(&rendered[start..]) {
            cache
                .messages
                .push(wrap_message(*role, time, message, width, &theme));
        }

        self.wrap_cache = cache;
        &self.wrap_cache.messages
    }

    fn code_blocks(&mut self) -> Vec<CodeBlock> {
        self.rendered_messages()
            .iter()
            .flat_map(|m| m.code_blocks.iter().cloned())
            .collect()
    }

    /// Move the code block selection. `forward` goes towards newer blocks;
    /// with nothing selected either direction starts at the newest block.
    pub fn select_code_block(&mut self, forward: bool) {
        let count = self.code_blocks().len();
        if count == 0 {
            self.selected_code_block = None;
            return;
        }

        let next = match self.selected_code_block {
            None => count - 1,
            Some(i) if forward => (i + 1).min(count - 1),
            Some(i) => i.saturating_sub(1),
        };
        self.selected_code_block = Some(next);

        if let Some(&row) = self.code_block_rows.get(next) {
            self.view.reveal_row(row);
        }
    }

    /// Text of the selected code block, or of the newest one
    pub fn selected_code_text(&mut self) -> Option<String> {
        let blocks = self.code_blocks();
        let index = self
            .selected_code_block
            .unwrap_or_else(|| blocks.len().saturating_sub(1));
        blocks.into_iter().nth(index).map(|block| block.code)
    }

    /// Copy the selected code block to the system clipboard. Returns the text
    /// handed to the clipboard.
    pub fn copy_code_block(&mut self) -> Option<String> {
        let text = self.selected_code_text()?;
        let copied = self
            .clipboard
            .get_or_insert_with(ClipboardManager::new)
            .copy(&text);
        if !copied {
            warn!("code block was not copied");
        }
        Some(text)
    }

    /// Put one of the welcome-screen prompts in the input line
    pub fn use_suggested_prompt(&mut self, index: usize) {
        if !self.conversation.is_empty() {
            return;
        }
        if let Some(prompt) = SUGGESTED_PROMPTS.get(index) {
            self.input = prompt.to_string();
            self.input_cursor = self.input.chars().count();
            self.input_mode = InputMode::Editing;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChatRequest;
    use crate::conversation::FALLBACK_REPLY;
    use crate::view::AT_BOTTOM_THRESHOLD;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Holds every reply until released, then answers with `reply`
    struct GatedBackend {
        reply: Option<String>,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl ChatBackend for GatedBackend {
        async fn send(&self, _request: &ChatRequest) -> Result<String, ChatError> {
            self.gate.notified().await;
            match &self.reply {
                Some(text) => Ok(text.clone()),
                None => Err(ChatError::Status(reqwest::StatusCode::INTERNAL_SERVER_ERROR)),
            }
        }
    }

    fn app_with(reply: Option<&str>) -> (App, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let backend = GatedBackend {
            reply: reply.map(str::to_string),
            gate: Arc::clone(&gate),
        };
        let app = App::with_backend(
            Arc::new(backend),
            "http://test".to_string(),
            Theme::dark(),
            AT_BOTTOM_THRESHOLD,
        );
        (app, gate)
    }

    async fn wait_for_reply(app: &mut App) {
        for _ in 0..200 {
            app.poll_tasks().await;
            if !app.is_waiting_for_reply() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("reply never settled");
    }

    #[tokio::test]
    async fn test_submit_then_reply() {
        let (mut app, gate) = app_with(Some("Hi!"));
        app.input = "Hello".to_string();
        app.input_cursor = 5;

        app.submit();
        assert!(app.input.is_empty());
        assert_eq!(app.input_cursor, 0);
        assert_eq!(app.conversation.len(), 1);
        assert!(app.conversation.is_loading());

        gate.notify_one();
        wait_for_reply(&mut app).await;

        assert_eq!(app.conversation.len(), 2);
        assert!(!app.conversation.is_loading());
        assert_eq!(app.conversation.messages()[1].content, "Hi!");
    }

    #[tokio::test]
    async fn test_submit_failure_shows_fallback() {
        let (mut app, gate) = app_with(None);
        app.input = "Hello".to_string();
        app.submit();

        gate.notify_one();
        wait_for_reply(&mut app).await;

        assert_eq!(app.conversation.messages()[1].content, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_blank_submit_keeps_input() {
        let (mut app, _gate) = app_with(Some("unused"));
        app.input = "   ".to_string();
        app.submit();
        assert_eq!(app.input, "   ");
        assert!(!app.is_waiting_for_reply());
    }

    #[tokio::test]
    async fn test_submit_while_loading_keeps_input() {
        let (mut app, _gate) = app_with(Some("Hi!"));
        app.input = "first".to_string();
        app.submit();

        app.input = "second".to_string();
        app.submit();
        assert_eq!(app.input, "second");
        assert_eq!(app.conversation.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_during_request_drops_late_reply() {
        let (mut app, gate) = app_with(Some("late"));
        app.input = "Hello".to_string();
        app.submit();

        app.clear_chat();
        assert_eq!(app.conversation.len(), 0);

        gate.notify_one();
        wait_for_reply(&mut app).await;

        assert_eq!(app.conversation.len(), 0);
        assert!(!app.conversation.is_loading());
    }

    #[tokio::test]
    async fn test_copy_python_block_round_trip() {
        let (mut app, gate) = app_with(Some("Here you go:\n\n```python\ndef rev(s):\n    return s[::-1]\n```\n"));
        app.input = "reverse a string".to_string();
        app.submit();
        gate.notify_one();
        wait_for_reply(&mut app).await;

        let copied = app.copy_code_block().unwrap();
        assert_eq!(copied, "def rev(s):\n    return s[::-1]");
        assert!(!copied.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_code_block_selection_moves_between_blocks() {
        let (mut app, gate) = app_with(Some("```rust\nfn a() {}\n```\n\n```sh\necho b\n```"));
        app.input = "two blocks".to_string();
        app.submit();
        gate.notify_one();
        wait_for_reply(&mut app).await;

        app.select_code_block(false);
        assert_eq!(app.selected_code_block, Some(1));
        assert_eq!(app.selected_code_text().as_deref(), Some("echo b"));

        app.select_code_block(false);
        assert_eq!(app.selected_code_text().as_deref(), Some("fn a() {}"));

        app.select_code_block(false);
        assert_eq!(app.selected_code_block, Some(0));

        app.select_code_block(true);
        assert_eq!(app.selected_code_block, Some(1));
    }

    #[tokio::test]
    async fn test_no_code_blocks_means_nothing_to_copy() {
        let (mut app, _gate) = app_with(Some("unused"));
        assert_eq!(app.copy_code_block(), None);
        app.select_code_block(true);
        assert_eq!(app.selected_code_block, None);
    }

    #[tokio::test]
    async fn test_render_cache_follows_theme_and_clear() {
        let (mut app, gate) = app_with(Some("**bold** reply"));
        app.input = "Hello".to_string();
        app.submit();
        gate.notify_one();
        wait_for_reply(&mut app).await;

        assert_eq!(app.rendered_messages().len(), 2);
        app.toggle_theme();
        assert!(!app.theme.is_dark);
        assert_eq!(app.rendered_messages().len(), 2);

        app.clear_chat();
        assert!(app.rendered_messages().is_empty());
    }

    #[tokio::test]
    async fn test_wrap_cache_follows_width() {
        let (mut app, gate) = app_with(Some("a reply long enough to need a second row at twenty"));
        app.input = "Hello".to_string();
        app.submit();
        gate.notify_one();
        wait_for_reply(&mut app).await;

        let rows_at = |app: &mut App, width| -> usize {
            app.wrapped_messages(width).iter().map(|m| m.rows.len()).sum()
        };

        let wide = rows_at(&mut app, 200);
        assert_eq!(app.wrapped_messages(200).len(), 2);
        assert_eq!(rows_at(&mut app, 200), wide);

        let narrow = rows_at(&mut app, 20);
        assert!(narrow > wide);

        app.clear_chat();
        assert!(app.wrapped_messages(20).is_empty());
    }

    #[tokio::test]
    async fn test_suggested_prompt_only_on_empty_conversation() {
        let (mut app, _gate) = app_with(Some("Hi!"));
        app.input_mode = InputMode::Normal;
        app.use_suggested_prompt(0);
        assert_eq!(app.input, SUGGESTED_PROMPTS[0]);
        assert_eq!(app.input_mode, InputMode::Editing);

        app.submit();
        app.input.clear();
        app.use_suggested_prompt(1);
        assert!(app.input.is_empty());
    }

    #[tokio::test]
    async fn test_sync_view_schedules_scroll_for_new_message() {
        let (mut app, _gate) = app_with(Some("Hi!"));
        app.view.measure(10, 20);
        app.input = "Hello".to_string();
        app.submit();

        let now = Instant::now();
        app.sync_view(now);
        assert!(app.view.autoscroll_pending());
    }
}
