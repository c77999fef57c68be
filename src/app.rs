use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::db::BookmarkRepository;
use crate::error::Result;
use crate::feed::FeedClient;
use crate::models::{Article, Bookmark, NewBookmark, ReadingMode};
use crate::prefs::{PrefsStore, Theme};
use crate::speech::{EspeakSynthesizer, PlaybackEvent, SpeechPlayer, SpeechSettings};
use crate::translate::{ModelState, TranslateError, TranslationService, Translator};
use crate::tui::AppAction;

const RATE_STEP: f32 = 0.25;
const LEVEL_STEP: f32 = 0.1;
const PLAYBACK_LOCK_MESSAGE: &str = "Stop playback before changing speech settings";

/// espeak voice variants offered in settings; `None` is the plain
/// per-language voice.
const VOICE_CHOICES: [Option<&str>; 3] = [None, Some("+f3"), Some("+m3")];

// Message for a completed stream fetch
pub struct FetchOutcome {
    pub result: std::result::Result<Vec<Article>, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Articles,
    Bookmarks,
    Settings,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Articles, Tab::Bookmarks, Tab::Settings];

    pub fn next(self) -> Self {
        match self {
            Tab::Articles => Tab::Bookmarks,
            Tab::Bookmarks => Tab::Settings,
            Tab::Settings => Tab::Articles,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tab::Articles => "Articles",
            Tab::Bookmarks => "Bookmarks",
            Tab::Settings => "Settings",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranslationStatus {
    #[default]
    NotRequested,
    Translating,
    Translated,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsRow {
    Engine,
    Theme,
    Voice,
    Rate,
    Pitch,
    Volume,
    LanguageModel,
}

impl SettingsRow {
    pub const ALL: [SettingsRow; 7] = [
        SettingsRow::Engine,
        SettingsRow::Theme,
        SettingsRow::Voice,
        SettingsRow::Rate,
        SettingsRow::Pitch,
        SettingsRow::Volume,
        SettingsRow::LanguageModel,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SettingsRow::Engine => "Translation engine",
            SettingsRow::Theme => "Theme",
            SettingsRow::Voice => "Voice",
            SettingsRow::Rate => "Speech rate",
            SettingsRow::Pitch => "Speech pitch",
            SettingsRow::Volume => "Speech volume",
            SettingsRow::LanguageModel => "Language model",
        }
    }
}

pub struct App {
    // Data
    pub articles: Vec<Article>,
    pub bookmarks: Vec<Bookmark>,

    // UI State
    pub tab: Tab,
    pub article_index: usize,
    pub bookmark_index: usize,
    pub settings_index: usize,
    pub reading_mode: ReadingMode,
    pub theme: Theme,
    pub show_help: bool,
    pub status: Option<String>,
    pub feed_error: Option<String>,
    pub is_bookmarked: bool,

    // Async state
    pub is_fetching: bool,
    pub translation_status: TranslationStatus,
    pub translated_text: Option<String>,
    fetch_rx: mpsc::Receiver<FetchOutcome>,
    fetch_tx: mpsc::Sender<FetchOutcome>,

    // Services
    pub repository: BookmarkRepository,
    pub translations: TranslationService,
    pub speech: SpeechPlayer,
    feed: FeedClient,
    prefs: PrefsStore,
    source_language: String,
}

impl App {
    pub async fn new(config: &Config) -> Result<Self> {
        let repository = BookmarkRepository::new(&config.db_path).await?;
        let feed = FeedClient::new(&config.feed);
        let prefs = PrefsStore::open(PrefsStore::default_path());
        let saved = prefs.load();

        let translator = Arc::new(Translator::new(&config.translation));
        let translations = TranslationService::new(
            translator,
            prefs.clone(),
            &config.translation.target_language,
        );

        let speech = SpeechPlayer::new(
            Arc::new(EspeakSynthesizer::new(&config.speech.program)),
            &config.speech.default_language,
            SpeechSettings {
                rate: saved.rate,
                pitch: saved.pitch,
                volume: saved.volume,
                voice: saved.voice.clone(),
            },
        );

        let bookmarks = repository.list_all().await?;
        let (fetch_tx, fetch_rx) = mpsc::channel(1);

        let mut app = Self {
            articles: Vec::new(),
            bookmarks,
            tab: Tab::Articles,
            article_index: 0,
            bookmark_index: 0,
            settings_index: 0,
            reading_mode: ReadingMode::default(),
            theme: saved.theme,
            show_help: false,
            status: None,
            feed_error: None,
            is_bookmarked: false,
            is_fetching: false,
            translation_status: TranslationStatus::NotRequested,
            translated_text: None,
            fetch_rx,
            fetch_tx,
            repository,
            translations,
            speech,
            feed,
            prefs,
            source_language: config.translation.source_language.clone(),
        };

        // First run: get the configured target language model on its way
        // before the user asks for a translation.
        let target = app.translations.target_language().to_string();
        if !app.translations.is_downloaded(&target) {
            app.translations.request_download(&target);
        }

        app.refresh_articles();

        Ok(app)
    }

    pub fn selected_article(&self) -> Option<&Article> {
        self.articles.get(self.article_index)
    }

    pub fn selected_bookmark(&self) -> Option<&Bookmark> {
        self.bookmarks.get(self.bookmark_index)
    }

    /// Returns true when the app should quit.
    pub async fn handle_action(&mut self, action: AppAction) -> bool {
        match action {
            AppAction::Quit => {
                self.speech.stop();
                return true;
            }

            AppAction::NextTab => {
                self.tab = self.tab.next();
                if self.tab == Tab::Bookmarks {
                    self.reload_bookmarks().await;
                }
            }

            AppAction::MoveUp => self.move_selection(-1).await,
            AppAction::MoveDown => self.move_selection(1).await,

            AppAction::Confirm => match self.tab {
                Tab::Articles => self.request_translation(),
                Tab::Settings => self.activate_settings_row(),
                Tab::Bookmarks => {}
            },

            AppAction::AdjustUp => {
                if self.tab == Tab::Settings {
                    self.adjust_settings_row(1);
                }
            }

            AppAction::AdjustDown => {
                if self.tab == Tab::Settings {
                    self.adjust_settings_row(-1);
                }
            }

            AppAction::CycleReadingMode => {
                self.reading_mode = self.reading_mode.next();
                self.status = Some(format!("Reading mode: {}", self.reading_mode.label()));
            }

            AppAction::CycleEngine => self.cycle_engine(),

            AppAction::ToggleBookmark => {
                if self.tab == Tab::Articles {
                    self.toggle_bookmark().await;
                }
            }

            AppAction::DeleteBookmark => {
                if self.tab == Tab::Bookmarks {
                    self.delete_selected_bookmark().await;
                }
            }

            AppAction::RefreshFeed => self.refresh_articles(),

            AppAction::TogglePlayback => self.toggle_playback(),

            AppAction::ShowHelp => self.show_help = true,
            AppAction::HideHelp => self.show_help = false,
        }

        false
    }

    async fn move_selection(&mut self, delta: isize) {
        match self.tab {
            Tab::Articles => {
                let len = self.articles.len();
                if len == 0 {
                    return;
                }
                let index = (self.article_index as isize + delta).clamp(0, len as isize - 1);
                if index as usize != self.article_index {
                    self.article_index = index as usize;
                    self.on_article_selected().await;
                }
            }
            Tab::Bookmarks => {
                let len = self.bookmarks.len();
                if len == 0 {
                    return;
                }
                self.bookmark_index =
                    (self.bookmark_index as isize + delta).clamp(0, len as isize - 1) as usize;
            }
            Tab::Settings => {
                let len = SettingsRow::ALL.len() as isize;
                self.settings_index =
                    (self.settings_index as isize + delta).rem_euclid(len) as usize;
            }
        }
    }

    async fn on_article_selected(&mut self) {
        // In-flight results for the old selection are dropped by the
        // article id check in poll_translation.
        self.translation_status = TranslationStatus::NotRequested;
        self.translated_text = None;
        self.is_bookmarked = false;

        let Some(article) = self.selected_article() else {
            return;
        };
        let id = article.id.clone();
        match self.repository.exists(&id).await {
            Ok(exists) => self.is_bookmarked = exists,
            Err(e) => {
                tracing::error!("Bookmark lookup failed: {e}");
                self.status = Some(format!("Bookmark lookup failed: {e}"));
            }
        }
    }

    fn request_translation(&mut self) {
        let Some(article) = self.selected_article() else {
            return;
        };
        let id = article.id.clone();
        let text = article.plain_content();

        if text.is_empty() {
            self.status = Some("Article has no content to translate".to_string());
            return;
        }

        self.translation_status = TranslationStatus::Translating;
        self.translations.request_translation(&id, &text);
    }

    fn cycle_engine(&mut self) {
        match self.translations.cycle_engine() {
            Ok(engine) => {
                self.status = Some(format!("Translation engine: {}", engine.label()));
            }
            Err(e) => {
                tracing::error!("Failed to persist engine selection: {e}");
                self.status = Some(format!("Failed to save preferences: {e}"));
            }
        }
    }

    fn cycle_theme(&mut self) {
        self.theme = self.theme.next();
        let theme = self.theme;
        match self.prefs.update(|p| p.theme = theme) {
            Ok(_) => self.status = Some(format!("Theme: {}", theme.label())),
            Err(e) => {
                tracing::error!("Failed to persist theme: {e}");
                self.status = Some(format!("Failed to save preferences: {e}"));
            }
        }
    }

    fn cycle_voice(&mut self, direction: i32) {
        let current = self.speech.settings().voice;
        let position = VOICE_CHOICES
            .iter()
            .position(|choice| *choice == current.as_deref())
            .unwrap_or(0);
        let len = VOICE_CHOICES.len() as i32;
        let next = (position as i32 + direction).rem_euclid(len) as usize;

        self.speech.set_voice(VOICE_CHOICES[next].map(str::to_string));
        self.persist_speech_settings();
    }

    /// Speech settings stay locked while playback runs; the segment in
    /// flight would only pick the change up mid-stream.
    fn playback_locked(&mut self) -> bool {
        if self.speech.is_playing() {
            self.status = Some(PLAYBACK_LOCK_MESSAGE.to_string());
            return true;
        }
        false
    }

    fn adjust_settings_row(&mut self, direction: i32) {
        match SettingsRow::ALL[self.settings_index] {
            SettingsRow::Engine => self.cycle_engine(),
            SettingsRow::Theme => self.cycle_theme(),
            SettingsRow::Voice => {
                if !self.playback_locked() {
                    self.cycle_voice(direction);
                }
            }
            SettingsRow::Rate => {
                if !self.playback_locked() {
                    let rate = self.speech.settings().rate + RATE_STEP * direction as f32;
                    self.speech.set_rate(rate);
                    self.persist_speech_settings();
                }
            }
            SettingsRow::Pitch => {
                if !self.playback_locked() {
                    let pitch = self.speech.settings().pitch + LEVEL_STEP * direction as f32;
                    self.speech.set_pitch(pitch);
                    self.persist_speech_settings();
                }
            }
            SettingsRow::Volume => {
                if !self.playback_locked() {
                    let volume = self.speech.settings().volume + LEVEL_STEP * direction as f32;
                    self.speech.set_volume(volume);
                    self.persist_speech_settings();
                }
            }
            SettingsRow::LanguageModel => self.request_model_download(),
        }
    }

    fn activate_settings_row(&mut self) {
        match SettingsRow::ALL[self.settings_index] {
            SettingsRow::Engine => self.cycle_engine(),
            SettingsRow::Theme => self.cycle_theme(),
            SettingsRow::Voice => {
                if !self.playback_locked() {
                    self.cycle_voice(1);
                }
            }
            // Enter resets a slider to its default.
            SettingsRow::Rate => {
                if !self.playback_locked() {
                    self.speech.set_rate(1.0);
                    self.persist_speech_settings();
                }
            }
            SettingsRow::Pitch => {
                if !self.playback_locked() {
                    self.speech.set_pitch(1.0);
                    self.persist_speech_settings();
                }
            }
            SettingsRow::Volume => {
                if !self.playback_locked() {
                    self.speech.set_volume(1.0);
                    self.persist_speech_settings();
                }
            }
            SettingsRow::LanguageModel => self.request_model_download(),
        }
    }

    fn persist_speech_settings(&mut self) {
        let settings = self.speech.settings();
        let result = self.prefs.update(|p| {
            p.rate = settings.rate;
            p.pitch = settings.pitch;
            p.volume = settings.volume;
            p.voice = settings.voice;
        });
        if let Err(e) = result {
            tracing::error!("Failed to persist speech settings: {e}");
            self.status = Some(format!("Failed to save preferences: {e}"));
        }
    }

    fn request_model_download(&mut self) {
        let code = self.translations.target_language().to_string();
        match self.translations.model_state(&code) {
            ModelState::Ready => {
                self.status = Some(format!("Language model '{code}' is already downloaded"));
            }
            ModelState::Downloading => {
                self.status = Some(format!("Language model '{code}' is still downloading"));
            }
            ModelState::NotDownloaded => {
                self.translations.request_download(&code);
                self.status = Some(format!("Downloading language model '{code}'…"));
            }
        }
    }

    async fn toggle_bookmark(&mut self) {
        let Some(article) = self.selected_article() else {
            return;
        };
        let id = article.id.clone();
        let title = article.title.clone();
        let content = article.plain_content();
        let origin = article.origin.clone();

        let exists = match self.repository.exists(&id).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::error!("Bookmark lookup failed: {e}");
                self.status = Some(format!("Bookmark lookup failed: {e}"));
                return;
            }
        };

        if exists {
            match self.repository.delete(&id).await {
                Ok(()) => {
                    self.is_bookmarked = false;
                    self.status = Some("Bookmark removed".to_string());
                }
                Err(e) => {
                    tracing::error!("Failed to remove bookmark: {e}");
                    self.status = Some(format!("Failed to remove bookmark: {e}"));
                    return;
                }
            }
        } else {
            let bookmark = NewBookmark {
                article_id: id,
                title,
                content,
                translated_content: self.translated_text.clone(),
                engine: self.translations.engine().id().to_string(),
                origin,
            };
            match self.repository.save(bookmark).await {
                Ok(()) => {
                    self.is_bookmarked = true;
                    self.status = Some("Bookmarked".to_string());
                }
                Err(e) => {
                    tracing::error!("Failed to save bookmark: {e}");
                    self.status = Some(format!("Failed to save bookmark: {e}"));
                    return;
                }
            }
        }

        self.reload_bookmarks().await;
    }

    async fn delete_selected_bookmark(&mut self) {
        let Some(bookmark) = self.selected_bookmark() else {
            return;
        };
        let id = bookmark.article_id.clone();
        let title = bookmark.title.clone();

        match self.repository.delete(&id).await {
            Ok(()) => {
                self.status = Some(format!("Removed '{title}'"));
                if self.selected_article().map(|a| a.id.as_str()) == Some(id.as_str()) {
                    self.is_bookmarked = false;
                }
            }
            Err(e) => {
                tracing::error!("Failed to remove bookmark: {e}");
                self.status = Some(format!("Failed to remove bookmark: {e}"));
            }
        }

        self.reload_bookmarks().await;
    }

    async fn reload_bookmarks(&mut self) {
        match self.repository.list_all().await {
            Ok(bookmarks) => {
                self.bookmarks = bookmarks;
                if self.bookmarks.is_empty() {
                    self.bookmark_index = 0;
                } else if self.bookmark_index >= self.bookmarks.len() {
                    self.bookmark_index = self.bookmarks.len() - 1;
                }
            }
            Err(e) => {
                tracing::error!("Failed to load bookmarks: {e}");
                self.status = Some(format!("Failed to load bookmarks: {e}"));
            }
        }
    }

    fn toggle_playback(&mut self) {
        if self.speech.is_playing() {
            self.speech.stop();
            self.status = Some("Playback stopped".to_string());
            return;
        }

        let (text, language) = match self.tab {
            Tab::Articles => {
                let Some(article) = self.selected_article() else {
                    return;
                };
                let original = article.plain_content();
                let translated = self.translated_text.as_deref();
                let text = self
                    .reading_mode
                    .speech_text(&original, translated)
                    .to_string();
                (text, self.playback_language(translated.is_some()))
            }
            Tab::Bookmarks => {
                let Some(bookmark) = self.selected_bookmark() else {
                    return;
                };
                let translated = bookmark.translated_content.as_deref();
                let body = self.reading_mode.speech_text(&bookmark.content, translated);
                let text = format!("{}\n\n{body}", bookmark.title);
                (text, self.playback_language(translated.is_some()))
            }
            Tab::Settings => return,
        };

        if text.trim().is_empty() {
            self.status = Some("Nothing to read".to_string());
            return;
        }

        self.speech.play(&text, &language);
    }

    /// Language for the opening playback segment: the target language
    /// when a translation is being read, the stream's source language
    /// otherwise.
    fn playback_language(&self, translation_available: bool) -> String {
        if self.reading_mode != ReadingMode::Original && translation_available {
            self.translations.target_language().to_string()
        } else {
            self.source_language.clone()
        }
    }

    pub fn refresh_articles(&mut self) {
        self.is_fetching = true;

        let feed = self.feed.clone();
        let tx = self.fetch_tx.clone();
        tokio::spawn(async move {
            let result = feed.fetch_articles().await.map_err(|e| e.to_string());
            let _ = tx.send(FetchOutcome { result }).await;
        });
    }

    /// Poll for a completed stream fetch (non-blocking).
    pub async fn poll_fetch(&mut self) {
        let Ok(outcome) = self.fetch_rx.try_recv() else {
            return;
        };
        self.is_fetching = false;

        match outcome.result {
            Ok(articles) => {
                self.feed_error = None;
                self.status = Some(format!("Loaded {} articles", articles.len()));
                self.articles = articles;
                if self.articles.is_empty() {
                    self.article_index = 0;
                } else if self.article_index >= self.articles.len() {
                    self.article_index = self.articles.len() - 1;
                }
                self.on_article_selected().await;
            }
            Err(message) => {
                tracing::error!("Feed fetch failed: {message}");
                self.feed_error = Some(message);
            }
        }
    }

    /// Poll for a completed translation (non-blocking). The service
    /// already drops superseded generations; results for an article the
    /// user has navigated away from are dropped here.
    pub fn poll_translation(&mut self) {
        let Some(outcome) = self.translations.poll_translation() else {
            return;
        };
        if self.selected_article().map(|a| a.id.as_str()) != Some(outcome.article_id.as_str()) {
            return;
        }

        match outcome.result {
            Ok(translated) => {
                self.translated_text = Some(translated);
                self.translation_status = TranslationStatus::Translated;
            }
            Err(TranslateError::ModelNotReady { language }) => {
                self.translation_status = TranslationStatus::Failed;
                self.status = Some(format!(
                    "Language model '{language}' is not ready; download it in Settings"
                ));
            }
            Err(e) => {
                self.translation_status = TranslationStatus::Failed;
                self.status = Some(format!("Translation failed: {e}"));
            }
        }
    }

    /// Poll for a finished language model download (non-blocking).
    pub fn poll_downloads(&mut self) {
        match self.translations.poll_download() {
            Ok(Some(outcome)) => match outcome.result {
                Ok(()) => {
                    self.status =
                        Some(format!("Language model '{}' downloaded", outcome.language));
                }
                Err(e) => {
                    self.status = Some(format!("Model download failed: {e}"));
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Failed to persist preferences: {e}");
                self.status = Some(format!("Failed to save preferences: {e}"));
            }
        }
    }

    /// Poll playback progress; failures land in the status line.
    pub fn poll_playback(&mut self) {
        if let Some(PlaybackEvent::Failed { message, .. }) = self.speech.poll() {
            self.status = Some(format!("Read-aloud failed: {message}"));
        }
    }
}
