//! App-facing translation state: the selected engine, per-language
//! model readiness and the in-flight background work.
//!
//! Requests run in spawned tasks and report back over bounded channels
//! that the event loop polls each tick. Every translation request gets
//! a generation stamp; results from a superseded generation are
//! dropped, so a slow engine can never overwrite a newer request.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::Result;
use crate::prefs::PrefsStore;

use super::lexicon::ModelState;
use super::{Engine, TranslateError, Translator};

#[derive(Debug)]
pub struct TranslationOutcome {
    pub article_id: String,
    pub generation: u64,
    pub result: std::result::Result<String, TranslateError>,
}

#[derive(Debug)]
pub struct DownloadOutcome {
    pub language: String,
    pub result: std::result::Result<(), TranslateError>,
}

pub struct TranslationService {
    translator: Arc<Translator>,
    prefs: PrefsStore,
    engine: Engine,
    target_language: String,
    model_states: HashMap<String, ModelState>,
    generation: u64,
    pending_article: Option<String>,
    translation_tx: mpsc::Sender<TranslationOutcome>,
    translation_rx: mpsc::Receiver<TranslationOutcome>,
    download_tx: mpsc::Sender<DownloadOutcome>,
    download_rx: mpsc::Receiver<DownloadOutcome>,
}

impl TranslationService {
    pub fn new(translator: Arc<Translator>, prefs: PrefsStore, target_language: &str) -> Self {
        let saved = prefs.load();

        // Languages downloaded in an earlier session start out ready.
        let mut model_states = HashMap::new();
        for code in &saved.downloaded_languages {
            model_states.insert(code.clone(), ModelState::Ready);
        }

        let (translation_tx, translation_rx) = mpsc::channel(8);
        let (download_tx, download_rx) = mpsc::channel(8);

        Self {
            translator,
            prefs,
            engine: saved.engine,
            target_language: target_language.to_string(),
            model_states,
            generation: 0,
            pending_article: None,
            translation_tx,
            translation_rx,
            download_tx,
            download_rx,
        }
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    /// Advance to the next engine and persist the selection.
    pub fn cycle_engine(&mut self) -> Result<Engine> {
        self.engine = self.engine.next();
        let engine = self.engine;
        self.prefs.update(|p| p.engine = engine)?;
        Ok(engine)
    }

    pub fn model_state(&self, code: &str) -> ModelState {
        self.model_states.get(code).copied().unwrap_or_default()
    }

    pub fn is_downloaded(&self, code: &str) -> bool {
        self.model_state(code) == ModelState::Ready
    }

    /// Kick off a lexicon download unless one is ready or already in
    /// flight. Fire-and-forget; completion arrives via
    /// [`poll_download`](Self::poll_download).
    pub fn request_download(&mut self, code: &str) {
        match self.model_state(code) {
            ModelState::Downloading | ModelState::Ready => return,
            ModelState::NotDownloaded => {}
        }

        self.model_states
            .insert(code.to_string(), ModelState::Downloading);

        let translator = Arc::clone(&self.translator);
        let tx = self.download_tx.clone();
        let language = code.to_string();
        tokio::spawn(async move {
            let result = translator.lexicon().install(&language).await;
            let _ = tx.send(DownloadOutcome { language, result }).await;
        });
    }

    /// Translate in the background with the currently selected engine.
    /// Supersedes any in-flight request.
    pub fn request_translation(&mut self, article_id: &str, text: &str) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        self.pending_article = Some(article_id.to_string());

        let translator = Arc::clone(&self.translator);
        let engine = self.engine;
        let tx = self.translation_tx.clone();
        let article_id = article_id.to_string();
        let text = text.to_string();
        tokio::spawn(async move {
            let result = translator.translate(engine, &text).await;
            if let Err(e) = &result {
                tracing::warn!("{} translation failed: {e}", engine.label());
            }
            let _ = tx
                .send(TranslationOutcome {
                    article_id,
                    generation,
                    result,
                })
                .await;
        });

        generation
    }

    pub fn is_translating(&self) -> bool {
        self.pending_article.is_some()
    }

    /// Non-blocking poll for the latest translation result. Results
    /// stamped with a superseded generation are discarded.
    pub fn poll_translation(&mut self) -> Option<TranslationOutcome> {
        loop {
            match self.translation_rx.try_recv() {
                Ok(outcome) if outcome.generation == self.generation => {
                    self.pending_article = None;
                    return Some(outcome);
                }
                Ok(stale) => {
                    tracing::debug!(
                        "Dropping superseded translation result for '{}'",
                        stale.article_id
                    );
                }
                Err(_) => return None,
            }
        }
    }

    /// Non-blocking poll for a finished download. Success marks the
    /// language ready and persists it; failure rolls the state back so
    /// the download can be retried.
    pub fn poll_download(&mut self) -> Result<Option<DownloadOutcome>> {
        let Ok(outcome) = self.download_rx.try_recv() else {
            return Ok(None);
        };

        match &outcome.result {
            Ok(()) => {
                self.model_states
                    .insert(outcome.language.clone(), ModelState::Ready);
                let language = outcome.language.clone();
                self.prefs.update(|p| {
                    p.downloaded_languages.insert(language);
                })?;
            }
            Err(e) => {
                tracing::warn!("Model download for '{}' failed: {e}", outcome.language);
                self.model_states.remove(&outcome.language);
            }
        }

        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::config::TranslationConfig;
    use crate::prefs::Prefs;

    const ZH_LEXICON: &str = r#"{
        "language": "zh",
        "entries": {"hello": "你好", "world": "世界"}
    }"#;

    struct Fixture {
        service: TranslationService,
        prefs: PrefsStore,
        _dir: tempfile::TempDir,
    }

    fn fixture(lexicon_base_url: &str) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let prefs = PrefsStore::open(dir.path().join("prefs.json"));
        let translator = Arc::new(Translator::new(&TranslationConfig {
            anthropic_api_key: None,
            libre_url: "http://127.0.0.1:1".to_string(),
            libre_api_key: None,
            lexicon_base_url: lexicon_base_url.to_string(),
            models_dir: dir.path().join("models").to_string_lossy().to_string(),
            source_language: "en".to_string(),
            target_language: "zh".to_string(),
            command: "no-such-translator-binary".to_string(),
        }));
        let service = TranslationService::new(translator, prefs.clone(), "zh");
        Fixture {
            service,
            prefs,
            _dir: dir,
        }
    }

    fn install_lexicon(fixture: &Fixture) {
        let models_dir = fixture._dir.path().join("models");
        std::fs::create_dir_all(&models_dir).expect("models dir");
        std::fs::write(models_dir.join("zh.json"), ZH_LEXICON).expect("model file");
    }

    /// Single-endpoint stub that always serves the same response and
    /// counts hits.
    async fn spawn_stub(status_line: &'static str, body: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
        let addr = listener.local_addr().expect("stub addr");
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                seen.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 2048];
                let mut head = Vec::new();
                loop {
                    let Ok(n) = socket.read(&mut buf).await else {
                        break;
                    };
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&buf[..n]);
                    if head.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let response = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{addr}"), hits)
    }

    async fn wait_for_download(service: &mut TranslationService) -> DownloadOutcome {
        for _ in 0..400 {
            if let Some(outcome) = service.poll_download().expect("poll download") {
                return outcome;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("download never completed");
    }

    async fn wait_for_translation(service: &mut TranslationService) -> TranslationOutcome {
        for _ in 0..400 {
            if let Some(outcome) = service.poll_translation() {
                return outcome;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("translation never completed");
    }

    #[tokio::test]
    async fn download_marks_language_ready_and_persists() {
        let (base_url, _) = spawn_stub("200 OK", ZH_LEXICON).await;
        let mut fixture = fixture(&base_url);

        assert!(!fixture.service.is_downloaded("zh"));
        fixture.service.request_download("zh");
        assert_eq!(fixture.service.model_state("zh"), ModelState::Downloading);

        let outcome = wait_for_download(&mut fixture.service).await;
        assert!(outcome.result.is_ok());
        assert!(fixture.service.is_downloaded("zh"));
        assert!(fixture.prefs.load().downloaded_languages.contains("zh"));
    }

    #[tokio::test]
    async fn failed_download_rolls_back_to_not_downloaded() {
        let (base_url, _) = spawn_stub("404 Not Found", "{}").await;
        let mut fixture = fixture(&base_url);

        fixture.service.request_download("zh");
        let outcome = wait_for_download(&mut fixture.service).await;

        assert!(outcome.result.is_err());
        assert_eq!(fixture.service.model_state("zh"), ModelState::NotDownloaded);
        assert!(fixture.prefs.load().downloaded_languages.is_empty());
    }

    #[tokio::test]
    async fn download_is_a_noop_once_ready() {
        let (base_url, hits) = spawn_stub("200 OK", ZH_LEXICON).await;
        let mut fixture = fixture(&base_url);

        fixture.service.request_download("zh");
        wait_for_download(&mut fixture.service).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Ready: no second request is issued.
        fixture.service.request_download("zh");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn languages_seeded_from_prefs_start_ready() {
        let dir = tempfile::tempdir().expect("tempdir");
        let prefs = PrefsStore::open(dir.path().join("prefs.json"));
        let mut seeded = Prefs::default();
        seeded.downloaded_languages.insert("fr".to_string());
        prefs.save(&seeded).expect("seed prefs");

        let translator = Arc::new(Translator::new(&TranslationConfig {
            anthropic_api_key: None,
            libre_url: "http://127.0.0.1:1".to_string(),
            libre_api_key: None,
            lexicon_base_url: "http://127.0.0.1:1".to_string(),
            models_dir: dir.path().join("models").to_string_lossy().to_string(),
            source_language: "en".to_string(),
            target_language: "fr".to_string(),
            command: "no-such-translator-binary".to_string(),
        }));
        let service = TranslationService::new(translator, prefs, "fr");

        assert!(service.is_downloaded("fr"));
        assert_eq!(service.model_state("fr"), ModelState::Ready);
        assert!(!service.is_downloaded("de"));
    }

    #[tokio::test]
    async fn superseded_translation_results_are_dropped() {
        let mut fixture = fixture("http://127.0.0.1:1");
        install_lexicon(&fixture);

        fixture.service.request_translation("entry/1", "hello");
        let latest = fixture.service.request_translation("entry/1", "hello world");

        let outcome = wait_for_translation(&mut fixture.service).await;
        assert_eq!(outcome.generation, latest);
        assert_eq!(outcome.result.expect("translate"), "你好 世界");

        // The first request's result never surfaces.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(fixture.service.poll_translation().is_none());
        assert!(!fixture.service.is_translating());
    }

    #[tokio::test]
    async fn engine_selection_is_persisted() {
        let mut fixture = fixture("http://127.0.0.1:1");

        assert_eq!(fixture.service.engine(), Engine::OnDevice);
        let engine = fixture.service.cycle_engine().expect("cycle");
        assert_eq!(engine, Engine::CloudLlm);
        assert_eq!(fixture.prefs.load().engine, Engine::CloudLlm);
    }
}
