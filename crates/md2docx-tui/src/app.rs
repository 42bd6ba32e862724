use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use md2docx_core::api::ApiClient;
use md2docx_core::auth::{
    AuthorizationExchange, CallbackController, CallbackState, CredentialStore, MountHandle,
    Navigator, CALLBACK_ROUTE, HOME_ROUTE,
};
use md2docx_core::gate::LOGIN_FAILURE_MESSAGE;
use md2docx_core::models::{ConversionResult, GoogleDoc};
use md2docx_core::{Config, SessionGate};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task channel
const CHANNEL_BUFFER_SIZE: usize = 16;

/// File name for the downloaded archive
pub const ARCHIVE_FILE_NAME: &str = "converted_markdown_files.zip";

/// Maximum accepted length of a pasted redirect URL
const MAX_REDIRECT_LEN: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingHelp,
    ConfirmingQuit,
    Quitting,
}

/// Which route is on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Home,
    /// Waiting for the user to paste the provider redirect URL
    RedirectPrompt,
    Callback,
}

/// Background work currently in flight on the home screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    StartingLogin,
    Fetching,
    Converting,
    Downloading,
}

impl Activity {
    pub fn label(&self) -> &'static str {
        match self {
            Activity::StartingLogin => "Contacting login service...",
            Activity::Fetching => "Fetching...",
            Activity::Converting => "Converting...",
            Activity::Downloading => "Downloading...",
        }
    }
}

/// Navigation requested from the session lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    Push(String),
    Refresh,
    OpenExternal(String),
}

/// Forwards navigation requests to the main loop
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<NavEvent>,
}

impl ChannelNavigator {
    fn send(&self, event: NavEvent) {
        if self.tx.send(event).is_err() {
            debug!("Navigation dropped, main loop gone");
        }
    }
}

impl Navigator for ChannelNavigator {
    fn push(&self, route: &str) {
        self.send(NavEvent::Push(route.to_string()));
    }

    fn refresh(&self) {
        self.send(NavEvent::Refresh);
    }

    fn open_external(&self, url: &str) {
        self.send(NavEvent::OpenExternal(url.to_string()));
    }
}

/// Results sent back from background tasks
enum TaskResult {
    Login(Result<(), String>),
    Documents(Result<Vec<GoogleDoc>, String>),
    Conversion(Result<ConversionResult, String>),
    Download(Result<PathBuf, String>),
}

/// A mounted callback screen. Dropping it tears the controller down.
struct CallbackMount {
    _handle: MountHandle,
    state: watch::Receiver<CallbackState>,
}

pub struct App {
    pub config: Config,
    gate: Arc<SessionGate>,
    store: Arc<CredentialStore>,
    exchange: Arc<AuthorizationExchange>,
    navigator: Arc<ChannelNavigator>,
    nav_rx: mpsc::UnboundedReceiver<NavEvent>,
    task_tx: mpsc::Sender<TaskResult>,
    task_rx: mpsc::Receiver<TaskResult>,

    pub state: AppState,
    pub screen: Screen,
    callback: Option<CallbackMount>,

    // Redirect prompt
    pub redirect_input: String,
    pub login_url: Option<String>,

    // Documents
    pub docs: Vec<GoogleDoc>,
    pub doc_selection: usize,
    pub conversion: Option<ConversionResult>,
    pub activity: Option<Activity>,

    pub error: Option<String>,
    pub status_message: Option<String>,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config) -> Result<Self> {
        debug!(api = %config.api_base_url, production = config.is_production(), "App::new()");

        let store = Arc::new(CredentialStore::from_config(&config));
        if !store.is_available() {
            warn!("No storage directory, the session will not persist");
        }

        let api = ApiClient::new(&config.api_base_url)?;
        let exchange = Arc::new(AuthorizationExchange::new(&config.api_base_url)?);

        let (nav_tx, nav_rx) = mpsc::unbounded_channel();
        let navigator = Arc::new(ChannelNavigator { tx: nav_tx });
        let gate = Arc::new(SessionGate::new(store.clone(), api, navigator.clone()));

        let (task_tx, task_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        Ok(Self {
            config,
            gate,
            store,
            exchange,
            navigator,
            nav_rx,
            task_tx,
            task_rx,

            state: AppState::Normal,
            screen: Screen::Home,
            callback: None,

            redirect_input: String::new(),
            login_url: None,

            docs: Vec::new(),
            doc_selection: 0,
            conversion: None,
            activity: None,

            error: None,
            status_message: None,
        })
    }

    // =========================================================================
    // Session
    // =========================================================================

    pub fn is_authenticated(&self) -> bool {
        self.gate.is_authenticated()
    }

    /// "Signed in as ..." summary for the status bar
    pub fn session_summary(&self) -> String {
        let session = self.gate.session();
        match session.minutes_until_expiry() {
            Some(minutes) => {
                let who = session.display_name().unwrap_or_else(|| "Google user".to_string());
                format!("Signed in as {} ({}m left)", who, minutes)
            }
            None => "Not signed in".to_string(),
        }
    }

    /// Request the provider login URL; navigation follows via the navigator
    pub fn start_login(&mut self) {
        if self.activity.is_some() {
            return;
        }
        self.error = None;
        self.activity = Some(Activity::StartingLogin);

        let gate = self.gate.clone();
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = gate
                .login()
                .await
                .map(|_| ())
                .map_err(|e| e.user_message(LOGIN_FAILURE_MESSAGE));
            Self::send_result(&tx, TaskResult::Login(result)).await;
        });
    }

    pub fn logout(&mut self) {
        self.gate.logout();
        self.docs.clear();
        self.doc_selection = 0;
        self.conversion = None;
        self.error = None;
        self.status_message = Some("Logged out".to_string());
    }

    // =========================================================================
    // Routing
    // =========================================================================

    pub fn show_redirect_prompt(&mut self) {
        self.redirect_input.clear();
        self.error = None;
        self.screen = Screen::RedirectPrompt;
    }

    /// Mount the callback screen for a redirect URL and start its controller
    pub fn open_callback(&mut self, redirect: String) {
        // Any previous mount is torn down before the new one starts
        self.callback = None;

        let (controller, handle, state) = CallbackController::mount(
            redirect,
            self.exchange.clone(),
            self.store.clone(),
            self.navigator.clone(),
        );
        tokio::spawn(async move {
            let outcome = controller.run().await;
            debug!(?outcome, "Callback finished");
        });

        self.callback = Some(CallbackMount {
            _handle: handle,
            state,
        });
        self.screen = Screen::Callback;
    }

    pub fn callback_state(&self) -> CallbackState {
        self.callback
            .as_ref()
            .map(|c| c.state.borrow().clone())
            .unwrap_or(CallbackState::Extracting)
    }

    /// Navigate to a route. Leaving the callback screen unmounts it.
    pub fn navigate(&mut self, route: &str) {
        if route == HOME_ROUTE {
            self.callback = None;
            self.screen = Screen::Home;
        } else if route.starts_with(CALLBACK_ROUTE) {
            self.open_callback(route.to_string());
        } else {
            warn!(route, "Unknown route");
        }
    }

    pub fn submit_redirect(&mut self) {
        let redirect = self.redirect_input.trim().to_string();
        self.redirect_input.clear();
        self.open_callback(redirect);
    }

    pub fn push_redirect_text(&mut self, text: &str) {
        for c in text.chars().filter(|c| !c.is_control()) {
            if self.redirect_input.len() >= MAX_REDIRECT_LEN {
                break;
            }
            self.redirect_input.push(c);
        }
    }

    // =========================================================================
    // Protected Actions
    // =========================================================================

    pub fn fetch_documents(&mut self) {
        if self.activity.is_some() {
            return;
        }
        self.error = None;
        self.activity = Some(Activity::Fetching);

        let gate = self.gate.clone();
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = gate
                .list_documents()
                .await
                .map_err(|e| e.user_message("Failed to fetch documents"));
            Self::send_result(&tx, TaskResult::Documents(result)).await;
        });
    }

    pub fn convert_documents(&mut self) {
        if self.activity.is_some() || self.docs.is_empty() {
            return;
        }
        self.error = None;
        self.conversion = None;
        self.activity = Some(Activity::Converting);

        let gate = self.gate.clone();
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = gate
                .convert_documents()
                .await
                .map_err(|e| e.user_message("Conversion failed"));
            Self::send_result(&tx, TaskResult::Conversion(result)).await;
        });
    }

    pub fn download_archive(&mut self) {
        if self.activity.is_some() {
            return;
        }
        self.error = None;
        self.activity = Some(Activity::Downloading);

        let gate = self.gate.clone();
        let tx = self.task_tx.clone();
        let conversion = self.conversion.clone();
        let target = self.config.download_dir().join(ARCHIVE_FILE_NAME);
        tokio::spawn(async move {
            let result = match gate.download_archive(conversion.as_ref()).await {
                Ok(bytes) => save_archive(&target, &bytes).map_err(|e| {
                    warn!(error = %e, "Failed to save archive");
                    "Download failed".to_string()
                }),
                Err(e) => Err(e.user_message("Download failed")),
            };
            Self::send_result(&tx, TaskResult::Download(result)).await;
        });
    }

    pub fn select_next_doc(&mut self) {
        if !self.docs.is_empty() {
            self.doc_selection = (self.doc_selection + 1).min(self.docs.len() - 1);
        }
    }

    pub fn select_prev_doc(&mut self) {
        self.doc_selection = self.doc_selection.saturating_sub(1);
    }

    // =========================================================================
    // Background Tasks
    // =========================================================================

    async fn send_result(tx: &mpsc::Sender<TaskResult>, result: TaskResult) {
        if tx.send(result).await.is_err() {
            debug!("Task result dropped, receiver gone");
        }
    }

    /// Drain navigation requests and finished background tasks
    pub fn check_background_tasks(&mut self) {
        while let Ok(event) = self.nav_rx.try_recv() {
            self.process_nav_event(event);
        }
        while let Ok(result) = self.task_rx.try_recv() {
            self.process_task_result(result);
        }
    }

    fn process_nav_event(&mut self, event: NavEvent) {
        debug!(?event, "Navigation");
        match event {
            NavEvent::Push(route) => self.navigate(&route),
            NavEvent::Refresh => {
                self.docs.clear();
                self.doc_selection = 0;
                self.conversion = None;
                self.error = None;
                // The status bar falls back to the live session summary
                self.status_message = None;
            }
            NavEvent::OpenExternal(url) => {
                if let Err(e) = open_in_browser(&url) {
                    warn!(error = %e, "Could not launch a browser");
                }
                self.login_url = Some(url);
                self.show_redirect_prompt();
            }
        }
    }

    fn process_task_result(&mut self, result: TaskResult) {
        self.activity = None;

        // Results that finish after logout or expiry belong to a dead session
        if matches!(result, TaskResult::Documents(Ok(_)) | TaskResult::Conversion(Ok(_)))
            && !self.is_authenticated()
        {
            debug!("Discarding protected result for a signed-out session");
            return;
        }

        match result {
            TaskResult::Login(Ok(())) => {}
            TaskResult::Documents(Ok(docs)) => {
                info!(count = docs.len(), "Documents loaded");
                self.doc_selection = 0;
                self.docs = docs;
            }
            TaskResult::Conversion(Ok(result)) => {
                self.status_message = Some(format!(
                    "Converted {} of {} files",
                    result.converted_count(),
                    result.total_files
                ));
                self.conversion = Some(result);
            }
            TaskResult::Download(Ok(path)) => {
                self.status_message = Some(format!("Saved {}", path.display()));
            }
            TaskResult::Login(Err(message))
            | TaskResult::Documents(Err(message))
            | TaskResult::Conversion(Err(message))
            | TaskResult::Download(Err(message)) => {
                self.error = Some(message);
            }
        }
    }
}

fn save_archive(target: &std::path::Path, bytes: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(target, bytes)?;
    Ok(target.to_path_buf())
}

/// Launch the platform browser opener for the provider login page
fn open_in_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    let mut command = std::process::Command::new("open");
    #[cfg(target_os = "windows")]
    let mut command = {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    };
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut command = std::process::Command::new("xdg-open");

    command
        .arg(url)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()?;
    Ok(())
}
