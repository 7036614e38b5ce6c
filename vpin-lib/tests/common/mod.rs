//! Shared fixture for the end-to-end tests: a tempdir-backed installation
//! layout, a scripted command runner and a recording listener.

#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::Duration;

use vpin_core::{Game, GameId, HighscoreChangedEvent};
use vpin_lib::command::{CommandOutput, CommandRunner};
use vpin_lib::dispatcher::HighscoreChangeListener;
use vpin_lib::paths::Paths;

/// Installation layout inside a tempdir.
pub struct FixturePaths {
    pub root: PathBuf,
}

impl FixturePaths {
    /// Create the standard folder skeleton with a present decoder.
    pub fn create(root: &Path) -> Arc<Self> {
        std::fs::create_dir_all(root.join("nvram")).unwrap();
        std::fs::create_dir_all(root.join("User")).unwrap();
        std::fs::create_dir_all(root.join("pinemhi")).unwrap();
        std::fs::create_dir_all(root.join("VPReg")).unwrap();
        std::fs::write(root.join("pinemhi/PINemHi.exe"), b"").unwrap();
        std::fs::write(root.join("pinemhi/pinemhi.ini"), "VP=unset\n").unwrap();
        Arc::new(Self { root: root.to_path_buf() })
    }

    pub fn nv_file(&self, rom: &str) -> PathBuf {
        self.nvram_folder().join(format!("{rom}.nv"))
    }

    pub fn write_nv(&self, rom: &str) {
        std::fs::write(self.nv_file(rom), rom.as_bytes()).unwrap();
    }

    pub fn touch_nv(&self, rom: &str) {
        std::fs::write(self.nv_file(rom), b"touched").unwrap();
    }

    pub fn touch_store(&self) {
        std::fs::write(self.reg_backed_store_file(), b"stg").unwrap();
    }

    pub fn write_extracted_entry(&self, display_name: &str, contents: &str) {
        let dir = self.extracted_reg_store_folder().join(display_name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("scores.txt"), contents).unwrap();
    }
}

impl Paths for FixturePaths {
    fn nvram_folder(&self) -> PathBuf {
        self.root.join("nvram")
    }
    fn reg_backed_store_file(&self) -> PathBuf {
        self.root.join("User/VPReg.stg")
    }
    fn extracted_reg_store_folder(&self) -> PathBuf {
        self.root.join("VPReg")
    }
    fn decoder_executable(&self) -> PathBuf {
        self.root.join("pinemhi/PINemHi.exe")
    }
    fn decoder_config_file(&self) -> PathBuf {
        self.root.join("pinemhi/pinemhi.ini")
    }
}

/// Command runner whose output can be rescripted between calls. Tracks
/// invocation count and peak concurrency.
pub struct ScriptedRunner {
    stdout: Mutex<String>,
    stderr: Mutex<String>,
    exit_code: AtomicI32,
    delay: Duration,
    pub calls: AtomicUsize,
    active: AtomicUsize,
    pub peak_active: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new(stdout: &str) -> Arc<Self> {
        Arc::new(Self {
            stdout: Mutex::new(stdout.to_string()),
            stderr: Mutex::new(String::new()),
            exit_code: AtomicI32::new(0),
            delay: Duration::from_millis(0),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak_active: AtomicUsize::new(0),
        })
    }

    pub fn with_delay(stdout: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            stdout: Mutex::new(stdout.to_string()),
            stderr: Mutex::new(String::new()),
            exit_code: AtomicI32::new(0),
            delay,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak_active: AtomicUsize::new(0),
        })
    }

    pub fn set_stdout(&self, stdout: &str) {
        *self.stdout.lock().unwrap() = stdout.to_string();
    }

    pub fn set_failure(&self, exit_code: i32, stderr: &str) {
        self.exit_code.store(exit_code, Ordering::SeqCst);
        *self.stderr.lock().unwrap() = stderr.to_string();
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        _cmd: &Path,
        _args: &[String],
        _working_dir: &Path,
        _timeout: Duration,
    ) -> io::Result<CommandOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(CommandOutput {
            stdout: self.stdout.lock().unwrap().clone(),
            stderr: self.stderr.lock().unwrap().clone(),
            exit_code: self.exit_code.load(Ordering::SeqCst),
            timed_out: false,
        })
    }
}

/// Listener that records everything it receives.
#[derive(Default)]
pub struct RecordingListener {
    pub events: Mutex<Vec<HighscoreChangedEvent>>,
    pub shut_down: AtomicBool,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events_for(&self, id: GameId) -> Vec<HighscoreChangedEvent> {
        self.events.lock().unwrap().iter().filter(|e| e.game_id == id).cloned().collect()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl HighscoreChangeListener for RecordingListener {
    fn highscore_changed(&self, event: &HighscoreChangedEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn shutting_down(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

pub fn make_game(paths: &FixturePaths, id: u32, rom: &str, display_name: &str) -> Game {
    Game {
        id: GameId(id),
        rom: rom.to_string(),
        display_name: display_name.to_string(),
        vpx_file: paths.root.join(format!("Tables/{display_name}.vpx")),
        nvram_file: paths.nv_file(rom),
        rom_file: None,
        last_played: None,
        number_plays: 0,
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
