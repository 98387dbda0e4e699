/// Terminal front end for the sliceview engine
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, ClearType},
};
use sliceview_core::{ExportStep, Mode, Result as ViewerResult, Viewer, ViewerError};
use std::io::{self, stdout, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub mod renderer;

pub use renderer::AsciiRenderer;

const ORBIT_STEP: f32 = 0.1;
const ZOOM_STEP: f32 = 1.1;
const SCALE_STEP: f32 = 0.05;
const POSITION_STEP: f32 = 0.05;
const CLIP_STEP: f32 = 0.05;
/// Factor applied to the slicing step per key press
const SLICE_STEP_FACTOR: f32 = 2.0;
/// Smallest scale reachable from the keyboard
const MIN_SCALE: f32 = 0.01;

/// Main application struct for the terminal viewer
pub struct TerminalApp {
    viewer: Viewer,
    renderer: AsciiRenderer,
    output_dir: PathBuf,
    status: Option<String>,
    running: bool,
    last_frame: Instant,
    frame_count: u32,
    fps: f32,
}

impl TerminalApp {
    /// Fit the viewer to the current terminal. Finished exports are
    /// written to `output_dir`.
    pub fn new(viewer: Viewer, output_dir: PathBuf) -> io::Result<Self> {
        let (width, height) = terminal::size()?;
        Ok(Self::with_size(viewer, output_dir, width, height))
    }

    pub fn with_size(viewer: Viewer, output_dir: PathBuf, columns: u16, rows: u16) -> Self {
        let mut app = Self {
            viewer,
            renderer: AsciiRenderer::new(columns as usize, rows as usize),
            output_dir,
            status: None,
            running: true,
            last_frame: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        };
        app.resize(columns, rows);
        app
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;

        let result = self.main_loop();

        // Cleanup
        terminal::disable_raw_mode()?;
        execute!(stdout(), terminal::LeaveAlternateScreen, cursor::Show)?;

        result
    }

    fn main_loop(&mut self) -> io::Result<()> {
        let target_frame_time = Duration::from_millis(1000 / 30); // 30 FPS target

        while self.running {
            let frame_start = Instant::now();

            while event::poll(Duration::from_millis(0))? {
                match event::read()? {
                    Event::Key(key) if key.kind != KeyEventKind::Release => self.handle_key(key),
                    Event::Resize(width, height) => self.resize(width, height),
                    _ => {}
                }
            }

            self.update();
            self.render()?;

            // Frame timing
            self.frame_count += 1;
            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                std::thread::sleep(target_frame_time - elapsed);
            }

            let now = Instant::now();
            if (now - self.last_frame).as_secs() >= 1 {
                self.fps = self.frame_count as f32 / (now - self.last_frame).as_secs_f32();
                self.frame_count = 0;
                self.last_frame = now;
            }
        }

        Ok(())
    }

    fn resize(&mut self, columns: u16, rows: u16) {
        self.renderer.resize(columns as usize, rows as usize);
        let (width, height) = self.renderer.pixel_size();
        self.viewer.resize(width.max(1), height.max(1));
    }

    /// Apply one key press. Failures end up on the status line.
    pub fn handle_key(&mut self, key: KeyEvent) {
        match self.apply_key(key) {
            Ok(Some(message)) => self.status = Some(message),
            Ok(None) => {}
            Err(err) => {
                warn!(%err, "action rejected");
                self.status = Some(err.to_string());
            }
        }
    }

    fn apply_key(&mut self, key: KeyEvent) -> ViewerResult<Option<String>> {
        let control = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if control => {
                let id = self.viewer.copy()?;
                Ok(Some(format!("copied {id}")))
            }
            KeyCode::Char('v') if control => {
                let id = self.viewer.paste()?;
                Ok(Some(format!("pasted {id}")))
            }
            KeyCode::Char('q') => {
                self.running = false;
                Ok(None)
            }
            KeyCode::Esc if self.viewer.is_exporting() => {
                self.viewer.cancel_export();
                Ok(Some("cancelling export".into()))
            }
            KeyCode::Esc => {
                self.running = false;
                Ok(None)
            }
            KeyCode::Char('w') | KeyCode::Up => self.orbit(0.0, ORBIT_STEP),
            KeyCode::Char('s') | KeyCode::Down => self.orbit(0.0, -ORBIT_STEP),
            KeyCode::Char('a') | KeyCode::Left => self.orbit(-ORBIT_STEP, 0.0),
            KeyCode::Char('d') | KeyCode::Right => self.orbit(ORBIT_STEP, 0.0),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.viewer.zoom(1.0 / ZOOM_STEP)?;
                Ok(None)
            }
            KeyCode::Char('-') => {
                self.viewer.zoom(ZOOM_STEP)?;
                Ok(None)
            }
            KeyCode::Char('m') => {
                let mode = self.viewer.mode().toggled();
                self.viewer.set_mode(mode)?;
                Ok(Some(format!("{mode} mode")))
            }
            KeyCode::Char('p') => Ok(Some(match self.viewer.pack()? {
                Some(report) => format!(
                    "packed {} models at scale {:.2}",
                    report.models, report.scale
                ),
                None => "nothing to pack".into(),
            })),
            KeyCode::Tab => self.cycle_selection(),
            KeyCode::Backspace => {
                self.viewer.select(None)?;
                Ok(None)
            }
            KeyCode::Char('[') => self.nudge_scale(-SCALE_STEP),
            KeyCode::Char(']') => self.nudge_scale(SCALE_STEP),
            KeyCode::Char('j') => self.nudge_position(-POSITION_STEP, 0.0, 0.0),
            KeyCode::Char('l') => self.nudge_position(POSITION_STEP, 0.0, 0.0),
            KeyCode::Char('u') => self.nudge_position(0.0, POSITION_STEP, 0.0),
            KeyCode::Char('o') => self.nudge_position(0.0, -POSITION_STEP, 0.0),
            KeyCode::Char('i') => self.nudge_position(0.0, 0.0, -POSITION_STEP),
            KeyCode::Char('k') => self.nudge_position(0.0, 0.0, POSITION_STEP),
            KeyCode::Char(',') => self.nudge_clipping(-CLIP_STEP),
            KeyCode::Char('.') => self.nudge_clipping(CLIP_STEP),
            KeyCode::Char('{') => self.scale_slice_step(1.0 / SLICE_STEP_FACTOR),
            KeyCode::Char('}') => self.scale_slice_step(SLICE_STEP_FACTOR),
            KeyCode::Char('h') => {
                let visible = !self.viewer.models_visible();
                self.viewer.set_models_visible(visible)?;
                Ok(Some(if visible { "models shown" } else { "models hidden" }.into()))
            }
            KeyCode::Char('e') => {
                let slices = self.viewer.begin_export()?;
                Ok(Some(format!("exporting {slices} slices")))
            }
            _ => Ok(None),
        }
    }

    fn orbit(&mut self, dyaw: f32, dpitch: f32) -> ViewerResult<Option<String>> {
        self.viewer.orbit_by(dyaw, dpitch)?;
        Ok(None)
    }

    fn cycle_selection(&mut self) -> ViewerResult<Option<String>> {
        let ids = self.viewer.model_ids();
        if ids.is_empty() {
            return Ok(Some("no models loaded".into()));
        }
        let next = match self.viewer.selection().model() {
            Some(current) => ids
                .iter()
                .position(|&id| id == current)
                .map_or(0, |index| (index + 1) % ids.len()),
            None => 0,
        };
        self.viewer.select(Some(ids[next]))?;
        Ok(Some(format!("selected {}", ids[next])))
    }

    fn nudge_scale(&mut self, delta: f32) -> ViewerResult<Option<String>> {
        let id = self.viewer.selection().model().ok_or(ViewerError::NothingSelected)?;
        let transform = self.viewer.selection().transform().ok_or(ViewerError::NothingSelected)?;
        self.viewer
            .set_scale(id, (transform.scale + delta).clamp(MIN_SCALE, 1.0))?;
        Ok(None)
    }

    fn nudge_position(&mut self, dx: f32, dy: f32, dz: f32) -> ViewerResult<Option<String>> {
        let id = self.viewer.selection().model().ok_or(ViewerError::NothingSelected)?;
        let t = self.viewer.selection().transform().ok_or(ViewerError::NothingSelected)?;
        let workspace = self.viewer.workspace();
        let (hx, hy, hz) = (
            workspace.width() / 2.0,
            workspace.height() / 2.0,
            workspace.depth() / 2.0,
        );
        self.viewer.set_position(
            id,
            (t.x + dx).clamp(-hx, hx),
            (t.y + dy).clamp(-hy, hy),
            (t.z + dz).clamp(-hz, hz),
        )?;
        Ok(None)
    }

    fn scale_slice_step(&mut self, factor: f32) -> ViewerResult<Option<String>> {
        let mut slicing = self.viewer.settings().slicing.clone();
        slicing.step *= factor;
        self.viewer.configure_slicing(slicing)?;
        Ok(Some(format!("slice step {:.4}", self.viewer.settings().slicing.step)))
    }

    fn nudge_clipping(&mut self, delta: f32) -> ViewerResult<Option<String>> {
        let limit = self.viewer.workspace().height() / 2.0;
        let constant = (self.viewer.clipping().constant() + delta).clamp(-limit, limit);
        self.viewer.set_clipping_constant(constant)?;
        Ok(None)
    }

    /// Drive a running export: one slice per frame when slices are shown,
    /// otherwise the whole export at once.
    pub fn update(&mut self) {
        if !self.viewer.is_exporting() {
            return;
        }
        let watch = self.viewer.settings().slicing.view_slice;
        loop {
            match self.viewer.advance_export() {
                Ok(ExportStep::Slice { index, total }) => {
                    self.status = Some(format!("slice {}/{}", index + 1, total));
                    if watch {
                        break;
                    }
                }
                Ok(ExportStep::Finished(archive)) => {
                    self.status = Some(match archive.save_to(&self.output_dir) {
                        Ok(path) => {
                            info!(path = %path.display(), slices = archive.entries.len(), "saved slices");
                            format!("saved {} ({} slices)", path.display(), archive.entries.len())
                        }
                        Err(err) => {
                            warn!(%err, "could not save slices");
                            err.to_string()
                        }
                    });
                    break;
                }
                Ok(ExportStep::Cancelled) => {
                    self.status = Some("export cancelled".into());
                    break;
                }
                Err(err) => {
                    warn!(%err, "export failed");
                    self.status = Some(err.to_string());
                    break;
                }
            }
        }
    }

    fn status_line(&self) -> String {
        let selection = match (self.viewer.selection().model(), self.viewer.selection().transform()) {
            (Some(id), Some(t)) => format!(
                "{id} scale {:.2} pos {:.2},{:.2},{:.2}",
                t.scale, t.x, t.y, t.z
            ),
            _ => "none".into(),
        };
        let mut line = format!(
            "Sliceview | {} | models: {} | sel: {} | clip: {:.2} | FPS: {:.1}",
            self.viewer.mode(),
            self.viewer.registry().len(),
            selection,
            self.viewer.clipping().constant(),
            self.fps
        );
        if let Some(status) = &self.status {
            line.push_str(" | ");
            line.push_str(status);
        }
        line
    }

    fn render(&mut self) -> io::Result<()> {
        let background = self.viewer.settings().model.background;
        // While exporting the last captured slice is shown as is
        let frame = if self.viewer.is_exporting() {
            self.viewer.frame()
        } else {
            self.viewer.render_frame()
        };
        self.renderer.render_frame(frame, background);

        let mut stdout = stdout();
        self.renderer.draw(&mut stdout)?;

        let color = if self.viewer.mode() == Mode::Slicing {
            Color::Cyan
        } else {
            Color::Yellow
        };
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            terminal::Clear(ClearType::CurrentLine),
            SetForegroundColor(color),
            Print(self.status_line()),
            ResetColor
        )?;

        stdout.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sliceview_core::{Geometry, Settings};

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.slicing.step = 0.5;
        settings.slicing.view_slice = false;
        settings.slicing.width_resolution = 8;
        settings.slicing.height_resolution = 8;
        settings
    }

    fn app_with(dir: &std::path::Path, settings: Settings) -> TerminalApp {
        let viewer = Viewer::new(settings, (1, 1)).unwrap();
        TerminalApp::with_size(viewer, dir.to_path_buf(), 40, 12)
    }

    fn app(dir: &std::path::Path) -> TerminalApp {
        app_with(dir, settings())
    }

    fn press(app: &mut TerminalApp, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[test]
    fn test_viewport_follows_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        assert_eq!(app.viewer().state().viewport, (40, 24));
    }

    #[test]
    fn test_mode_toggle_and_quit() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        press(&mut app, KeyCode::Char('m'));
        assert_eq!(app.viewer().mode(), Mode::Slicing);
        press(&mut app, KeyCode::Char('q'));
        assert!(!app.is_running());
    }

    #[test]
    fn test_copy_without_selection_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(app.status(), Some(ViewerError::NothingSelected.to_string().as_str()));
        assert!(app.is_running());
    }

    #[test]
    fn test_tab_cycles_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        let first = app.viewer.add_geometry(&Geometry::cube(1.0)).unwrap();
        let second = app.viewer.add_geometry(&Geometry::cube(1.0)).unwrap();

        press(&mut app, KeyCode::Tab);
        assert_eq!(app.viewer().selection().model(), Some(first));
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.viewer().selection().model(), Some(second));
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.viewer().selection().model(), Some(first));
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.viewer().selection().model(), None);
    }

    #[test]
    fn test_scale_keys_clamp() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.viewer.add_geometry(&Geometry::cube(1.0)).unwrap();
        press(&mut app, KeyCode::Tab);

        press(&mut app, KeyCode::Char('['));
        let scale = app.viewer().selection().transform().unwrap().scale;
        assert!((scale - 0.95).abs() < 1e-4);

        press(&mut app, KeyCode::Char(']'));
        press(&mut app, KeyCode::Char(']'));
        let scale = app.viewer().selection().transform().unwrap().scale;
        assert!((scale - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_position_keys_follow_workspace_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings();
        settings.workspace.width = 4.0;
        let mut app = app_with(dir.path(), settings);
        let id = app.viewer.add_geometry(&Geometry::cube(1.0)).unwrap();
        press(&mut app, KeyCode::Tab);

        let t = app.viewer().selection().transform().unwrap();
        app.viewer.set_position(id, 1.5, t.y, t.z).unwrap();
        press(&mut app, KeyCode::Char('l'));
        let x = app.viewer().selection().transform().unwrap().x;
        assert!((x - 1.55).abs() < 1e-4, "x = {x}");

        for _ in 0..20 {
            press(&mut app, KeyCode::Char('l'));
        }
        let x = app.viewer().selection().transform().unwrap().x;
        assert!((x - 2.0).abs() < 1e-4, "x = {x}");
    }

    #[test]
    fn test_slice_step_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        press(&mut app, KeyCode::Char('}'));
        press(&mut app, KeyCode::Char('}'));
        assert_eq!(app.viewer().settings().slicing.step, 2.0);

        // Coarser than the workspace height
        press(&mut app, KeyCode::Char('}'));
        assert_eq!(app.viewer().settings().slicing.step, 2.0);
        assert!(app.status().unwrap().contains("slicing step"));

        press(&mut app, KeyCode::Char('{'));
        assert_eq!(app.viewer().settings().slicing.step, 1.0);

        app.viewer.add_geometry(&Geometry::cube(1.0)).unwrap();
        press(&mut app, KeyCode::Char('m'));
        press(&mut app, KeyCode::Char('e'));
        assert_eq!(app.status(), Some("exporting 3 slices"));
    }

    #[test]
    fn test_hide_models_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        press(&mut app, KeyCode::Char('h'));
        assert!(!app.viewer().models_visible());
        press(&mut app, KeyCode::Char('h'));
        assert!(app.viewer().models_visible());
    }

    #[test]
    fn test_clipping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        press(&mut app, KeyCode::Char('.'));
        press(&mut app, KeyCode::Char('.'));
        assert!((app.viewer().clipping().constant() - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_export_writes_archive() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.viewer.add_geometry(&Geometry::cube(1.0)).unwrap();

        press(&mut app, KeyCode::Char('e'));
        assert_eq!(app.status(), Some(ViewerError::NotSlicingMode.to_string().as_str()));

        press(&mut app, KeyCode::Char('m'));
        press(&mut app, KeyCode::Char('e'));
        assert!(app.viewer().is_exporting());

        app.update();
        assert!(!app.viewer().is_exporting());
        assert!(app.viewer().controls_enabled());
        assert!(dir.path().join("slicing.zip").exists());
        assert!(app.status().unwrap().contains("5 slices"));
    }

    #[test]
    fn test_escape_cancels_export() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.viewer.add_geometry(&Geometry::cube(1.0)).unwrap();
        press(&mut app, KeyCode::Char('m'));
        press(&mut app, KeyCode::Char('e'));

        press(&mut app, KeyCode::Esc);
        assert!(app.is_running());
        app.update();
        assert_eq!(app.status(), Some("export cancelled"));
        assert!(!dir.path().join("slicing.zip").exists());
    }
}
