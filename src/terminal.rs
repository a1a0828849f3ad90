// SPDX-License-Identifier: GPL-3.0-only

//! Terminal-based depth viewer
//!
//! Renders the annotated depth feed to the terminal using Unicode half-block
//! characters for improved vertical resolution, and maps mouse clicks back
//! to depth pixels.

use crate::backends::camera::frame_loop::run_capture_loop;
use crate::backends::camera::{
    CaptureSession, DepthFrame, DepthSource, FrameEvent, LoopAction, PixelCoordinate,
};
use crate::config::Config;
use crate::constants::INPUT_POLL_INTERVAL;
use crate::depth::{AnnotatedFrame, Annotator, ClickContext, ViewMode};
use crate::errors::{AppError, AppResult};
use crate::snapshot;

use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind,
        KeyModifiers, MouseButton, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::Widget,
};
use std::io::{self, stdout};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

/// Run the terminal depth viewer
///
/// The depth stream is opened before the terminal is touched so startup
/// failures print normally. The stream is released on every exit path.
pub fn run<S: DepthSource>(source: S, mode: ViewMode, config: &Config) -> AppResult<()> {
    let annotator = Annotator::new(config.colormap_alpha, config.palette);
    let session = CaptureSession::open(source)?;

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the viewer
    let result = run_app(&mut terminal, session, &annotator, mode, config);

    // Restore terminal
    let restored = first_error([
        disable_raw_mode(),
        execute!(
            terminal.backend_mut(),
            DisableMouseCapture,
            LeaveAlternateScreen
        ),
        terminal.show_cursor(),
    ]);
    if let Err(e) = &restored {
        error!("Failed to restore terminal: {}", e);
    }

    // A viewer error takes precedence over a restore error
    result.and(restored.map_err(AppError::from))
}

/// Every step has already run; report the first failure
fn first_error<const N: usize>(steps: [io::Result<()>; N]) -> io::Result<()> {
    steps.into_iter().fold(Ok(()), |acc, step| acc.and(step))
}

fn run_app<S: DepthSource>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    session: CaptureSession<S>,
    annotator: &Annotator,
    mode: ViewMode,
    config: &Config,
) -> AppResult<()> {
    let mut viewer = Viewer::new(annotator, mode, config.snapshot_directory());
    viewer.draw(terminal)?;

    let summary = run_capture_loop(session, |source, event| {
        // A missing frame keeps the previous image and selection on screen
        if let FrameEvent::Ready(frame) = event {
            viewer.show(source, frame);
        }
        viewer.draw(terminal)?;
        viewer.poll_input(source)
    })?;

    info!(
        frames = summary.frames,
        missed = summary.missed,
        "Viewer closed"
    );
    Ok(())
}

/// Interactive state of the viewer between cycles
struct Viewer<'a> {
    annotator: &'a Annotator,
    mode: ViewMode,
    clicks: ClickContext,
    last_frame: Option<DepthFrame>,
    current: Option<AnnotatedFrame>,
    layout: Option<FrameLayout>,
    show_help: bool,
    status_message: String,
    snapshot_dir: PathBuf,
}

impl<'a> Viewer<'a> {
    fn new(annotator: &'a Annotator, mode: ViewMode, snapshot_dir: PathBuf) -> Self {
        Self {
            annotator,
            mode,
            clicks: ClickContext::new(),
            last_frame: None,
            current: None,
            layout: None,
            show_help: false,
            status_message: build_status_message(mode),
            snapshot_dir,
        }
    }

    /// Annotate a freshly captured frame
    fn show<S: DepthSource + ?Sized>(&mut self, source: &S, frame: &DepthFrame) {
        self.current = Some(
            self.annotator
                .annotate(source, frame, self.mode.target(&self.clicks)),
        );
        self.last_frame = Some(frame.clone());
    }

    /// Re-annotate the last frame after the selection changed
    fn refresh<S: DepthSource + ?Sized>(&mut self, source: &S) {
        if let Some(frame) = &self.last_frame {
            self.current = Some(
                self.annotator
                    .annotate(source, frame, self.mode.target(&self.clicks)),
            );
        }
    }

    fn draw(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> AppResult<()> {
        let mut layout = None;
        let status = self.status_line();

        terminal.draw(|f| {
            let area = f.area();

            // Reserve bottom line for status
            let camera_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(1),
            };

            layout = self
                .current
                .as_ref()
                .map(|frame| FrameLayout::fit(camera_area, frame.width(), frame.height()));

            f.render_widget(
                FrameView {
                    frame: self.current.as_ref(),
                    layout,
                    marker: self.mode == ViewMode::Click,
                },
                camera_area,
            );

            // Render status bar
            let status_area = Rect {
                x: area.x,
                y: area.y + area.height.saturating_sub(1),
                width: area.width,
                height: area.height.min(1),
            };
            f.render_widget(StatusBar { message: &status }, status_area);
        })?;

        self.layout = layout;
        Ok(())
    }

    /// Drain pending input, waiting at most one refresh interval for the first event
    fn poll_input<S: DepthSource + ?Sized>(&mut self, source: &S) -> AppResult<LoopAction> {
        let mut timeout = INPUT_POLL_INTERVAL;
        while event::poll(timeout)? {
            timeout = Duration::ZERO;
            if self.handle_event(source, event::read()?) == LoopAction::Stop {
                return Ok(LoopAction::Stop);
            }
        }
        Ok(LoopAction::Continue)
    }

    fn handle_event<S: DepthSource + ?Sized>(&mut self, source: &S, event: Event) -> LoopAction {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                // Esc, q and Ctrl+C quit
                if key.code == KeyCode::Esc || key.code == KeyCode::Char('q') {
                    return LoopAction::Stop;
                }
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
                {
                    return LoopAction::Stop;
                }

                // 'p' to save a snapshot
                if key.code == KeyCode::Char('p') {
                    self.show_help = false;
                    self.save_snapshot();
                }

                // 'c' to clear the selected point
                if key.code == KeyCode::Char('c') && self.mode == ViewMode::Click {
                    self.clicks.clear();
                    self.refresh(source);
                }

                // 'h' to toggle help
                if key.code == KeyCode::Char('h') {
                    self.show_help = !self.show_help;
                    self.status_message = if self.show_help {
                        build_help_message(self.mode)
                    } else {
                        build_status_message(self.mode)
                    };
                }
            }
            Event::Mouse(mouse) if mouse.kind == MouseEventKind::Down(MouseButton::Left) => {
                if self.mode != ViewMode::Click {
                    return LoopAction::Continue;
                }
                // Clicks on the letterbox or the status bar map to no pixel
                let Some(layout) = self.layout else {
                    return LoopAction::Continue;
                };
                if let Some(point) = layout.pixel_at(mouse.column, mouse.row)
                    && self
                        .clicks
                        .select(point, layout.frame_width, layout.frame_height)
                {
                    self.refresh(source);
                }
            }
            _ => {}
        }
        LoopAction::Continue
    }

    fn save_snapshot(&mut self) {
        let Some(frame) = &self.current else {
            self.status_message = "No frame to save yet".to_string();
            return;
        };
        match snapshot::save_png(frame, &self.snapshot_dir) {
            Ok(path) => {
                self.status_message = format!("Saved: {}", path.display());
            }
            Err(e) => {
                error!("Failed to save snapshot: {}", e);
                self.status_message = format!("Error: {}", e);
            }
        }
    }

    /// Current readout followed by the status message
    fn status_line(&self) -> String {
        let readout = match self.current.as_ref().and_then(|f| f.point.zip(f.distance)) {
            Some((point, distance)) => format!("{} @ {}", distance, point),
            None if self.mode == ViewMode::Click => "click to measure".to_string(),
            None => "waiting for depth".to_string(),
        };
        format!("{} | {}", readout, self.status_message)
    }
}

fn build_status_message(mode: ViewMode) -> String {
    let mut msg = "'p' snapshot".to_string();
    if mode == ViewMode::Click {
        msg.push_str(" | 'c' clear");
    }
    msg.push_str(" | 'h' help | Esc quit");
    msg
}

fn build_help_message(mode: ViewMode) -> String {
    let mut msg = String::new();
    if mode == ViewMode::Click {
        msg.push_str("Left click: Measure | c: Clear point | ");
    }
    msg.push_str("p: Save snapshot | h: Toggle help | Esc/q/Ctrl+C: Quit");
    msg
}

/// Placement of a frame inside a terminal area
///
/// Each terminal cell shows two vertically stacked pixels. The same layout
/// is used to render and to map clicks back to frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameLayout {
    pub x_offset: u16,
    pub y_offset: u16,
    pub display_width: u16,
    pub display_height: u16,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl FrameLayout {
    /// Fit a `frame_width` x `frame_height` frame into `area`, keeping aspect ratio
    pub fn fit(area: Rect, frame_width: u32, frame_height: u32) -> Self {
        let frame_aspect = frame_width as f64 / frame_height.max(1) as f64;
        let term_width = area.width as f64;
        let term_height = (area.height as f64) * 2.0; // *2 because half-blocks

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            // Terminal is wider - fit to height
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            // Terminal is taller - fit to width
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        let display_width = display_width.min(area.width);
        let display_height = display_height.min(area.height);

        Self {
            x_offset: area.x + area.width.saturating_sub(display_width) / 2,
            y_offset: area.y + area.height.saturating_sub(display_height) / 2,
            display_width,
            display_height,
            frame_width,
            frame_height,
        }
    }

    /// Whether nothing of the frame fits
    pub fn is_empty(&self) -> bool {
        self.display_width == 0 || self.display_height == 0 || self.frame_width == 0
            || self.frame_height == 0
    }

    fn x_scale(&self) -> f64 {
        self.frame_width as f64 / self.display_width as f64
    }

    fn y_scale(&self) -> f64 {
        self.frame_height as f64 / (self.display_height as f64 * 2.0)
    }

    fn clamp(&self, x: f64, y: f64) -> PixelCoordinate {
        PixelCoordinate::new(
            (x as u32).min(self.frame_width - 1),
            (y as u32).min(self.frame_height - 1),
        )
    }

    /// Frame pixel shown in the upper or lower half of cell `(tx, ty)`
    fn source_pixel(&self, tx: u16, ty: u16, lower: bool) -> PixelCoordinate {
        let half = if lower { 1.0 } else { 0.0 };
        self.clamp(
            tx as f64 * self.x_scale(),
            (ty as f64 * 2.0 + half) * self.y_scale(),
        )
    }

    /// Frame pixel under the terminal cell at `(column, row)`
    ///
    /// `None` for cells outside the displayed image.
    pub fn pixel_at(&self, column: u16, row: u16) -> Option<PixelCoordinate> {
        if self.is_empty() || column < self.x_offset || row < self.y_offset {
            return None;
        }
        let tx = column - self.x_offset;
        let ty = row - self.y_offset;
        if tx >= self.display_width || ty >= self.display_height {
            return None;
        }
        Some(self.clamp(
            (tx as f64 + 0.5) * self.x_scale(),
            (ty as f64 + 0.5) * 2.0 * self.y_scale(),
        ))
    }

    /// Terminal cell showing frame pixel `point`
    pub fn cell_at(&self, point: PixelCoordinate) -> Option<(u16, u16)> {
        if self.is_empty() {
            return None;
        }
        let tx = ((point.x as f64 / self.x_scale()) as u16).min(self.display_width - 1);
        let ty = ((point.y as f64 / (2.0 * self.y_scale())) as u16).min(self.display_height - 1);
        Some((self.x_offset + tx, self.y_offset + ty))
    }
}

/// Widget that renders an annotated frame using half-block characters
struct FrameView<'a> {
    frame: Option<&'a AnnotatedFrame>,
    layout: Option<FrameLayout>,
    /// Mark the measured cell (click mode)
    marker: bool,
}

impl Widget for FrameView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (Some(frame), Some(layout)) = (self.frame, self.layout) else {
            // No frame yet - show placeholder
            let msg = "Waiting for depth stream...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_stringn(x, y, msg, area.width as usize, Style::default());
            }
            return;
        };

        if layout.is_empty() {
            return;
        }

        // Render using half-block characters
        // Each terminal cell represents 2 vertical pixels:
        // - Upper half (▀) colored with fg
        // - Lower half colored with bg
        for ty in 0..layout.display_height {
            for tx in 0..layout.display_width {
                let top = layout.source_pixel(tx, ty, false);
                let bottom = layout.source_pixel(tx, ty, true);

                if let Some(cell) = buf.cell_mut((layout.x_offset + tx, layout.y_offset + ty)) {
                    cell.set_char('▀');
                    cell.set_fg(pixel_color(frame, top));
                    cell.set_bg(pixel_color(frame, bottom));
                }
            }
        }

        // The image marker can vanish when downscaled, so mark the cell too
        if self.marker
            && frame.label.is_some()
            && let Some(point) = frame.point
            && let Some(cell) = layout.cell_at(point).and_then(|pos| buf.cell_mut(pos))
        {
            cell.set_char('+');
            cell.set_fg(Color::White);
            cell.set_bg(Color::Black);
        }

        if let Some(label) = &frame.label
            && let Some((x, y)) = layout.cell_at(label.anchor)
        {
            let right_edge = layout.x_offset + layout.display_width;
            let width = right_edge.saturating_sub(x) as usize;
            // Shift left when the label would run off the image
            let x = if label.text.len() > width {
                right_edge
                    .saturating_sub(label.text.len() as u16)
                    .max(layout.x_offset)
            } else {
                x
            };
            buf.set_stringn(
                x,
                y,
                &label.text,
                right_edge.saturating_sub(x) as usize,
                Style::default()
                    .fg(Color::White)
                    .bg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            );
        }
    }
}

fn pixel_color(frame: &AnnotatedFrame, point: PixelCoordinate) -> Color {
    let [r, g, b] = frame.image.get_pixel(point.x, point.y).0;
    Color::Rgb(r, g, b)
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 {
            return;
        }

        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        buf.set_stringn(
            area.x,
            area.y,
            self.message,
            area.width as usize,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{StreamFormat, SyntheticDepthSource};
    use crate::depth::{Palette, Target};
    use crossterm::event::{KeyEvent, MouseEvent};

    fn area(width: u16, height: u16) -> Rect {
        Rect {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    fn click(column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn source() -> SyntheticDepthSource {
        SyntheticDepthSource::new(
            StreamFormat {
                width: 640,
                height: 480,
                fps: 30,
            },
            0.001,
        )
    }

    fn frame() -> DepthFrame {
        DepthFrame::new(640, 480, vec![1200; 640 * 480], 1).unwrap()
    }

    #[test]
    fn test_layout_fits_height_on_wide_terminal() {
        let layout = FrameLayout::fit(area(80, 25), 640, 480);
        assert_eq!(layout.display_height, 25);
        assert_eq!(layout.display_width, 66);
        assert_eq!(layout.x_offset, 7);
        assert_eq!(layout.y_offset, 0);
    }

    #[test]
    fn test_pixel_at_rejects_letterbox() {
        let layout = FrameLayout::fit(area(80, 25), 640, 480);
        assert_eq!(layout.pixel_at(6, 10), None);
        assert_eq!(layout.pixel_at(73, 10), None);
        assert_eq!(layout.pixel_at(10, 25), None);
    }

    #[test]
    fn test_pixel_at_stays_in_bounds() {
        let layout = FrameLayout::fit(area(80, 25), 640, 480);
        for column in layout.x_offset..layout.x_offset + layout.display_width {
            for row in 0..layout.display_height {
                let p = layout.pixel_at(column, row).unwrap();
                assert!(p.x < 640 && p.y < 480, "{:?}", p);
            }
        }
    }

    #[test]
    fn test_cell_and_pixel_agree() {
        let layout = FrameLayout::fit(area(80, 25), 640, 480);
        let (column, row) = layout.cell_at(PixelCoordinate::new(320, 240)).unwrap();
        let p = layout.pixel_at(column, row).unwrap();
        assert!((p.x as i64 - 320).abs() <= 10);
        assert!((p.y as i64 - 240).abs() <= 20);
    }

    #[test]
    fn test_tiny_area_is_empty() {
        let layout = FrameLayout::fit(area(0, 0), 640, 480);
        assert!(layout.is_empty());
        assert_eq!(layout.pixel_at(0, 0), None);
        assert_eq!(layout.cell_at(PixelCoordinate::new(0, 0)), None);
    }

    #[test]
    fn test_click_selects_pixel_and_labels_it() {
        let annotator = Annotator::new(0.08, Palette::Jet);
        let mut viewer = Viewer::new(&annotator, ViewMode::Click, PathBuf::from("."));
        viewer.show(&source(), &frame());
        viewer.layout = Some(FrameLayout::fit(area(80, 25), 640, 480));

        assert_eq!(viewer.handle_event(&source(), click(40, 12)), LoopAction::Continue);
        let selected = viewer.clicks.selected().unwrap();
        let current = viewer.current.as_ref().unwrap();
        assert_eq!(current.point, Some(selected));
        assert_eq!(current.label.as_ref().unwrap().text, "1.200 m");
    }

    #[test]
    fn test_click_outside_image_is_ignored() {
        let annotator = Annotator::new(0.08, Palette::Jet);
        let mut viewer = Viewer::new(&annotator, ViewMode::Click, PathBuf::from("."));
        viewer.show(&source(), &frame());
        viewer.layout = Some(FrameLayout::fit(area(80, 25), 640, 480));

        viewer.handle_event(&source(), click(2, 12));
        assert_eq!(viewer.clicks.selected(), None);
        assert!(viewer.current.as_ref().unwrap().label.is_none());
    }

    #[test]
    fn test_center_mode_ignores_clicks() {
        let annotator = Annotator::new(0.08, Palette::Jet);
        let mut viewer = Viewer::new(&annotator, ViewMode::Center, PathBuf::from("."));
        viewer.show(&source(), &frame());
        viewer.layout = Some(FrameLayout::fit(area(80, 25), 640, 480));

        viewer.handle_event(&source(), click(40, 12));
        assert_eq!(viewer.clicks.selected(), None);
        assert_eq!(
            viewer.current.as_ref().unwrap().label.as_ref().unwrap().text,
            "Center Distance: 1.200 m"
        );
    }

    #[test]
    fn test_exit_keys() {
        let annotator = Annotator::new(0.08, Palette::Jet);
        let mut viewer = Viewer::new(&annotator, ViewMode::Click, PathBuf::from("."));
        assert_eq!(viewer.handle_event(&source(), key(KeyCode::Esc)), LoopAction::Stop);
        assert_eq!(viewer.handle_event(&source(), key(KeyCode::Char('q'))), LoopAction::Stop);
        assert_eq!(
            viewer.handle_event(&source(), Event::Key(KeyEvent::new(
                KeyCode::Char('c'),
                KeyModifiers::CONTROL
            ))),
            LoopAction::Stop
        );
        assert_eq!(viewer.handle_event(&source(), key(KeyCode::Char('h'))), LoopAction::Continue);
        assert!(viewer.show_help);
    }

    #[test]
    fn test_clear_key_drops_selection() {
        let annotator = Annotator::new(0.08, Palette::Jet);
        let mut viewer = Viewer::new(&annotator, ViewMode::Click, PathBuf::from("."));
        viewer.show(&source(), &frame());
        viewer.clicks.select(PixelCoordinate::new(10, 10), 640, 480);
        viewer.refresh(&source());
        assert!(viewer.current.as_ref().unwrap().label.is_some());

        viewer.handle_event(&source(), key(KeyCode::Char('c')));
        assert_eq!(viewer.clicks.selected(), None);
        assert!(viewer.current.as_ref().unwrap().label.is_none());
    }

    #[test]
    fn test_frame_view_draws_label_text() {
        let annotator = Annotator::new(0.08, Palette::Jet);
        let annotated = annotator.annotate(&source(), &frame(), Target::Center);
        let rect = area(80, 25);
        let layout = FrameLayout::fit(rect, 640, 480);
        let mut buf = Buffer::empty(rect);

        FrameView {
            frame: Some(&annotated),
            layout: Some(layout),
            marker: false,
        }
        .render(rect, &mut buf);

        let (_, label_row) = layout.cell_at(PixelCoordinate::new(10, 30)).unwrap();
        let row: String = (0..rect.width)
            .map(|x| buf[(x, label_row)].symbol().to_string())
            .collect();
        assert!(row.contains("Center Distance: 1.200 m"), "{}", row);
    }

    #[test]
    fn test_restore_runs_every_step() {
        let mut ran = 0;
        let mut step = |fail: bool| {
            ran += 1;
            if fail {
                Err(io::Error::other(format!("step {}", ran)))
            } else {
                Ok(())
            }
        };
        let steps = [step(true), step(false), step(true)];
        let err = first_error(steps).unwrap_err();

        assert_eq!(ran, 3);
        assert_eq!(err.to_string(), "step 1");
    }

    #[test]
    fn test_viewer_error_wins_over_restore_error() {
        let result: AppResult<()> = Err(AppError::Capture(
            crate::backends::camera::BackendError::Crashed("unplugged".to_string()),
        ));
        let restored = first_error([Err(io::Error::other("tty gone"))]);

        let err = result.and(restored.map_err(AppError::from)).unwrap_err();
        assert!(matches!(err, AppError::Capture(_)));
    }
}
