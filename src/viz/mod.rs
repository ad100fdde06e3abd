//! Terminal front-end for the field generator
//!
//! Provides a TUI interface showing:
//! - Per-coil trace of the most recent chunk
//! - Current signal parameters
//! - Session and routine state

mod waveform;

pub use waveform::ChannelTrace;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};

use crate::choreo::{ChoreographySequencer, Routine};
use crate::engine::StreamSession;
use crate::error::StreamError;
use crate::input::{map_key, Action};
use crate::params::{OutputMode, ParameterStore, SignalParameters};
use crate::synth::{Axis, WaveformChunk};

/// Holds the most recently synthesized chunk for display.
///
/// The refill loop publishes with `try_lock`; a frame that loses the race is
/// simply dropped, the display catches up on the next one.
pub struct ChunkBuffer {
    latest: Option<WaveformChunk>,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self { latest: None }
    }

    pub fn publish(&mut self, chunk: WaveformChunk) {
        self.latest = Some(chunk);
    }

    pub fn latest(&self) -> Option<&WaveformChunk> {
        self.latest.as_ref()
    }
}

impl Default for ChunkBuffer {
    fn default() -> Self {
        Self::new()
    }
}

struct PanelState {
    session: Option<StreamSession>,
    selected: Routine,
    last_fault: Option<String>,
}

/// Run the control panel until the user quits or the shutdown flag is set.
///
/// `open_session` is called each time streaming is toggled on; the session it
/// returns is owned by the panel and stopped on toggle-off or exit.
pub fn run_panel<F>(
    store: ParameterStore,
    sequencer: &mut ChoreographySequencer,
    chunk_buffer: Arc<Mutex<ChunkBuffer>>,
    shutdown: Arc<AtomicBool>,
    mut open_session: F,
) -> Result<()>
where
    F: FnMut() -> Result<StreamSession, StreamError>,
{
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut state = PanelState {
        session: None,
        selected: Routine::Explode,
        last_fault: None,
    };

    // Main loop
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        // A session that died on its own carries the fault out through stop().
        if state.session.as_ref().is_some_and(|s| !s.is_running()) {
            if let Some(session) = state.session.take() {
                if let Err(e) = session.stop() {
                    state.last_fault = Some(e.to_string());
                }
            }
        }

        terminal.draw(|f| {
            let params = store.get();
            let active = sequencer.active();
            draw_ui(f, &state, &params, active, &chunk_buffer);
        })?;

        // Handle input
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                match (key.code, key.modifiers) {
                    (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => break,
                    (KeyCode::Char('c'), KeyModifiers::CONTROL) => break,
                    (KeyCode::Char(c @ '1'..='4'), _) => {
                        state.selected = Routine::ALL[c as usize - '1' as usize];
                    }
                    (code, _) => {
                        if let Some(action) = map_key(code) {
                            dispatch(action, &store, sequencer, &mut state, &mut open_session);
                        }
                    }
                }
            }
        }
    }

    // Cleanup
    sequencer.stop();
    if let Some(session) = state.session.take() {
        if let Err(e) = session.stop() {
            eprintln!("stream error: {e}");
        }
    }
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    Ok(())
}

fn dispatch<F>(
    action: Action,
    store: &ParameterStore,
    sequencer: &mut ChoreographySequencer,
    state: &mut PanelState,
    open_session: &mut F,
) where
    F: FnMut() -> Result<StreamSession, StreamError>,
{
    match action {
        Action::Edit(edit) => {
            store.update(|p| *p = edit.apply(*p));
        }
        Action::ToggleOutput => {
            if let Some(session) = state.session.take() {
                sequencer.stop();
                if let Err(e) = session.stop() {
                    state.last_fault = Some(e.to_string());
                }
            } else {
                match open_session() {
                    Ok(session) => {
                        state.session = Some(session);
                        state.last_fault = None;
                    }
                    Err(e) => state.last_fault = Some(e.to_string()),
                }
            }
        }
        Action::ToggleRoutine => sequencer.toggle(state.selected),
    }
}

fn draw_ui(
    f: &mut Frame,
    state: &PanelState,
    params: &SignalParameters,
    active: Option<Routine>,
    chunk_buffer: &Arc<Mutex<ChunkBuffer>>,
) {
    let area = f.area();

    // Layout: traces on top, parameters and status at the bottom
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(9),    // Traces
            Constraint::Length(4), // Parameters
            Constraint::Length(3), // Status
        ])
        .split(area);

    draw_traces(f, chunks[0], params, chunk_buffer);
    draw_parameters(f, chunks[1], params);
    draw_status(f, chunks[2], state, active);
}

fn draw_traces(
    f: &mut Frame,
    area: Rect,
    params: &SignalParameters,
    chunk_buffer: &Arc<Mutex<ChunkBuffer>>,
) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(area);

    let colors = [Color::Cyan, Color::Green, Color::Magenta];
    let scale = params.multiplier.max(1.0);

    let buffer = chunk_buffer.lock().unwrap();
    for (axis, (&row, &color)) in Axis::ALL.iter().zip(rows.iter().zip(colors.iter())) {
        let samples: &[f64] = buffer
            .latest()
            .map(|chunk| chunk.channel(*axis))
            .unwrap_or(&[]);

        let trace = ChannelTrace::new(samples, scale)
            .style(Style::default().fg(color))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" {} ", axis.label())),
            );
        f.render_widget(trace, row);
    }
}

fn draw_parameters(f: &mut Frame, area: Rect, params: &SignalParameters) {
    let mode = match params.mode {
        OutputMode::Normal => "field",
        OutputMode::Calibration => "calibration",
    };

    let lines = vec![
        Line::from(vec![
            Span::raw(format!("  multiplier: {:>6.2}", params.multiplier)),
            Span::raw(format!("   frequency: {:>6.1} Hz", params.frequency)),
            Span::raw(format!("   mode: {mode}")),
        ]),
        Line::from(vec![
            Span::raw(format!("  camber:     {:>6.1}°", params.camber)),
            Span::raw(format!("   heading:   {:>6.1}°", params.zphase)),
            Span::raw(format!("   zcoeff: {:.3}", params.zcoeff)),
        ]),
    ];

    let paragraph = Paragraph::new(lines).block(Block::default().borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

fn draw_status(f: &mut Frame, area: Rect, state: &PanelState, active: Option<Routine>) {
    let (status, status_color) = if state.session.is_some() {
        ("STREAMING", Color::Green)
    } else {
        ("STOPPED", Color::Yellow)
    };

    let routine = match active {
        Some(r) => format!("{} (running)", r.label()),
        None => state.selected.label().to_string(),
    };

    let mut spans = vec![
        Span::raw("  Output: "),
        Span::styled(status, Style::default().fg(status_color)),
        Span::raw("  |  Routine: "),
        Span::raw(routine),
        Span::raw("  |  t: output  u: routine  1-4: select  q: quit"),
    ];
    if let Some(fault) = &state.last_fault {
        spans.push(Span::styled(
            format!("  |  FAULT: {fault}"),
            Style::default().fg(Color::Red),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_buffer_starts_empty() {
        let buffer = ChunkBuffer::new();
        assert!(buffer.latest().is_none());
    }

    #[test]
    fn test_chunk_buffer_keeps_latest() {
        let mut buffer = ChunkBuffer::new();
        buffer.publish(WaveformChunk::from_fn(4, |_| [1.0, 0.0, 0.0]));
        buffer.publish(WaveformChunk::from_fn(4, |_| [2.0, 0.0, 0.0]));

        let latest = buffer.latest().unwrap();
        assert_eq!(latest.channel(Axis::X)[0], 2.0);
    }

    #[test]
    fn test_routine_selection_keys_cover_all() {
        // Keys 1-4 index straight into the routine table.
        assert_eq!(Routine::ALL.len(), 4);
    }
}
