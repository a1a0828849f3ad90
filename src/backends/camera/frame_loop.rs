// SPDX-License-Identifier: GPL-3.0-only

//! Capture stream lifecycle and the per-cycle frame loop
//!
//! A [`CaptureSession`] owns a started [`DepthSource`] and stops it exactly
//! once: either through [`CaptureSession::close`] or, on any other exit path
//! (error return, early `?`, panic unwind), from its `Drop`.

use super::{BackendError, BackendResult, DepthFrame, DepthSource};
use tracing::{debug, info, warn};

/// Action returned by the frame handler to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Capture loop states
///
/// ```text
/// STREAMING -> FRAME_READY | FRAME_MISSING -> DISPLAY -> STREAMING
///                                   \-> STOPPED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Waiting for the next frame
    Streaming,
    /// A frame arrived this cycle
    FrameReady,
    /// The cycle produced no frame
    FrameMissing,
    /// The handler is annotating and presenting the cycle
    Display,
    /// The stream has been released
    Stopped,
}

/// What the source produced this cycle
#[derive(Debug)]
pub enum FrameEvent<'a> {
    Ready(&'a DepthFrame),
    Missing,
}

/// Counters reported when the loop ends normally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Cycles that delivered a frame
    pub frames: u64,
    /// Cycles that delivered nothing
    pub missed: u64,
}

/// A started depth stream with guaranteed release
pub struct CaptureSession<S: DepthSource> {
    source: S,
    state: CaptureState,
    released: bool,
}

impl<S: DepthSource> CaptureSession<S> {
    /// Start `source` and wrap it
    ///
    /// If `start` fails nothing was acquired, so `stop` is not called.
    pub fn open(mut source: S) -> BackendResult<Self> {
        source.start()?;
        info!(source = source.name(), "Depth stream started");
        Ok(Self {
            source,
            state: CaptureState::Streaming,
            released: false,
        })
    }

    /// Wait for the next frame and record the resulting state
    pub fn next_frame(&mut self) -> BackendResult<Option<DepthFrame>> {
        if self.released {
            return Err(BackendError::Other("Depth stream already stopped".to_string()));
        }
        self.state = CaptureState::Streaming;
        let frame = self.source.next_frame()?;
        self.state = if frame.is_some() {
            CaptureState::FrameReady
        } else {
            CaptureState::FrameMissing
        };
        Ok(frame)
    }

    /// Current loop state
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// The wrapped source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Stop the stream now and report any error from the device
    pub fn close(mut self) -> BackendResult<()> {
        self.release()
    }

    fn release(&mut self) -> BackendResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.state = CaptureState::Stopped;
        let result = self.source.stop();
        info!(source = self.source.name(), "Depth stream stopped");
        result
    }
}

impl<S: DepthSource> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        if !self.released {
            debug!(source = self.source.name(), "CaptureSession dropped, stopping stream");
            if let Err(e) = self.release() {
                warn!(error = %e, "Failed to stop depth stream");
            }
        }
    }
}

/// Drive `session` until the handler asks to stop or an error occurs
///
/// The handler gets the source alongside each event so lookups such as
/// [`DepthSource::distance_at`] go through the device. The session is consumed: it is closed on [`LoopAction::Stop`] and
/// dropped (which stops it) when the source or the handler fails.
pub fn run_capture_loop<S, E, F>(
    mut session: CaptureSession<S>,
    mut handler: F,
) -> Result<LoopSummary, E>
where
    S: DepthSource,
    E: From<BackendError>,
    F: FnMut(&S, FrameEvent<'_>) -> Result<LoopAction, E>,
{
    let mut summary = LoopSummary::default();

    loop {
        let frame = session.next_frame()?;
        let event = match &frame {
            Some(frame) => {
                summary.frames += 1;
                FrameEvent::Ready(frame)
            }
            None => {
                summary.missed += 1;
                debug!(missed = summary.missed, "No depth frame this cycle");
                FrameEvent::Missing
            }
        };

        session.state = CaptureState::Display;
        let action = handler(session.source(), event)?;

        if action == LoopAction::Stop {
            break;
        }
    }

    info!(
        frames = summary.frames,
        missed = summary.missed,
        "Capture loop finished"
    );
    session.close()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::PixelCoordinate;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Source that plays back a fixed script of cycles
    struct Scripted {
        script: Vec<Option<u16>>,
        cursor: usize,
        stops: Rc<Cell<u32>>,
    }

    impl DepthSource for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn start(&mut self) -> BackendResult<()> {
            Ok(())
        }

        fn next_frame(&mut self) -> BackendResult<Option<DepthFrame>> {
            let step = self.script.get(self.cursor).copied();
            self.cursor += 1;
            match step {
                Some(Some(v)) => Ok(Some(DepthFrame::new(2, 2, vec![v; 4], self.cursor as u32)?)),
                Some(None) => Ok(None),
                None => Err(BackendError::Crashed("end of script".to_string())),
            }
        }

        fn depth_scale(&self) -> f32 {
            0.001
        }

        fn stop(&mut self) -> BackendResult<()> {
            self.stops.set(self.stops.get() + 1);
            Ok(())
        }
    }

    fn scripted(script: Vec<Option<u16>>) -> (Scripted, Rc<Cell<u32>>) {
        let stops = Rc::new(Cell::new(0));
        (
            Scripted {
                script,
                cursor: 0,
                stops: Rc::clone(&stops),
            },
            stops,
        )
    }

    #[test]
    fn test_states_follow_cycles() {
        let (source, _) = scripted(vec![Some(5), None]);
        let mut session = CaptureSession::open(source).unwrap();
        assert_eq!(session.state(), CaptureState::Streaming);

        session.next_frame().unwrap();
        assert_eq!(session.state(), CaptureState::FrameReady);

        session.next_frame().unwrap();
        assert_eq!(session.state(), CaptureState::FrameMissing);
    }

    #[test]
    fn test_loop_counts_and_stops_once() {
        let (source, stops) = scripted(vec![Some(1), None, Some(2), Some(3)]);
        let session = CaptureSession::open(source).unwrap();

        let mut seen = 0;
        let summary = run_capture_loop::<_, BackendError, _>(session, |_, event| {
            if let FrameEvent::Ready(_) = event {
                seen += 1;
            }
            Ok(if seen == 3 {
                LoopAction::Stop
            } else {
                LoopAction::Continue
            })
        })
        .unwrap();

        assert_eq!(summary, LoopSummary { frames: 3, missed: 1 });
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn test_drop_releases_stream() {
        let (source, stops) = scripted(vec![]);
        let session = CaptureSession::open(source).unwrap();
        drop(session);
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn test_distance_through_session_source() {
        let (source, _) = scripted(vec![Some(2000)]);
        let mut session = CaptureSession::open(source).unwrap();
        let frame = session.next_frame().unwrap().unwrap();
        let distance = session
            .source()
            .distance_at(&frame, PixelCoordinate::new(1, 1))
            .unwrap();
        assert_eq!(distance.to_string(), "2.000 m");
    }
}
