//! The measurement session: live tracking, freeze, correction, validation.

use anyhow::{Context, Result};
use centering_core::{
    compute_measurement, CalibrationData, CapturedImage, CenteringError, CorrectionLines,
    CorrectionOffsets, Eye, FrameSide, FrameSpec, GeometryInput, ImageSize, LandmarkSet,
    Measurement, Pt2, Pupils, Real, SmoothingFilter, TemplePair,
};
use log::{debug, info, warn};

use super::state::{FrozenFrame, SessionState};
use super::types::{current_timestamp, LogEntry, SessionMetadata};
use crate::interaction::{InteractionController, Primitive, PrimitiveState, Shape};
use crate::{CalibrationStore, SessionConfig};

/// One subject, one frame, one validated [`Measurement`].
///
/// All input arrives through `&mut self` methods: detector frames via
/// [`on_landmarks`](Self::on_landmarks), operator actions via
/// [`capture`](Self::capture), the drag methods,
/// [`retake`](Self::retake), [`validate`](Self::validate) and
/// [`cancel`](Self::cancel). Every successful recomputation returns a new
/// measurement; a failed one keeps the previous measurement and edits.
#[derive(Debug)]
pub struct MeasurementSession {
    /// Session metadata (device, frame, timestamps, description).
    pub metadata: SessionMetadata,

    /// Operation log (lightweight audit trail).
    pub log: Vec<LogEntry>,

    config: SessionConfig,
    frame: FrameSpec,
    store: CalibrationStore,
    state: SessionState,

    smoothers: [SmoothingFilter; 2],
    latest: Option<LandmarkSet>,
    live_pupils: Option<Pupils>,
    live_temples: Option<TemplePair>,

    frozen: Option<FrozenFrame>,
    offsets: CorrectionOffsets,
    lines: CorrectionLines,
    interaction: InteractionController,

    measurement: Option<Measurement>,
}

fn smoother_index(eye: Eye) -> usize {
    match eye {
        Eye::Left => 0,
        Eye::Right => 1,
    }
}

impl MeasurementSession {
    // ─────────────────────────────────────────────────────────────────────────
    // Construction
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a session in [`SessionState::LiveTracking`].
    ///
    /// The store's persisted calibration is loaded; a backend read failure
    /// is logged and the session starts without a calibration.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(config: SessionConfig, frame: FrameSpec, mut store: CalibrationStore) -> Result<Self> {
        config.validate().context("invalid session config")?;
        store.set_max_age_secs(config.calibration_max_age_secs);
        if let Err(err) = store.load() {
            warn!("could not load stored calibration: {err:#}");
        }

        let interaction = InteractionController::from_config(&config);
        Ok(Self {
            metadata: SessionMetadata::new(store.device_id(), frame),
            log: Vec::new(),
            config,
            frame,
            store,
            state: SessionState::LiveTracking,
            smoothers: [SmoothingFilter::new(), SmoothingFilter::new()],
            latest: None,
            live_pupils: None,
            live_temples: None,
            frozen: None,
            offsets: CorrectionOffsets::default(),
            lines: CorrectionLines::default(),
            interaction,
            measurement: None,
        })
    }

    /// [`new`](Self::new) with an operator note in the metadata.
    pub fn with_description(
        config: SessionConfig,
        frame: FrameSpec,
        store: CalibrationStore,
        description: impl Into<String>,
    ) -> Result<Self> {
        let mut session = Self::new(config, frame, store)?;
        session.metadata.description = Some(description.into());
        Ok(session)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn frame_spec(&self) -> &FrameSpec {
        &self.frame
    }

    pub fn store(&self) -> &CalibrationStore {
        &self.store
    }

    pub fn offsets(&self) -> &CorrectionOffsets {
        &self.offsets
    }

    pub fn lines(&self) -> &CorrectionLines {
        &self.lines
    }

    pub fn frozen(&self) -> Option<&FrozenFrame> {
        self.frozen.as_ref()
    }

    /// Latest measurement: informational while live, the edited one while
    /// frozen, the final one once validated.
    pub fn current_measurement(&self) -> Option<&Measurement> {
        self.measurement.as_ref()
    }

    /// Pupils the current measurement is based on.
    pub fn pupils(&self) -> Option<Pupils> {
        match &self.frozen {
            Some(frozen) => Some(frozen.pupils),
            None => self.live_pupils,
        }
    }

    /// Calibration in effect: the frozen working copy, else the stored one.
    pub fn calibration(&self) -> Option<&CalibrationData> {
        self.frozen
            .as_ref()
            .map(|f| &f.calibration)
            .or_else(|| self.store.current())
    }

    /// Positions of every draggable primitive on the frozen frame.
    ///
    /// Empty outside [`SessionState::FrozenEditing`]. Frame edges are
    /// omitted when the frozen frame has no temples; lines are omitted
    /// until placed.
    pub fn primitives(&self) -> Vec<PrimitiveState> {
        let Some(frozen) = self.frozen.as_ref().filter(|_| self.state == SessionState::FrozenEditing)
        else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(Primitive::ALL.len());

        if let Some(temples) = &frozen.temples {
            for side in FrameSide::BOTH {
                out.push(PrimitiveState {
                    primitive: Primitive::FrameEdge(side),
                    shape: Shape::VerticalLine {
                        x: temples.edge(side, &self.offsets).x,
                    },
                });
            }
        }
        // Height lines start on the frame-bottom line; listing them first
        // lets them win the tie.
        let half = self.config.height_line_half_width_px;
        for eye in Eye::BOTH {
            let pupil = frozen.pupils.get(eye);
            if let Some(y) = self.lines.height_line(eye) {
                out.push(PrimitiveState {
                    primitive: Primitive::HeightLine(eye),
                    shape: Shape::HorizontalLine {
                        y,
                        span: Some((pupil.x - half, pupil.x + half)),
                    },
                });
            }
        }
        for (primitive, y) in [
            (Primitive::FrameTop, self.lines.frame_top_y),
            (Primitive::FrameBottom, self.lines.frame_bottom_y),
        ] {
            if let Some(y) = y {
                out.push(PrimitiveState {
                    primitive,
                    shape: Shape::HorizontalLine { y, span: None },
                });
            }
        }
        for eye in Eye::BOTH {
            let pupil = frozen.pupils.get(eye);
            out.push(PrimitiveState {
                primitive: Primitive::PupilHandle(eye),
                shape: Shape::Handle {
                    x: pupil.x,
                    y: pupil.y,
                },
            });
        }
        out
    }

    pub fn active_primitive(&self) -> Option<Primitive> {
        self.interaction.active().map(|drag| drag.primitive)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Live tracking
    // ─────────────────────────────────────────────────────────────────────────

    /// Feed one detector frame.
    ///
    /// Returns `Ok(None)` when the frame is ignored (any state other than
    /// live tracking) and the informational measurement otherwise.
    ///
    /// # Errors
    ///
    /// - [`CenteringError::InsufficientSignal`] if the pupils are not found,
    ///   or no calibration is held and none can be derived.
    /// - [`CenteringError::StaleCalibration`] or
    ///   [`CenteringError::FutureCalibration`] if the stored calibration is
    ///   out of date and auto-calibration is disabled.
    ///
    /// The frame is still tracked on a calibration error, so an explicit
    /// [`calibrate`](Self::calibrate) can follow; the previous measurement
    /// is kept.
    pub fn on_landmarks(
        &mut self,
        landmarks: LandmarkSet,
    ) -> Result<Option<Measurement>, CenteringError> {
        if self.state != SessionState::LiveTracking {
            debug!("ignoring frame while {}", self.state);
            return Ok(None);
        }

        let layout = &self.config.landmarks;
        let raw = layout.pupils(&landmarks, self.config.mirrored)?;
        let temples = match layout.temples(&landmarks) {
            Ok(temples) => Some(temples),
            Err(err) => {
                debug!("{err}");
                None
            }
        };

        let mut smoothed = raw;
        for eye in Eye::BOTH {
            let filter = &mut self.smoothers[smoother_index(eye)];
            *smoothed.get_mut(eye) = filter.next(*raw.get(eye));
        }
        let timestamp = landmarks.timestamp().unwrap_or_else(current_timestamp);
        self.live_pupils = Some(smoothed);
        self.live_temples = temples;
        self.latest = Some(landmarks);

        let calibration = self.resolve_calibration(temples.as_ref(), self.config.auto_calibrate)?;
        let measurement = compute_measurement(&GeometryInput {
            pupils: smoothed,
            temples,
            offsets: self.offsets,
            lines: self.lines,
            calibration: &calibration,
            frame: Some(self.frame),
            timestamp,
        })?;

        self.measurement = Some(measurement.clone());
        Ok(Some(measurement))
    }

    /// Stored calibration if valid, else one derived from `temples` when
    /// `derive` is set.
    fn resolve_calibration(
        &self,
        temples: Option<&TemplePair>,
        derive: bool,
    ) -> Result<CalibrationData, CenteringError> {
        let stored_err = match self.store.valid_current() {
            Ok(data) => return Ok(data.clone()),
            Err(err) => err,
        };
        match temples {
            Some(temples) if derive => {
                if stored_err.is_calibration_error() {
                    warn!("{stored_err}; deriving scale from the current frame");
                }
                self.store
                    .compute(temples.width_px(&self.offsets), &self.frame)
            }
            _ => Err(stored_err),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Freeze and edit
    // ─────────────────────────────────────────────────────────────────────────

    fn require(&self, expected: SessionState, operation: &'static str) -> Result<(), CenteringError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(CenteringError::InvalidState {
                operation,
                state: self.state.name(),
            })
        }
    }

    fn pointer(x: Real, y: Real) -> Result<Pt2, CenteringError> {
        if x.is_finite() && y.is_finite() {
            Ok(Pt2::new(x, y))
        } else {
            Err(CenteringError::InvalidPointer { x, y })
        }
    }

    /// Freeze the latest frame for editing.
    ///
    /// Snapshots the smoothed pupils, the landmark set and `image`, places
    /// the default correction lines and computes the first editable
    /// measurement. Without a valid stored calibration one is derived from
    /// the frozen frame.
    ///
    /// # Errors
    ///
    /// - [`CenteringError::InvalidState`] outside live tracking.
    /// - [`CenteringError::InsufficientSignal`] if no frame has been
    ///   tracked yet, or no calibration can be obtained.
    ///
    /// On error the session stays in live tracking.
    pub fn capture(&mut self, image: Option<CapturedImage>) -> Result<Measurement, CenteringError> {
        self.require(SessionState::LiveTracking, "capture")?;
        let (Some(landmarks), Some(pupils)) = (self.latest.clone(), self.live_pupils) else {
            return Err(CenteringError::insufficient("no frame tracked yet"));
        };
        let temples = self.live_temples;

        let offsets = CorrectionOffsets::default();
        let calibration = match self.store.valid_current() {
            Ok(data) => data.clone(),
            Err(stored_err) => {
                let Some(t) = temples.as_ref() else {
                    self.log.push(LogEntry::failure("capture", stored_err.to_string()));
                    return Err(stored_err);
                };
                match self.store.compute(t.width_px(&offsets), &self.frame) {
                    Ok(data) => data,
                    Err(err) => {
                        self.log.push(LogEntry::failure("capture", err.to_string()));
                        return Err(err);
                    }
                }
            }
        };

        let lines = self.default_lines(landmarks.image_size(), &pupils);
        let captured_at = landmarks.timestamp().unwrap_or_else(current_timestamp);
        let measurement = compute_measurement(&GeometryInput {
            pupils,
            temples,
            offsets,
            lines,
            calibration: &calibration,
            frame: Some(self.frame),
            timestamp: captured_at,
        })?;

        self.frozen = Some(FrozenFrame {
            landmarks,
            pupils,
            temples,
            calibration,
            image,
            captured_at,
        });
        self.offsets = offsets;
        self.lines = lines;
        self.measurement = Some(measurement.clone());
        self.state = SessionState::FrozenEditing;
        self.metadata.touch();
        self.log.push(LogEntry::success("capture"));
        info!("frame captured, PD {:.1} mm", measurement.pd_mm);
        Ok(measurement)
    }

    /// Initial frame and height lines for a freshly captured frame.
    ///
    /// With a known image size the frame lines sit at fixed fractions of
    /// the image height. Otherwise they are placed around the pupils: the
    /// bottom line `default_height_line_offset_px` below them, the top line
    /// half that distance above. Height lines start on the bottom line.
    fn default_lines(&self, image_size: Option<ImageSize>, pupils: &Pupils) -> CorrectionLines {
        let (top, bottom) = match image_size {
            Some(size) => {
                let h = Real::from(size.height);
                (
                    h * self.config.default_frame_top_fraction,
                    h * self.config.default_frame_bottom_fraction,
                )
            }
            None => {
                let eye_y = pupils.midpoint().y;
                let offset = self.config.default_height_line_offset_px;
                (eye_y - offset / 2.0, eye_y + offset)
            }
        };
        CorrectionLines {
            frame_top_y: Some(top),
            frame_bottom_y: Some(bottom),
            height_left_y: Some(bottom),
            height_right_y: Some(bottom),
        }
    }

    /// Grab the primitive under the pointer.
    ///
    /// Returns `Ok(None)` when nothing is within reach.
    ///
    /// # Errors
    ///
    /// - [`CenteringError::InvalidState`] outside frozen editing.
    /// - [`CenteringError::InvalidPointer`] for non-finite coordinates.
    pub fn press(&mut self, x: Real, y: Real) -> Result<Option<Primitive>, CenteringError> {
        self.require(SessionState::FrozenEditing, "press")?;
        let at = Self::pointer(x, y)?;
        let primitives = self.primitives();
        let grabbed = self.interaction.press(&primitives, at);
        if let Some(primitive) = grabbed {
            debug!("grabbed {primitive:?}");
        }
        Ok(grabbed)
    }

    /// Move the grabbed primitive and recompute.
    ///
    /// Frame-edge drags update the offsets and rederive the calibration;
    /// other drags leave the calibration alone. Returns `Ok(None)` when no
    /// primitive is grabbed.
    ///
    /// # Errors
    ///
    /// - [`CenteringError::InvalidState`] outside frozen editing.
    /// - [`CenteringError::InvalidPointer`] for non-finite coordinates.
    /// - Calibration errors from a frame-edge drag that collapses the
    ///   reference width.
    ///
    /// A rejected drag changes nothing.
    pub fn drag_to(&mut self, x: Real, y: Real) -> Result<Option<Measurement>, CenteringError> {
        self.require(SessionState::FrozenEditing, "drag")?;
        let at = Self::pointer(x, y)?;
        let Some((primitive, target)) = self.interaction.drag_target(at) else {
            return Ok(None);
        };
        let Some(frozen) = self.frozen.as_ref() else {
            return Err(CenteringError::insufficient("no frozen frame"));
        };

        let mut offsets = self.offsets;
        let mut lines = self.lines;
        let mut pupils = frozen.pupils;
        let mut calibration = None;

        match primitive {
            Primitive::FrameEdge(side) => {
                let Some(temples) = frozen.temples.as_ref() else {
                    return Err(CenteringError::insufficient("frame edges are not available"));
                };
                let temple_x = match side {
                    FrameSide::Left => temples.left.x,
                    FrameSide::Right => temples.right.x,
                };
                offsets.set(side, target.x - temple_x);
                calibration = Some(
                    self.store
                        .compute(temples.width_px(&offsets), &self.frame)?,
                );
            }
            Primitive::FrameTop => lines.frame_top_y = Some(target.y),
            Primitive::FrameBottom => lines.frame_bottom_y = Some(target.y),
            Primitive::HeightLine(eye) => lines.set_height_line(eye, target.y),
            Primitive::PupilHandle(eye) => {
                let pupil = pupils.get_mut(eye);
                pupil.x = target.x;
                pupil.y = target.y;
            }
        }

        let measurement = compute_measurement(&GeometryInput {
            pupils,
            temples: frozen.temples,
            offsets,
            lines,
            calibration: calibration.as_ref().unwrap_or(&frozen.calibration),
            frame: Some(self.frame),
            timestamp: frozen.captured_at,
        })?;

        if let Some(frozen) = self.frozen.as_mut() {
            frozen.pupils = pupils;
            if let Some(data) = calibration {
                frozen.calibration = data;
            }
        }
        self.offsets = offsets;
        self.lines = lines;
        self.measurement = Some(measurement.clone());
        Ok(Some(measurement))
    }

    /// Let go of the grabbed primitive.
    ///
    /// # Errors
    ///
    /// [`CenteringError::InvalidState`] outside frozen editing.
    pub fn release(&mut self) -> Result<Option<Primitive>, CenteringError> {
        self.require(SessionState::FrozenEditing, "release")?;
        Ok(self.interaction.release())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────────

    /// Discard the frozen frame and every edit, and resume live tracking.
    ///
    /// # Errors
    ///
    /// [`CenteringError::InvalidState`] outside frozen editing.
    pub fn retake(&mut self) -> Result<(), CenteringError> {
        self.require(SessionState::FrozenEditing, "retake")?;
        self.discard_edits();
        for filter in &mut self.smoothers {
            filter.reset();
        }
        self.latest = None;
        self.live_pupils = None;
        self.live_temples = None;
        self.state = SessionState::LiveTracking;
        self.metadata.touch();
        self.log.push(LogEntry::success("retake"));
        info!("retake: back to live tracking");
        Ok(())
    }

    fn discard_edits(&mut self) {
        self.interaction.release();
        self.frozen = None;
        self.offsets.reset();
        self.lines = CorrectionLines::default();
        self.measurement = None;
    }

    /// Finalize the current measurement.
    ///
    /// A manually adjusted calibration is saved to the store; a storage
    /// failure is logged and does not prevent validation. The returned
    /// measurement carries the captured image.
    ///
    /// # Errors
    ///
    /// - [`CenteringError::InvalidState`] outside frozen editing.
    /// - [`CenteringError::InsufficientSignal`] without a measurement.
    pub fn validate(&mut self) -> Result<Measurement, CenteringError> {
        self.require(SessionState::FrozenEditing, "validate")?;
        let (Some(frozen), Some(measurement)) = (self.frozen.as_ref(), self.measurement.as_ref())
        else {
            return Err(CenteringError::insufficient("no measurement to validate"));
        };
        let final_measurement = measurement.clone().with_captured_image(frozen.image.clone());

        if self.offsets.manually_adjusted {
            let calibration = frozen.calibration.clone();
            match self.store.save(calibration) {
                Ok(()) => self.log.push(LogEntry::success("save_calibration")),
                Err(err) => {
                    warn!("validated without saving calibration: {err:#}");
                    self.log
                        .push(LogEntry::failure("save_calibration", format!("{err:#}")));
                }
            }
        }

        self.interaction.release();
        self.measurement = Some(final_measurement.clone());
        self.state = SessionState::Validated;
        self.metadata.touch();
        self.log.push(LogEntry::success("validate"));
        info!("measurement validated:\n{final_measurement}");
        Ok(final_measurement)
    }

    /// Abandon the session without producing a measurement.
    ///
    /// # Errors
    ///
    /// [`CenteringError::InvalidState`] if already validated or cancelled.
    pub fn cancel(&mut self) -> Result<(), CenteringError> {
        if self.state.is_terminal() {
            return Err(CenteringError::InvalidState {
                operation: "cancel",
                state: self.state.name(),
            });
        }
        self.discard_edits();
        self.state = SessionState::Cancelled;
        self.metadata.touch();
        self.log.push(LogEntry::success("cancel"));
        info!("session cancelled");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calibration
    // ─────────────────────────────────────────────────────────────────────────

    /// Calibrate from the current frame and save the result.
    ///
    /// Live, the latest tracked temples are used as-is; frozen, the
    /// corrected frame edges are used and the working copy is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error in a terminal state, when the temples are not
    /// available, when the calibration cannot be derived, or when it
    /// cannot be saved.
    pub fn calibrate(&mut self) -> Result<CalibrationData> {
        if self.state.is_terminal() {
            return Err(CenteringError::InvalidState {
                operation: "calibrate",
                state: self.state.name(),
            }
            .into());
        }
        let temples = match &self.frozen {
            Some(frozen) => frozen.temples,
            None => self.live_temples,
        }
        .ok_or_else(|| CenteringError::insufficient("temple landmarks not detected"))?;
        let offsets = match &self.frozen {
            Some(_) => self.offsets,
            None => CorrectionOffsets::default(),
        };

        let data = self.store.compute(temples.width_px(&offsets), &self.frame)?;
        if let Err(err) = self.store.save(data.clone()) {
            self.log
                .push(LogEntry::failure("calibrate", format!("{err:#}")));
            return Err(err);
        }

        if let Some(frozen) = self.frozen.as_mut() {
            frozen.calibration = data.clone();
            let input = GeometryInput {
                pupils: frozen.pupils,
                temples: frozen.temples,
                offsets: self.offsets,
                lines: self.lines,
                calibration: &frozen.calibration,
                frame: Some(self.frame),
                timestamp: frozen.captured_at,
            };
            self.measurement = Some(compute_measurement(&input)?);
        }
        self.metadata.touch();
        self.log.push(LogEntry::success_with_notes(
            "calibrate",
            format!("{:.4} px/mm", data.pixels_per_mm),
        ));
        Ok(data)
    }

    /// Delete the stored calibration for this device.
    ///
    /// A frozen frame keeps its working copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub fn reset_calibration(&mut self) -> Result<()> {
        self.store.reset()?;
        self.metadata.touch();
        self.log.push(LogEntry::success("reset_calibration"));
        Ok(())
    }
}
