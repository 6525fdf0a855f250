use centering_core::test_utils::{empty_face, SyntheticFace};
use centering_core::{
    effective_diameter_mm, CalibrationData, CapturedImage, CenteringError, Eye, FrameSide,
    FrameSpec,
};
use centering_pipeline::{
    CalibrationStore, JsonFileStorage, MeasurementSession, Primitive, SessionConfig, SessionState,
};
use tempfile::TempDir;

const EPS: f64 = 1e-9;

fn new_session(store: CalibrationStore) -> MeasurementSession {
    MeasurementSession::new(SessionConfig::default(), FrameSpec::default(), store).unwrap()
}

/// Live-track the default face for a few frames and freeze it.
fn frozen_session() -> MeasurementSession {
    let mut session = new_session(CalibrationStore::in_memory("cam"));
    for _ in 0..3 {
        session
            .on_landmarks(SyntheticFace::default().landmarks())
            .unwrap();
    }
    session.capture(None).unwrap();
    session
}

#[test]
fn full_workflow_produces_validated_measurement() {
    let mut session = frozen_session();
    assert_eq!(session.state(), SessionState::FrozenEditing);

    let m = session.current_measurement().unwrap().clone();
    assert!((m.pixels_per_mm - 2.0).abs() < EPS);
    assert!((m.pd_mm - 66.0).abs() < EPS);
    assert!((m.pd_left_mm - 33.0).abs() < EPS);
    assert!((m.pd_right_mm - 33.0).abs() < EPS);
    // Frame lines at 35% / 72% of 480 px, height lines on the bottom line.
    assert!((m.frame_height_mm.unwrap() - 88.8).abs() < 1e-6);
    assert!((m.height_left_mm.unwrap() - 72.8).abs() < 1e-6);
    let expected_ed = effective_diameter_mm(session.frame_spec(), 88.8, 33.0);
    assert!((m.ed_mm.unwrap() - expected_ed).abs() < 1e-6);

    // Subject's right eye is on the image left (x = 254) in a plain camera image.
    let grabbed = session.press(254.0, 345.6).unwrap();
    assert_eq!(grabbed, Some(Primitive::HeightLine(Eye::Right)));
    assert_eq!(session.active_primitive(), grabbed);
    let m = session.drag_to(254.0, 260.0).unwrap().unwrap();
    assert!((m.height_right_mm.unwrap() - 30.0).abs() < EPS);
    assert!((m.height_left_mm.unwrap() - 72.8).abs() < 1e-6);
    session.release().unwrap();
    assert_eq!(session.active_primitive(), None);

    let final_m = session.validate().unwrap();
    assert_eq!(session.state(), SessionState::Validated);
    assert!((final_m.height_right_mm.unwrap() - 30.0).abs() < EPS);
    assert_eq!(session.current_measurement(), Some(&final_m));

    let ops: Vec<&str> = session.log.iter().map(|e| e.operation.as_str()).collect();
    assert_eq!(ops, ["capture", "validate"]);
}

#[test]
fn wrong_state_operations_are_rejected() {
    let mut session = new_session(CalibrationStore::in_memory("cam"));

    assert_eq!(
        session.validate().unwrap_err(),
        CenteringError::InvalidState {
            operation: "validate",
            state: "live_tracking"
        }
    );
    assert!(matches!(
        session.press(10.0, 10.0),
        Err(CenteringError::InvalidState { .. })
    ));
    assert!(matches!(
        session.retake(),
        Err(CenteringError::InvalidState { .. })
    ));
    // Capture with nothing tracked is a signal problem, not a state problem.
    assert!(matches!(
        session.capture(None),
        Err(CenteringError::InsufficientSignal(_))
    ));
    assert_eq!(session.state(), SessionState::LiveTracking);

    session
        .on_landmarks(SyntheticFace::default().landmarks())
        .unwrap();
    session.capture(None).unwrap();
    assert!(matches!(
        session.capture(None),
        Err(CenteringError::InvalidState {
            operation: "capture",
            ..
        })
    ));
    assert_eq!(session.state(), SessionState::FrozenEditing);

    session.validate().unwrap();
    assert!(matches!(
        session.validate(),
        Err(CenteringError::InvalidState { .. })
    ));
    assert!(matches!(
        session.drag_to(0.0, 0.0),
        Err(CenteringError::InvalidState { .. })
    ));
    assert!(matches!(
        session.cancel(),
        Err(CenteringError::InvalidState { .. })
    ));
    assert_eq!(session.state(), SessionState::Validated);
}

#[test]
fn frames_are_ignored_once_frozen() {
    let mut session = frozen_session();
    let before = session.current_measurement().cloned();
    let shifted = SyntheticFace::default().shifted(40.0, 0.0).landmarks();
    assert_eq!(session.on_landmarks(shifted).unwrap(), None);
    assert_eq!(session.current_measurement().cloned(), before);
}

#[test]
fn non_edge_drags_leave_calibration_alone() {
    let mut session = frozen_session();
    let before = session.current_measurement().unwrap().clone();

    // Left pupil handle sits on the image right at (386, 200).
    assert_eq!(
        session.press(386.0, 200.0).unwrap(),
        Some(Primitive::PupilHandle(Eye::Left))
    );
    let m = session.drag_to(390.0, 200.0).unwrap().unwrap();
    assert_eq!(m.pixels_per_mm, before.pixels_per_mm);
    assert!((m.pd_mm - 68.0).abs() < EPS);
    assert!((m.pd_left_mm - 35.0).abs() < EPS);
    assert_eq!(m.pd_right_mm, before.pd_right_mm);
    assert_eq!(m.height_right_mm, before.height_right_mm);
    assert_eq!(m.frame_height_mm, before.frame_height_mm);
    assert!(!session.offsets().manually_adjusted);
    session.release().unwrap();

    // Frame top line, away from both pupils.
    assert_eq!(
        session.press(320.0, 170.0).unwrap(),
        Some(Primitive::FrameTop)
    );
    let m = session.drag_to(320.0, 182.0).unwrap().unwrap();
    assert_eq!(m.pixels_per_mm, before.pixels_per_mm);
    assert!((m.frame_height_mm.unwrap() - (before.frame_height_mm.unwrap() - 6.0)).abs() < 1e-6);
    assert_eq!(m.height_left_mm, before.height_left_mm);
}

#[test]
fn frame_edge_drag_recalibrates() {
    let mut session = frozen_session();

    assert_eq!(
        session.press(190.0, 100.0).unwrap(),
        Some(Primitive::FrameEdge(FrameSide::Left))
    );
    // Grabbed 3 px right of the pointer: the edge lands at 183.
    let m = session.drag_to(180.0, 100.0).unwrap().unwrap();
    assert!((session.offsets().get(FrameSide::Left) + 10.0).abs() < EPS);
    assert!(session.offsets().manually_adjusted);
    assert!((m.pixels_per_mm - 264.0 / 127.0).abs() < EPS);
    assert!((m.pd_mm - 63.5).abs() < EPS);
    assert!((m.frame_center_x - 315.0).abs() < EPS);
    // Pupils themselves did not move.
    assert_eq!(m.pupils, session.frozen().unwrap().pupils);
    assert!((m.pupils.right.x - 254.0).abs() < EPS);
}

#[test]
fn collapsing_the_frame_is_rejected_without_side_effects() {
    let mut session = frozen_session();
    let before = session.current_measurement().unwrap().clone();

    session.press(193.0, 100.0).unwrap();
    let err = session.drag_to(447.0, 100.0).unwrap_err();
    assert!(matches!(err, CenteringError::InsufficientSignal(_)));
    assert!(!session.offsets().manually_adjusted);
    assert_eq!(session.current_measurement(), Some(&before));
    assert_eq!(session.state(), SessionState::FrozenEditing);
}

#[test]
fn retake_discards_edits() {
    let mut session = frozen_session();
    session.press(190.0, 100.0).unwrap();
    session.drag_to(170.0, 100.0).unwrap();
    session.release().unwrap();
    session.press(254.0, 345.6).unwrap();
    session.drag_to(254.0, 300.0).unwrap();

    session.retake().unwrap();
    assert_eq!(session.state(), SessionState::LiveTracking);
    assert!(!session.offsets().manually_adjusted);
    assert!(session.lines().is_empty());
    assert!(session.current_measurement().is_none());
    assert!(session.primitives().is_empty());
    assert_eq!(session.active_primitive(), None);
    // The edited calibration never reached the store.
    assert!(session.store().current().is_none());

    // A fresh capture needs a fresh frame.
    assert!(matches!(
        session.capture(None),
        Err(CenteringError::InsufficientSignal(_))
    ));
    let live = session
        .on_landmarks(SyntheticFace::default().shifted(10.0, 0.0).landmarks())
        .unwrap()
        .unwrap();
    // Smoothing restarted: the first frame after a retake passes through.
    assert!((live.pupils.right.x - 264.0).abs() < EPS);

    let m = session.capture(None).unwrap();
    assert!((m.pixels_per_mm - 2.0).abs() < EPS);
    assert!((m.height_right_mm.unwrap() - 72.8).abs() < 1e-6);
}

#[test]
fn retake_discards_pupil_edits() {
    let mut session = frozen_session();
    let first = session.current_measurement().unwrap().clone();
    let first_pupils = session.pupils().unwrap();

    let grabbed = session.press(254.0, 200.0).unwrap();
    assert_eq!(grabbed, Some(Primitive::PupilHandle(Eye::Right)));
    let m = session.drag_to(244.0, 190.0).unwrap().unwrap();
    assert!((m.pupils.right.x - 244.0).abs() < EPS);
    assert!((m.pd_right_mm - 38.0).abs() < EPS);
    assert!((m.height_left_mm.unwrap() - first.height_left_mm.unwrap()).abs() < EPS);
    session.release().unwrap();

    session.retake().unwrap();
    session
        .on_landmarks(SyntheticFace::default().landmarks())
        .unwrap();
    let again = session.capture(None).unwrap();
    assert_eq!(session.pupils(), Some(first_pupils));
    assert_eq!(again.pupils, first.pupils);
    assert!((again.pd_right_mm - first.pd_right_mm).abs() < EPS);
}

#[test]
fn non_finite_pointer_is_rejected_without_side_effects() {
    let mut session = frozen_session();
    let before = session.current_measurement().unwrap().clone();
    let lines = *session.lines();

    assert!(matches!(
        session.press(f64::NAN, 10.0),
        Err(CenteringError::InvalidPointer { .. })
    ));
    assert_eq!(session.active_primitive(), None);

    session.press(254.0, 345.6).unwrap();
    assert!(matches!(
        session.drag_to(254.0, f64::NAN),
        Err(CenteringError::InvalidPointer { .. })
    ));
    assert!(matches!(
        session.drag_to(f64::INFINITY, 300.0),
        Err(CenteringError::InvalidPointer { .. })
    ));
    assert_eq!(session.lines(), &lines);
    assert_eq!(session.current_measurement(), Some(&before));
    assert_eq!(session.active_primitive(), Some(Primitive::HeightLine(Eye::Right)));

    // The grab survives and a finite drag still applies.
    let m = session.drag_to(254.0, 260.0).unwrap().unwrap();
    assert!((m.height_right_mm.unwrap() - 30.0).abs() < EPS);
}

#[test]
fn live_pupils_are_smoothed() {
    let mut session = new_session(CalibrationStore::in_memory("cam"));
    session
        .on_landmarks(SyntheticFace::default().landmarks())
        .unwrap();
    let m = session
        .on_landmarks(SyntheticFace::default().shifted(10.0, -4.0).landmarks())
        .unwrap()
        .unwrap();
    assert!((m.pupils.right.x - 259.0).abs() < EPS);
    assert!((m.pupils.left.y - 198.0).abs() < EPS);
}

#[test]
fn mirrored_preview_swaps_eye_labels() {
    let config = SessionConfig {
        mirrored: true,
        ..Default::default()
    };
    let mut session =
        MeasurementSession::new(config, FrameSpec::default(), CalibrationStore::in_memory("cam"))
            .unwrap();
    let m = session
        .on_landmarks(SyntheticFace::default().landmarks())
        .unwrap()
        .unwrap();
    assert!((m.pupils.left.x - 254.0).abs() < EPS);
    assert!((m.pupils.right.x - 386.0).abs() < EPS);
}

#[test]
fn frames_without_a_face_report_insufficient_signal() {
    let mut session = new_session(CalibrationStore::in_memory("cam"));
    assert!(matches!(
        session.on_landmarks(empty_face(640, 480)),
        Err(CenteringError::InsufficientSignal(_))
    ));
    assert!(session.current_measurement().is_none());
}

#[test]
fn stale_calibration_is_not_applied() {
    let stale = CalibrationData::from_reference(300.0, &FrameSpec::default(), "cam", 1).unwrap();

    let mut store = CalibrationStore::in_memory("cam");
    store.save(stale.clone()).unwrap();
    let config = SessionConfig {
        auto_calibrate: false,
        ..Default::default()
    };
    let mut session = MeasurementSession::new(config, FrameSpec::default(), store).unwrap();
    assert!(matches!(
        session.on_landmarks(SyntheticFace::default().landmarks()),
        Err(CenteringError::StaleCalibration { .. })
    ));

    // With auto-calibration the frame supplies a fresh scale instead.
    let mut store = CalibrationStore::in_memory("cam");
    store.save(stale).unwrap();
    let mut session = new_session(store);
    let m = session
        .on_landmarks(SyntheticFace::default().landmarks())
        .unwrap()
        .unwrap();
    assert!((m.pixels_per_mm - 2.0).abs() < EPS);
}

#[test]
fn validated_manual_calibration_is_persisted() {
    let dir = TempDir::new().unwrap();
    let mut session = new_session(CalibrationStore::new(
        "front-cam",
        JsonFileStorage::new(dir.path()),
    ));
    session
        .on_landmarks(SyntheticFace::default().landmarks())
        .unwrap();
    session
        .capture(Some(CapturedImage::new("image/png", vec![0x89, b'P', b'N', b'G'])))
        .unwrap();
    session.press(190.0, 100.0).unwrap();
    session.drag_to(180.0, 100.0).unwrap();
    session.release().unwrap();

    let m = session.validate().unwrap();
    assert_eq!(m.captured_image.as_ref().map(|i| i.data.len()), Some(4));
    let ops: Vec<&str> = session.log.iter().map(|e| e.operation.as_str()).collect();
    assert_eq!(ops, ["capture", "save_calibration", "validate"]);

    // A later session on the same device picks the scale up.
    let mut next = new_session(CalibrationStore::new(
        "front-cam",
        JsonFileStorage::new(dir.path()),
    ));
    let stored = next.store().current().unwrap();
    assert!((stored.pixels_per_mm - 264.0 / 127.0).abs() < EPS);
    let m = next
        .on_landmarks(SyntheticFace::default().landmarks())
        .unwrap()
        .unwrap();
    assert!((m.pd_mm - 63.5).abs() < EPS);
}

#[test]
fn unadjusted_calibration_is_not_saved_on_validate() {
    let mut session = frozen_session();
    session.validate().unwrap();
    assert!(session.store().current().is_none());
}

#[test]
fn explicit_calibration_and_reset() {
    let mut session = new_session(CalibrationStore::in_memory("cam"));
    assert!(session.calibrate().is_err());

    session
        .on_landmarks(SyntheticFace::default().landmarks())
        .unwrap();
    let data = session.calibrate().unwrap();
    assert!((data.pixels_per_mm - 2.0).abs() < EPS);
    assert_eq!(session.store().current(), Some(&data));

    session.reset_calibration().unwrap();
    assert!(session.store().current().is_none());
}

#[test]
fn cancel_discards_without_emitting() {
    let mut session = frozen_session();
    session.cancel().unwrap();
    assert_eq!(session.state(), SessionState::Cancelled);
    assert!(session.current_measurement().is_none());
    assert!(session.frozen().is_none());
    assert!(matches!(
        session.validate(),
        Err(CenteringError::InvalidState { .. })
    ));
    assert_eq!(
        session
            .on_landmarks(SyntheticFace::default().landmarks())
            .unwrap(),
        None
    );
}
