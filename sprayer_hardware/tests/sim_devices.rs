use rstest::rstest;
use sprayer_hardware::{SimulatedCamera, SimulatedOutput};
use sprayer_traits::{Camera, OutputDriver};

#[rstest]
#[case(1)]
#[case(3)]
fn cleanup_is_idempotent(#[case] calls: usize) {
    let mut out = SimulatedOutput::new(17);
    let monitor = out.monitor();
    out.set_energized(true).unwrap();
    for _ in 0..calls {
        out.set_energized(false).unwrap();
        out.release().unwrap();
        assert!(!monitor.is_energized());
    }
    assert!(monitor.is_released());
}

#[rstest]
fn released_camera_reports_error() {
    let mut cam = SimulatedCamera::new(16, 16, 2, 11);
    let frame = cam.capture().unwrap().expect("frame");
    assert_eq!((frame.width(), frame.height()), (16, 16));
    cam.release().unwrap();
    assert!(cam.capture().is_err());
}

#[rstest]
fn camera_errors_name_their_device() {
    let mut cam = SimulatedCamera::new(8, 8, 0, 3).with_device_id(2);
    assert_eq!(cam.device_id(), 2);
    assert!(cam.capture().unwrap().is_some());
    cam.release().unwrap();
    let err = cam.capture().unwrap_err();
    assert!(err.to_string().contains("camera 2 released"), "{err}");
}
