use std::cell::RefCell;
use std::rc::Rc;
use webxr_bridge::engine::{SharedXrServer, TrackerKind, XrServer};
use webxr_bridge::render::{HeadlessTextureStorage, SharedTextureStorage};
use webxr_bridge::vr::{
    HostCallback, HostEvent, HostFrame, InputSourceSample, InputValues, PointerEvent,
    ScriptedHost, ScriptedHostHandle, SessionConfig, SessionMode, SessionPhase, TargetRayMode,
    Transform, WebXrInterface, XrError, XrEvent, XrInterface,
};

struct Fixture {
    interface: WebXrInterface,
    host: ScriptedHostHandle,
    server: SharedXrServer,
}

fn fixture(config: SessionConfig) -> Fixture {
    let (host, handle) = ScriptedHost::new();
    let server = XrServer::shared([1280, 720]);
    let storage: SharedTextureStorage = Rc::new(RefCell::new(HeadlessTextureStorage::default()));
    let interface =
        WebXrInterface::new(Box::new(host), Rc::clone(&server), storage).with_config(config);
    Fixture {
        interface,
        host: handle,
        server,
    }
}

fn immersive_config() -> SessionConfig {
    SessionConfig {
        session_mode: SessionMode::ImmersiveVr,
        required_features: vec!["local-floor".into()],
        optional_features: vec!["hand-tracking".into(), "bounded-floor".into()],
        requested_reference_space_types: vec!["bounded-floor".into(), "local-floor".into()],
    }
}

fn screen_touch(axes: [f32; 2]) -> InputSourceSample {
    InputSourceSample {
        target_pose: Transform::IDENTITY.to_host_matrix(),
        target_ray_mode: TargetRayMode::Screen,
        touch_index: 0,
        grip_pose: None,
        standard_mapping: false,
        buttons: InputValues::default(),
        axes: InputValues::from_slice(&axes),
    }
}

#[test]
fn initialize_requests_session_and_registers_head_tracker() {
    let mut fx = fixture(immersive_config());
    assert!(fx.interface.initialize());
    assert_eq!(fx.interface.phase(), SessionPhase::Active);

    let requests = fx.host.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.mode, SessionMode::ImmersiveVr);
    assert_eq!(request.required_features, "local-floor");
    assert_eq!(request.optional_features, "hand-tracking,bounded-floor");
    assert_eq!(request.requested_reference_space_types, "bounded-floor,local-floor");
    assert_eq!(request.session, fx.interface.session_id());

    let server = fx.server.borrow();
    let (head_id, head) = server.find_tracker("head").expect("head tracker");
    assert_eq!(head.kind, TrackerKind::Head);
    assert_eq!(fx.interface.head_tracker(), Some(head_id));
    assert_eq!(server.primary_interface(), Some("WebXR"));
}

#[test]
fn initialize_is_idempotent() {
    let mut fx = fixture(SessionConfig::default());
    assert!(fx.interface.initialize());
    assert!(fx.interface.initialize());
    assert_eq!(fx.host.requests().len(), 1);
    assert_eq!(fx.server.borrow().tracker_count(), 1);
}

#[test]
fn unsupported_mode_fails_without_state_change() {
    let mut fx = fixture(immersive_config());
    fx.host.set_supported_modes(vec![SessionMode::Inline]);

    assert!(matches!(
        fx.interface.try_initialize(),
        Err(XrError::UnsupportedSessionMode(SessionMode::ImmersiveVr))
    ));
    assert!(!fx.interface.initialize());
    assert!(!fx.interface.is_initialized());
    assert!(fx.host.requests().is_empty());
    assert_eq!(fx.server.borrow().tracker_count(), 0);
    assert_eq!(fx.server.borrow().primary_interface(), None);
}

#[test]
fn host_without_xr_support_fails() {
    let mut fx = fixture(SessionConfig::default());
    fx.host.set_supported(false);
    assert!(!fx.interface.initialize());
    assert_eq!(fx.interface.phase(), SessionPhase::Uninitialized);
}

#[test]
fn initialize_requires_reference_space_types() {
    let mut fx = fixture(SessionConfig::default());
    fx.interface
        .set_requested_reference_space_types(" , ")
        .expect("config unlocked");
    assert!(matches!(
        fx.interface.try_initialize(),
        Err(XrError::NoReferenceSpaces)
    ));
    assert!(fx.host.requests().is_empty());
}

#[test]
fn rejected_request_rolls_back() {
    let mut fx = fixture(SessionConfig::default());
    fx.host.reject_requests("user declined");

    let err = fx.interface.try_initialize().unwrap_err();
    assert!(matches!(err, XrError::Host(ref reason) if reason == "user declined"));
    assert!(!fx.interface.is_initialized());
    assert_eq!(fx.server.borrow().tracker_count(), 0);
    assert_eq!(fx.server.borrow().primary_interface(), None);
}

#[test]
fn config_is_locked_while_initialized() {
    let mut fx = fixture(SessionConfig::default());
    fx.interface
        .set_session_mode("immersive-ar")
        .expect("unlocked before initialize");
    fx.interface
        .set_required_features("local, hit-test")
        .expect("unlocked before initialize");
    assert_eq!(fx.interface.config().required_features, vec!["local", "hit-test"]);
    assert!(matches!(
        fx.interface.set_session_mode("vr"),
        Err(XrError::Config(_))
    ));

    assert!(fx.interface.initialize());
    assert!(matches!(
        fx.interface.set_optional_features("anchors"),
        Err(XrError::ConfigLocked)
    ));
    assert!(matches!(
        fx.interface.set_config(SessionConfig::default()),
        Err(XrError::ConfigLocked)
    ));
    assert_eq!(fx.interface.config().session_mode, SessionMode::ImmersiveAr);
}

#[test]
fn session_started_records_reference_space() {
    let mut fx = fixture(SessionConfig::default());
    assert!(fx.interface.initialize());
    assert_eq!(fx.interface.reference_space_type(), "");

    let callback = fx.host.callback(HostEvent::SessionStarted {
        reference_space_type: "local-floor".into(),
    });
    fx.interface.handle_host_callback(callback);

    assert_eq!(fx.interface.reference_space_type(), "local-floor");
    assert_eq!(fx.interface.drain_events(), vec![XrEvent::SessionStarted]);
}

#[test]
fn session_ended_uninitializes_before_notifying() {
    let mut fx = fixture(SessionConfig::default());
    assert!(fx.interface.initialize());
    let started = fx.host.callback(HostEvent::SessionStarted {
        reference_space_type: "local".into(),
    });
    fx.interface.handle_host_callback(started);
    fx.interface.drain_events();

    let ended = fx.host.callback(HostEvent::SessionEnded);
    fx.interface.handle_host_callback(ended);

    assert!(!fx.interface.is_initialized());
    assert_eq!(fx.interface.drain_events(), vec![XrEvent::SessionEnded]);
    assert_eq!(fx.host.end_calls(), 1);
    assert_eq!(fx.interface.reference_space_type(), "");
    assert_eq!(fx.server.borrow().tracker_count(), 0);
    assert_eq!(fx.server.borrow().primary_interface(), None);
}

#[test]
fn session_failure_carries_message() {
    let mut fx = fixture(SessionConfig::default());
    assert!(fx.interface.initialize());

    let failed = fx.host.callback(HostEvent::SessionFailed {
        message: "device lost".into(),
    });
    fx.interface.handle_host_callback(failed);

    assert!(!fx.interface.is_initialized());
    assert_eq!(
        fx.interface.drain_events(),
        vec![XrEvent::SessionFailed {
            message: "device lost".into()
        }]
    );
}

#[test]
fn callbacks_for_previous_session_are_dropped() {
    let mut fx = fixture(SessionConfig::default());
    assert!(fx.interface.initialize());
    let first = fx.interface.session_id();
    fx.interface.uninitialize();
    assert!(fx.interface.initialize());
    assert_ne!(fx.interface.session_id(), first);

    fx.interface.handle_host_callback(HostCallback {
        session: first,
        event: HostEvent::SessionEnded,
    });
    assert!(fx.interface.is_initialized());
    assert!(fx.interface.drain_events().is_empty());
    assert_eq!(fx.host.end_calls(), 1);
}

#[test]
fn uninitialize_twice_is_a_no_op() {
    let mut fx = fixture(SessionConfig::default());
    fx.host.update_frame(|frame| {
        frame.render_target_size = Some([2048, 1024]);
        frame.color_texture = 10;
    });
    assert!(fx.interface.initialize());
    let started = fx.host.callback(HostEvent::SessionStarted {
        reference_space_type: "local".into(),
    });
    fx.interface.handle_host_callback(started);
    assert_eq!(fx.interface.render_target_size(), [2048, 1024]);

    fx.interface.uninitialize();
    fx.interface.uninitialize();

    assert_eq!(fx.host.end_calls(), 1);
    assert_eq!(fx.interface.reference_space_type(), "");
    assert!(fx.interface.texture_cache().is_empty());
    assert_eq!(fx.interface.render_target_size(), [1280, 720]);
    assert_eq!(fx.interface.phase(), SessionPhase::Uninitialized);
}

#[test]
fn busy_server_keeps_session_until_teardown_can_finish() {
    let mut fx = fixture(SessionConfig::default());
    fx.host.update_frame(|frame| {
        frame.input_sources.insert(1, screen_touch([0.0, 0.0]));
    });
    assert!(fx.interface.initialize());
    fx.interface.process();
    assert_eq!(fx.server.borrow().tracker_count(), 2);

    {
        let _held = fx.server.borrow();
        fx.interface.uninitialize();
    }
    assert!(fx.interface.is_initialized());
    assert!(fx.interface.head_tracker().is_some());
    assert!(fx.interface.input_source_tracker(1).is_some());
    assert_eq!(fx.server.borrow().tracker_count(), 2);
    assert_eq!(fx.host.end_calls(), 0);

    fx.interface.uninitialize();
    assert!(!fx.interface.is_initialized());
    assert_eq!(fx.server.borrow().tracker_count(), 0);
    assert_eq!(fx.server.borrow().primary_interface(), None);
    assert_eq!(fx.host.end_calls(), 1);
}

#[test]
fn render_target_size_is_cached_for_the_session() {
    let mut fx = fixture(SessionConfig::default());
    assert_eq!(fx.interface.render_target_size(), [1280, 720]);

    assert!(fx.interface.initialize());
    assert_eq!(fx.interface.render_target_size(), [1280, 720]);

    fx.host
        .update_frame(|frame| frame.render_target_size = Some([1600, 900]));
    assert_eq!(fx.interface.render_target_size(), [1600, 900]);

    fx.host
        .update_frame(|frame| frame.render_target_size = Some([640, 480]));
    assert_eq!(fx.interface.render_target_size(), [1600, 900]);
}

#[test]
fn process_publishes_head_and_input_poses() {
    let mut fx = fixture(SessionConfig::default());
    assert!(fx.interface.initialize());

    let mut frame = HostFrame {
        head: Some(Transform::from_translation([0.0, 1.7, 0.0]).to_host_matrix()),
        ..HostFrame::default()
    };
    frame.input_sources.insert(
        1,
        InputSourceSample {
            target_ray_mode: TargetRayMode::TrackedPointer,
            ..screen_touch([0.0, 0.0])
        },
    );
    fx.host.set_frame(frame);
    fx.interface.process();

    let server = fx.server.borrow();
    let head = server
        .tracker(fx.interface.head_tracker().expect("head"))
        .expect("head registered");
    assert_eq!(
        head.pose("default").expect("head pose").transform.origin,
        [0.0, 1.7, 0.0]
    );
    assert!(fx.interface.is_input_source_active(1));
    assert!(!fx.interface.is_input_source_active(0));
    let right = server
        .tracker(fx.interface.input_source_tracker(1).expect("tracker"))
        .expect("registered");
    assert_eq!(right.name, "right_hand");
    assert_eq!(
        fx.interface.input_source_target_ray_mode(1),
        TargetRayMode::TrackedPointer
    );
}

#[test]
fn missing_head_transform_keeps_previous_pose() {
    let mut fx = fixture(SessionConfig::default());
    assert!(fx.interface.initialize());
    fx.host.update_frame(|frame| {
        frame.head = Some(Transform::from_translation([0.5, 1.6, 0.0]).to_host_matrix());
    });
    fx.interface.process();
    fx.host.update_frame(|frame| frame.head = None);
    fx.interface.process();

    assert_eq!(fx.interface.camera_transform().origin, [0.5, 1.6, 0.0]);
}

#[test]
fn process_is_a_no_op_when_uninitialized() {
    let mut fx = fixture(SessionConfig::default());
    fx.host.update_frame(|frame| {
        frame.input_sources.insert(0, screen_touch([0.0, 0.0]));
    });
    fx.interface.process();
    assert_eq!(fx.server.borrow().tracker_count(), 0);
    assert!(!fx.interface.is_input_source_active(0));
}

#[test]
fn camera_transform_applies_world_scale_and_reference_frame() {
    let mut fx = fixture(SessionConfig::default());
    assert_eq!(fx.interface.camera_transform(), Transform::IDENTITY);

    assert!(fx.interface.initialize());
    fx.host.update_frame(|frame| {
        frame.head = Some(Transform::from_translation([1.0, 2.0, 3.0]).to_host_matrix());
    });
    fx.interface.process();
    {
        let mut server = fx.server.borrow_mut();
        server.set_world_scale(2.0);
        server.set_reference_frame(Transform::from_translation([10.0, 0.0, 0.0]));
    }

    assert_eq!(fx.interface.camera_transform().origin, [12.0, 4.0, 6.0]);
}

#[test]
fn view_transform_falls_back_to_camera() {
    let mut fx = fixture(SessionConfig::default());
    let camera = Transform::from_translation([0.0, 1.0, 5.0]);
    assert_eq!(fx.interface.transform_for_view(0, &camera), camera);

    assert!(fx.interface.initialize());
    assert_eq!(fx.interface.transform_for_view(0, &camera), camera);

    fx.host.update_frame(|frame| {
        frame.views = vec![Transform::from_translation([-0.03, 0.0, 0.0]).to_host_matrix()];
    });
    let eye = fx.interface.transform_for_view(0, &camera);
    assert!((eye.origin[0] + 0.03).abs() < 1e-6);
    assert_eq!(eye.origin[2], 5.0);
}

#[test]
fn projection_recomputes_depth_terms() {
    let mut fx = fixture(SessionConfig::default());
    assert!(fx.interface.initialize());
    let default = fx.interface.projection_for_view(0, 1.0, 0.05, 100.0);
    assert_eq!(default, webxr_bridge::vr::Projection::IDENTITY);

    let mut host_matrix = [0.0f32; 16];
    host_matrix[0] = 1.2;
    host_matrix[5] = 1.0;
    host_matrix[10] = -1.0;
    host_matrix[11] = -1.0;
    host_matrix[14] = -0.2;
    fx.host.update_frame(|frame| frame.projections = vec![host_matrix]);

    let projection = fx.interface.projection_for_view(0, 1.0, 0.5, 50.0);
    assert_eq!(projection.columns[0][0], 1.2);
    assert_eq!(projection.columns[2][3], -1.0);
    assert!((projection.columns[2][2] - (-50.5 / 49.5)).abs() < 1e-5);
    assert!((projection.columns[3][2] - (-50.0 / 49.5)).abs() < 1e-5);
}

#[test]
fn screen_select_dispatches_touches_and_select_events() {
    let mut fx = fixture(SessionConfig::default());
    fx.server.borrow_mut().set_viewport_size([800.0, 600.0]);
    assert!(fx.interface.initialize());
    fx.host.update_frame(|frame| {
        frame.input_sources.insert(2, screen_touch([0.5, -0.5]));
    });

    let start = fx.host.callback(HostEvent::InputEvent {
        event_code: 0,
        input_source: 2,
    });
    fx.interface.handle_host_callback(start);
    assert_eq!(
        fx.interface.drain_pointer_events(),
        vec![PointerEvent::Touch {
            index: 0,
            position: [600.0, 150.0],
            pressed: true,
        }]
    );
    assert_eq!(
        fx.interface.drain_events(),
        vec![XrEvent::SelectStart { input_source: 2 }]
    );

    let end = fx.host.callback(HostEvent::InputEvent {
        event_code: 1,
        input_source: 2,
    });
    fx.interface.handle_host_callback(end);
    assert_eq!(
        fx.interface.drain_pointer_events(),
        vec![PointerEvent::Touch {
            index: 0,
            position: [600.0, 150.0],
            pressed: false,
        }]
    );
    assert_eq!(
        fx.interface.drain_events(),
        vec![
            XrEvent::SelectEnd { input_source: 2 },
            XrEvent::Select { input_source: 2 },
        ]
    );
}

#[test]
fn squeeze_events_do_not_touch_the_screen() {
    let mut fx = fixture(SessionConfig::default());
    assert!(fx.interface.initialize());
    fx.host.update_frame(|frame| {
        frame.input_sources.insert(0, screen_touch([0.0, 0.0]));
    });

    for code in [2, 3] {
        let callback = fx.host.callback(HostEvent::InputEvent {
            event_code: code,
            input_source: 0,
        });
        fx.interface.handle_host_callback(callback);
    }
    assert!(fx.interface.drain_pointer_events().is_empty());
    assert_eq!(
        fx.interface.drain_events(),
        vec![
            XrEvent::SqueezeStart { input_source: 0 },
            XrEvent::SqueezeEnd { input_source: 0 },
            XrEvent::Squeeze { input_source: 0 },
        ]
    );
}

#[test]
fn malformed_input_events_are_ignored() {
    let mut fx = fixture(SessionConfig::default());
    assert!(fx.interface.initialize());
    for (event_code, input_source) in [(9, 0), (0, -1), (0, 16)] {
        let callback = fx.host.callback(HostEvent::InputEvent {
            event_code,
            input_source,
        });
        fx.interface.handle_host_callback(callback);
    }
    assert!(fx.interface.drain_events().is_empty());
    assert_eq!(fx.server.borrow().tracker_count(), 1);
}

#[test]
fn visibility_changes_are_deduplicated() {
    let mut fx = fixture(SessionConfig::default());
    assert!(fx.interface.initialize());
    fx.host
        .update_frame(|frame| frame.visibility_state = Some("visible".into()));
    assert_eq!(fx.interface.visibility_state(), "visible");

    let changed = || HostEvent::SimpleEvent {
        name: "visibility_state_changed".into(),
    };
    fx.interface.handle_host_callback(fx.host.callback(changed()));
    fx.interface.handle_host_callback(fx.host.callback(changed()));
    fx.host
        .update_frame(|frame| frame.visibility_state = Some("hidden".into()));
    fx.interface.handle_host_callback(fx.host.callback(changed()));
    fx.interface
        .handle_host_callback(fx.host.callback(HostEvent::SimpleEvent {
            name: "reference_space_reset".into(),
        }));

    let names: Vec<String> = fx
        .interface
        .drain_events()
        .iter()
        .map(|event| event.name().to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "visibility_state_changed",
            "visibility_state_changed",
            "reference_space_reset"
        ]
    );
}

#[test]
fn play_area_decodes_bounds_points() {
    let mut fx = fixture(SessionConfig::default());
    assert!(fx.interface.play_area().is_empty());
    fx.host.update_frame(|frame| {
        frame.bounds_geometry = vec![1.0, 0.0, 1.0, -1.0, 0.0, 1.0, -1.0, 0.0, -1.0];
    });
    let area = fx.interface.play_area();
    assert_eq!(area.len(), 3);
    assert_eq!(area[1], [-1.0, 0.0, 1.0]);
}

#[test]
fn session_support_is_reported_as_event() {
    let mut fx = fixture(SessionConfig::default());
    fx.host.set_supported_modes(vec![SessionMode::Inline]);
    fx.interface.is_session_supported(SessionMode::ImmersiveAr);
    fx.interface.is_session_supported(SessionMode::Inline);
    assert_eq!(
        fx.interface.drain_events(),
        vec![
            XrEvent::SessionSupported {
                session_mode: "immersive-ar".into(),
                supported: false,
            },
            XrEvent::SessionSupported {
                session_mode: "inline".into(),
                supported: true,
            },
        ]
    );
}

#[test]
fn dropping_the_interface_ends_the_session() {
    let Fixture {
        mut interface,
        host,
        server,
    } = fixture(SessionConfig::default());
    assert!(interface.initialize());
    assert_eq!(server.borrow().tracker_count(), 1);

    drop(interface);
    assert_eq!(host.end_calls(), 1);
    assert_eq!(server.borrow().tracker_count(), 0);
}
