use web_engine::buffer::{BufferTarget, DataType, UsageHint};
use web_engine::logging::{init_logging, LoggingConfig};
use web_engine::pipeline::{CreateProgramError, Topology};
use web_engine::runtime::headless::{Command, HeadlessPlatform};
use web_engine::runtime::{AcquireError, ClearMask, ContextOptions, Surface};
use web_engine::{Engine, EngineConfig, StartError, TRIANGLE};

fn init() {
    init_logging(LoggingConfig::default());
}

fn draw_calls(commands: &[Command]) -> Vec<&Command> {
    commands
        .iter()
        .filter(|command| matches!(command, Command::DrawArrays { .. }))
        .collect()
}

#[test]
fn resize_before_start_is_a_no_op() {
    init();

    let platform = HeadlessPlatform::new().with_window_size(800, 600);
    let context = platform.context().clone();
    let surface = platform.surface().clone();
    let engine = Engine::new(platform, EngineConfig::default());

    engine.resize();
    engine.resize_to(10, 10);

    assert!(!engine.is_started());
    assert_eq!((surface.width(), surface.height()), (300, 150));
    assert!(context.commands().is_empty());
}

#[test]
fn resize_after_start_matches_the_window() {
    init();

    let platform = HeadlessPlatform::new().with_window_size(800, 600);
    let context = platform.context().clone();
    let surface = platform.surface().clone();
    let mut engine = Engine::new(platform, EngineConfig::default());

    engine.start().unwrap();
    context.clear_commands();
    engine.resize();

    assert_eq!((surface.width(), surface.height()), (800, 600));
    assert_eq!(
        context.commands(),
        vec![Command::Viewport {
            x: 0,
            y: 0,
            width: 800,
            height: 600,
        }]
    );

    engine.platform().set_window_size(1280, 720);
    engine.resize();

    assert_eq!((surface.width(), surface.height()), (1280, 720));
    assert_eq!(
        context.commands().last(),
        Some(&Command::Viewport {
            x: 0,
            y: 0,
            width: 1280,
            height: 720,
        })
    );
}

#[test]
fn start_uploads_the_triangle_once() {
    init();

    let platform = HeadlessPlatform::new();
    let context = platform.context().clone();
    let mut engine = Engine::new(platform, EngineConfig::default());

    engine.start().unwrap();

    let uploads: Vec<Command> = context
        .commands()
        .into_iter()
        .filter(|command| matches!(command, Command::BufferData { .. }))
        .collect();
    let expected: Vec<f32> = TRIANGLE.iter().flat_map(|p| p.iter().copied()).collect();

    assert_eq!(
        uploads,
        vec![Command::BufferData {
            target: BufferTarget::Array,
            data: expected,
            usage: UsageHint::StaticDraw,
        }]
    );
    assert!(context
        .commands()
        .contains(&Command::ClearColor([0.0, 0.0, 0.0, 1.0])));
}

#[test]
fn nothing_is_drawn_before_the_first_refresh() {
    init();

    let platform = HeadlessPlatform::new();
    let context = platform.context().clone();
    let scheduler = platform.scheduler().clone();
    let mut engine = Engine::new(platform, EngineConfig::default());

    engine.start().unwrap();

    assert!(draw_calls(&context.commands()).is_empty());
    assert_eq!(scheduler.pending(), 1);
    assert_eq!(engine.frame_count(), 0);
}

#[test]
fn every_refresh_draws_one_triangle() {
    init();

    let platform = HeadlessPlatform::new();
    let context = platform.context().clone();
    let scheduler = platform.scheduler().clone();
    let mut engine = Engine::new(platform, EngineConfig::default());

    engine.start().unwrap();
    context.clear_commands();

    for _ in 0..4 {
        assert!(scheduler.refresh());
    }

    let commands = context.commands();
    let draws = draw_calls(&commands);

    assert_eq!(draws.len(), 4);
    assert!(draws.iter().all(|command| **command
        == Command::DrawArrays {
            topology: Topology::Triangles,
            first: 0,
            count: 3,
        }));
    assert_eq!(
        commands
            .iter()
            .filter(|command| **command == Command::Clear(ClearMask::COLOR))
            .count(),
        4
    );
    assert!(commands.contains(&Command::VertexAttribPointer {
        location: 0,
        size: 3,
        data_type: DataType::Float,
        normalized: false,
        stride: 0,
        offset: 0,
    }));
    assert!(!commands
        .iter()
        .any(|command| matches!(command, Command::BufferData { .. })));
    assert_eq!(engine.frame_count(), 4);
}

#[test]
fn stop_cancels_the_frame_loop() {
    init();

    let platform = HeadlessPlatform::new();
    let context = platform.context().clone();
    let scheduler = platform.scheduler().clone();
    let mut engine = Engine::new(platform, EngineConfig::default());

    engine.start().unwrap();
    scheduler.refresh();

    assert!(engine.stop());
    assert!(!engine.is_started());

    context.clear_commands();
    scheduler.refresh();

    assert!(draw_calls(&context.commands()).is_empty());
    assert_eq!(scheduler.pending(), 0);

    engine.resize();

    assert!(context
        .commands()
        .iter()
        .all(|command| !matches!(command, Command::Viewport { .. })));
}

#[test]
fn engine_can_restart_after_stop() {
    init();

    let platform = HeadlessPlatform::new();
    let scheduler = platform.scheduler().clone();
    let mut engine = Engine::new(platform, EngineConfig::default());

    engine.start().unwrap();
    engine.stop();
    engine.start().unwrap();

    scheduler.refresh();

    assert!(engine.is_started());
    assert_eq!(engine.frame_count(), 1);
}

#[test]
fn restart_resets_the_position_array() {
    init();

    let platform = HeadlessPlatform::new().with_element("viewport");
    let context = platform.context().clone();
    let scheduler = platform.scheduler().clone();
    let config = EngineConfig::begin().canvas_id("viewport").finish();
    let mut engine = Engine::new(platform, config);

    engine.start().unwrap();
    scheduler.refresh();
    engine.stop();
    scheduler.refresh();

    context.clear_commands();
    engine.start().unwrap();
    scheduler.refresh();

    let toggles: Vec<Command> = context
        .commands()
        .into_iter()
        .filter(|command| {
            matches!(
                command,
                Command::EnableVertexAttribArray(_) | Command::DisableVertexAttribArray(_)
            )
        })
        .collect();

    assert_eq!(
        toggles,
        vec![
            Command::DisableVertexAttribArray(0),
            Command::EnableVertexAttribArray(0),
        ]
    );
}

#[test]
fn rejected_frame_request_ends_the_loop() {
    init();

    let platform = HeadlessPlatform::new();
    let context = platform.context().clone();
    let scheduler = platform.scheduler().clone();
    let mut engine = Engine::new(platform, EngineConfig::default());

    engine.start().unwrap();
    scheduler.fail_requests(true);
    scheduler.refresh();
    scheduler.fail_requests(false);
    context.clear_commands();

    assert!(!scheduler.refresh());
    assert!(draw_calls(&context.commands()).is_empty());
    assert!(!engine.is_running());

    assert!(engine.stop());
    engine.start().unwrap();
    scheduler.refresh();

    assert!(engine.is_running());
    assert_eq!(engine.frame_count(), 1);
}

#[test]
fn missing_canvas_fails_start() {
    init();

    let platform = HeadlessPlatform::new().with_element("other");
    let scheduler = platform.scheduler().clone();
    let config = EngineConfig::begin().canvas_id("viewport").finish();
    let mut engine = Engine::new(platform, config);

    let error = engine.start().unwrap_err();

    assert_eq!(
        error,
        StartError::Acquire(AcquireError::SurfaceNotFound {
            id: "viewport".to_string(),
        })
    );
    assert_eq!(error.to_string(), "Cannot find a canvas element named: viewport");
    assert!(!engine.is_started());
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn existing_canvas_is_used() {
    init();

    let platform = HeadlessPlatform::new().with_element("viewport");
    let config = EngineConfig::begin().canvas_id("viewport").finish();
    let mut engine = Engine::new(platform, config);

    assert!(engine.start().is_ok());
}

#[test]
fn unavailable_context_fails_start() {
    init();

    let platform = HeadlessPlatform::new().without_context();
    let mut engine = Engine::new(platform, EngineConfig::default());

    match engine.start() {
        Err(StartError::Acquire(AcquireError::ContextCreation { reason })) => {
            assert!(!reason.is_empty())
        }
        result => panic!("unexpected result: {:?}", result),
    }

    engine.resize();

    assert!(!engine.is_started());
}

#[test]
fn lost_context_fails_start() {
    init();

    let platform = HeadlessPlatform::new();

    platform.context().lose_context();

    let mut engine = Engine::new(platform, EngineConfig::default());

    assert_eq!(
        engine.start(),
        Err(StartError::CreateProgram(
            CreateProgramError::ObjectAllocation { object: "shader" }
        ))
    );
}

#[test]
fn context_options_are_passed_to_the_platform() {
    init();

    let options = ContextOptions::begin()
        .antialias(false)
        .preserve_drawing_buffer(true)
        .finish();
    let platform = HeadlessPlatform::new();
    let config = EngineConfig::begin()
        .context_options(options.clone())
        .finish();
    let mut engine = Engine::new(platform, config);

    engine.start().unwrap();

    assert_eq!(engine.platform().requested_options(), Some(options));
}
