use anyhow::Context;
use bulk_flow_renamer::app::{self, events::UserEvent, helpers::lock_state, Services};
use bulk_flow_renamer::config::settings;
use std::sync::{Arc, Mutex};
use tao::{
    event::{Event, StartCause, WindowEvent},
    event_loop::{ControlFlow, EventLoopBuilder},
    window::WindowBuilder,
};
use tracing_subscriber::EnvFilter;
use wry::WebViewBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_dir = settings::get_config_directory().context("Cannot determine the configuration directory")?;
    let state = app::state::AppState::load(config_dir).context("Failed to build the runner registry")?;
    let (width, height) = state.config.window_size;
    let (pos_x, pos_y) = state.config.window_position;
    let title = app::i18n::tr(state.config.language, "app.title");
    let state = Arc::new(Mutex::new(state));

    let event_loop = EventLoopBuilder::<UserEvent>::with_user_event().build();
    let window = WindowBuilder::new()
        .with_title(title)
        .with_inner_size(tao::dpi::LogicalSize::new(width, height))
        .with_position(tao::dpi::LogicalPosition::new(pos_x, pos_y))
        .with_min_inner_size(tao::dpi::LogicalSize::new(900, 600))
        .build(&event_loop)
        .context("Failed to build window")?;
    let window = Arc::new(window);

    let proxy = event_loop.create_proxy();
    let services = Services::native();

    let ipc_handler_state = state.clone();
    let ipc_handler_proxy = proxy.clone();
    let ipc_handler_services = services.clone();
    let ipc_handler = move |message: String| {
        app::handle_ipc_message(
            message,
            &ipc_handler_services,
            ipc_handler_proxy.clone(),
            ipc_handler_state.clone(),
        );
    };

    let drop_handler_state = state.clone();
    let drop_handler_proxy = proxy.clone();
    let file_drop_handler = move |event| {
        use app::proxy::EventProxy;
        use wry::FileDropEvent;
        match event {
            FileDropEvent::Hovered { .. } => {
                EventProxy::send_event(&drop_handler_proxy, UserEvent::DragStateChanged(true));
            }
            FileDropEvent::Dropped { paths, .. } => {
                EventProxy::send_event(&drop_handler_proxy, UserEvent::DragStateChanged(false));
                app::commands::add_source_folders(
                    paths,
                    &services,
                    drop_handler_proxy.clone(),
                    drop_handler_state.clone(),
                );
            }
            FileDropEvent::Cancelled => {
                EventProxy::send_event(&drop_handler_proxy, UserEvent::DragStateChanged(false));
            }
            _ => (),
        }
        true
    };

    #[cfg(debug_assertions)]
    let webview_builder = {
        tracing::info!("Running in DEBUG mode, loading from the dev server.");
        WebViewBuilder::new(&*window)
            .with_url("http://localhost:1420")
            .with_devtools(true)
    };

    #[cfg(not(debug_assertions))]
    let webview_builder = {
        tracing::info!("Running in RELEASE mode, loading bundled assets.");
        WebViewBuilder::new(&*window)
            .with_html(include_str!("ui/dist/index.html"))
            .with_devtools(false)
    };

    let webview = webview_builder
        .with_ipc_handler(ipc_handler)
        .with_file_drop_handler(file_drop_handler)
        .build()
        .context("Failed to build WebView")?;

    let state_for_events = state.clone();
    let window_for_events = window.clone();

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;

        let mut exit = false;
        match event {
            Event::NewEvents(StartCause::Init) => {
                tracing::info!("Application initialized.");
            }
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => exit = true,
                WindowEvent::Resized(size) => {
                    let size = size.to_logical::<f64>(window_for_events.scale_factor());
                    lock_state(&state_for_events).config.window_size = (size.width, size.height);
                }
                WindowEvent::Moved(position) => {
                    let position = position.to_logical::<f64>(window_for_events.scale_factor());
                    lock_state(&state_for_events).config.window_position = (position.x, position.y);
                }
                _ => (),
            },
            Event::UserEvent(UserEvent::Exit) => exit = true,
            Event::UserEvent(user_event) => app::handle_user_event(user_event, &webview),
            _ => (),
        }

        if exit {
            tracing::info!("Exiting. Saving final window state...");
            let state_guard = lock_state(&state_for_events);
            if let Err(e) = state_guard.save_config() {
                tracing::error!("Failed to save config on exit: {}", e);
            }
            *control_flow = ControlFlow::Exit;
        }
    })
}
