//! Native host: one window per canvas, driven from a single winit event loop.
//!
//! The gallery page opens a preview window per descriptor, tiled over the
//! primary monitor; the detail page opens one full window. Navigating tears
//! down every canvas of the current page before the next page mounts.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use catalog::GalleryConfig;
use renderer::gpu::{BackendOptions, WgpuBackend, WindowCanvas};
use renderer::window::{CanvasInput, CanvasWindow, WindowFrameScheduler};
use renderer::{
    DeviceProvider, Rect, RenderUnitRegistry, SizingLimits, Status, SurfaceManager,
    SurfaceOptions, ViewportObserver,
};
use winit::dpi::{LogicalSize, PhysicalPosition, PhysicalSize};
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::{Key, NamedKey};
use winit::window::{WindowBuilder, WindowId};

use crate::routes::Route;

/// Poll interval while device negotiation or unit creation is in flight.
const SETTLE_POLL: Duration = Duration::from_millis(8);
const TILE_GAP: f64 = 16.0;
const FALLBACK_VIEWPORT: Rect = Rect::new(0.0, 0.0, 1920.0, 1080.0);
const DETAIL_SIZE: LogicalSize<f64> = LogicalSize::new(960.0, 540.0);

pub fn run(config: GalleryConfig, route: Route, options: BackendOptions) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let mut app = GalleryApp::new(config, options);
    app.navigate(route, &event_loop, Instant::now())?;

    let mut failure = None;
    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } => {
            let now = Instant::now();
            match app.handle_window_event(window_id, &event, now) {
                Some(Action::Navigate(route)) => {
                    if let Err(err) = app.navigate(route, elwt, now) {
                        tracing::error!(error = %format!("{err:#}"), "failed to open page");
                        failure = Some(err);
                        elwt.exit();
                    }
                }
                Some(Action::Exit) => elwt.exit(),
                None => {}
            }
        }
        Event::AboutToWait => {
            let now = Instant::now();
            if app.poll(now) {
                elwt.set_control_flow(ControlFlow::WaitUntil(now + SETTLE_POLL));
            } else {
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        Event::LoopExiting => app.close_page(),
        _ => {}
    });

    if let Err(err) = run_result {
        return Err(anyhow!("window event loop error: {err}"));
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Navigate(Route),
    Exit,
}

struct PageCanvas {
    demo_id: String,
    title: String,
    window: CanvasWindow,
    shown: Option<Status>,
}

impl PageCanvas {
    fn refresh_title(&mut self) {
        let status = self.window.status();
        if self.shown != Some(status) {
            self.window
                .window()
                .set_title(&window_title(&self.title, status));
            self.shown = Some(status);
        }
    }
}

struct Page {
    route: Route,
    canvases: Vec<PageCanvas>,
}

struct GalleryApp {
    config: GalleryConfig,
    options: SurfaceOptions,
    provider: Rc<DeviceProvider<WgpuBackend>>,
    registry: Rc<RenderUnitRegistry<WgpuBackend>>,
    observer: Rc<RefCell<ViewportObserver>>,
    page: Option<Page>,
}

impl GalleryApp {
    fn new(config: GalleryConfig, backend: BackendOptions) -> Self {
        let observer = ViewportObserver::with_threshold(
            FALLBACK_VIEWPORT,
            config.preview.visibility_threshold,
        );
        Self {
            options: surface_options(&config),
            provider: Rc::new(DeviceProvider::new(WgpuBackend::new(backend))),
            registry: Rc::new(demos::registry()),
            observer: Rc::new(RefCell::new(observer)),
            config,
            page: None,
        }
    }

    /// Unmounts every canvas of the current page and closes its windows.
    fn close_page(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        tracing::debug!(route = %page.route, canvases = page.canvases.len(), "closing page");
        for mut canvas in page.canvases {
            canvas.window.manager_mut().unmount();
        }
    }

    fn navigate(
        &mut self,
        route: Route,
        elwt: &EventLoopWindowTarget<()>,
        now: Instant,
    ) -> Result<()> {
        self.close_page();
        let route = route.resolve();

        let viewport = monitor_viewport(elwt);
        // Nothing is observed between pages, so there are no changes to apply.
        self.observer.borrow_mut().set_viewport(viewport);

        let canvases = match &route {
            Route::Detail(id) => {
                let demo = self
                    .config
                    .find_demo(id)
                    .ok_or_else(|| anyhow!("configuration lists no demos"))?
                    .clone();
                if demo.id != *id {
                    tracing::info!(requested = %id, shown = %demo.id, "unknown demo id");
                }
                let builder = WindowBuilder::new()
                    .with_title(&demo.title)
                    .with_inner_size(DETAIL_SIZE);
                vec![self.open_canvas(elwt, builder, &demo.id, &demo.title, false, now)?]
            }
            Route::Gallery | Route::Redirect => {
                let tiles = tile_layout(viewport, self.config.demos.len());
                let mut canvases = Vec::with_capacity(tiles.len());
                for (demo, tile) in self.config.demos.iter().zip(tiles) {
                    let builder = WindowBuilder::new()
                        .with_title(&demo.title)
                        .with_position(PhysicalPosition::new(tile.x, tile.y))
                        .with_inner_size(PhysicalSize::new(tile.width, tile.height));
                    canvases.push(self.open_canvas(elwt, builder, &demo.id, &demo.title, true, now)?);
                }
                canvases
            }
        };

        tracing::info!(route = %route, canvases = canvases.len(), "page opened");
        self.page = Some(Page { route, canvases });
        Ok(())
    }

    fn open_canvas(
        &self,
        elwt: &EventLoopWindowTarget<()>,
        builder: WindowBuilder,
        demo_id: &str,
        title: &str,
        preview: bool,
        now: Instant,
    ) -> Result<PageCanvas> {
        let window = builder
            .build(elwt)
            .map_err(|err| anyhow!("failed to create window for {demo_id}: {err}"))?;
        let window = Arc::new(window);
        let canvas = WindowCanvas::new(self.provider.backend(), window.clone())
            .with_context(|| format!("failed to create canvas for {demo_id}"))?;
        let manager = SurfaceManager::new(
            self.provider.clone(),
            self.registry.clone(),
            canvas,
            WindowFrameScheduler::new(window),
            self.options,
            demo_id,
            preview,
            now,
        );
        let mut canvas_window = CanvasWindow::new(manager, &self.observer, now);
        canvas_window.mount(now);

        let mut page_canvas = PageCanvas {
            demo_id: demo_id.to_string(),
            title: title.to_string(),
            window: canvas_window,
            shown: None,
        };
        page_canvas.refresh_title();
        Ok(page_canvas)
    }

    fn handle_window_event(
        &mut self,
        window_id: WindowId,
        event: &WindowEvent,
        now: Instant,
    ) -> Option<Action> {
        let page = self.page.as_mut()?;
        let canvas = page
            .canvases
            .iter_mut()
            .find(|canvas| canvas.window.window().id() == window_id)?;
        let input = canvas.window.handle_event(event, now)?;
        let demo_id = canvas.demo_id.clone();
        page_action(&page.route, &demo_id, input)
    }

    /// Advances every canvas. Returns whether async work is still in flight.
    fn poll(&mut self, now: Instant) -> bool {
        // Creations abandoned by closed pages are reaped even with no page open.
        self.registry.reap_abandoned();
        let mut settling = self.registry.has_abandoned();
        let Some(page) = self.page.as_mut() else {
            return settling;
        };
        for canvas in &mut page.canvases {
            canvas.window.poll(now);
            canvas.refresh_title();
            settling |= canvas.window.manager().is_settling();
        }
        settling
    }
}

fn page_action(route: &Route, demo_id: &str, input: CanvasInput) -> Option<Action> {
    let on_detail = matches!(route, Route::Detail(_));
    match input {
        CanvasInput::Clicked if !on_detail => Some(Action::Navigate(Route::detail(demo_id))),
        CanvasInput::Key(Key::Named(NamedKey::Escape | NamedKey::Backspace)) if on_detail => {
            Some(Action::Navigate(Route::Gallery))
        }
        CanvasInput::CloseRequested if on_detail => Some(Action::Navigate(Route::Gallery)),
        CanvasInput::CloseRequested => Some(Action::Exit),
        _ => None,
    }
}

fn window_title(title: &str, status: Status) -> String {
    format!("{title} - {status}")
}

fn surface_options(config: &GalleryConfig) -> SurfaceOptions {
    SurfaceOptions {
        preview: SizingLimits {
            max_pixel_ratio: config.preview.max_pixel_ratio,
            max_css_width: Some(config.preview.max_css_width),
        },
        full: SizingLimits {
            max_pixel_ratio: config.full.max_pixel_ratio,
            max_css_width: None,
        },
        max_tick_delta: config.timing.max_tick_delta,
    }
}

fn monitor_viewport(elwt: &EventLoopWindowTarget<()>) -> Rect {
    let Some(monitor) = elwt
        .primary_monitor()
        .or_else(|| elwt.available_monitors().next())
    else {
        tracing::debug!("no monitor reported; assuming a 1920x1080 viewport");
        return FALLBACK_VIEWPORT;
    };
    let origin = monitor.position();
    let size = monitor.size();
    Rect::new(
        f64::from(origin.x),
        f64::from(origin.y),
        f64::from(size.width),
        f64::from(size.height),
    )
}

/// Splits `viewport` into a near-square grid of 16:9 tiles, row by row.
fn tile_layout(viewport: Rect, count: usize) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }
    let columns = (count as f64).sqrt().ceil().max(1.0);
    let rows = (count as f64 / columns).ceil();

    let cell_width = ((viewport.width - TILE_GAP * (columns + 1.0)) / columns).max(1.0);
    let cell_height = ((viewport.height - TILE_GAP * (rows + 1.0)) / rows).max(1.0);
    let (width, height) = if cell_width * 9.0 / 16.0 <= cell_height {
        (cell_width, cell_width * 9.0 / 16.0)
    } else {
        (cell_height * 16.0 / 9.0, cell_height)
    };

    (0..count)
        .map(|index| {
            let column = (index as f64 % columns).floor();
            let row = (index as f64 / columns).floor();
            Rect::new(
                (viewport.x + TILE_GAP + column * (width + TILE_GAP)).round(),
                (viewport.y + TILE_GAP + row * (height + TILE_GAP)).round(),
                width.floor(),
                height.floor(),
            )
        })
        .collect()
}
