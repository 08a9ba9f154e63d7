use crate::renderer::Renderer;

use std::time::Instant;

use log::*;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::ActiveEventLoop,
    window::{Window, WindowId},
};

/// Windowing state: the OS window, the renderer driven once per
/// redraw, and the start instant used to animate the per-frame
/// uniforms.
#[derive(Default)]
pub struct App {
    window: Option<Window>,
    renderer: Option<Renderer>,
    start: Option<Instant>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        // The presentation surface is fixed-size for the whole
        // lifetime of the process (no swapchain recreation), so
        // the window is created non-resizable.
        let window_attr = Window::default_attributes()
            .with_title("ariel")
            .with_inner_size(LogicalSize::new(1024, 576))
            .with_resizable(false);

        let window = event_loop.create_window(window_attr).unwrap();
        let renderer = unsafe { Renderer::create(&window) }.unwrap();

        self.window = Some(window);
        self.renderer = Some(renderer);
        self.start = Some(Instant::now());
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                // Rendering and presentation are asynchronous, so
                // the renderer must not be torn down while the
                // device is still executing commands; the destroy
                // function waits for the device to go idle before
                // releasing anything.
                if let Some(mut renderer) = self.renderer.take() {
                    unsafe { renderer.destroy() };
                }

                event_loop.exit();
                info!("Destroyed the app.");
            }
            WindowEvent::RedrawRequested => {
                if let (Some(renderer), Some(start)) = (self.renderer.as_mut(), self.start) {
                    let elapsed = start.elapsed().as_secs_f32();
                    unsafe { renderer.render(elapsed) }.unwrap();
                }
            }
            _ => (),
        }
    }

    fn about_to_wait(&mut self, _: &ActiveEventLoop) {
        // Keep redrawing as fast as the presentation engine
        // allows.
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}
