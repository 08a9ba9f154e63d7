mod allocator;
mod app;
mod buffers;
mod commands;
mod descriptors;
mod devices;
mod frame;
mod image;
mod pipeline;
mod queues;
mod renderer;
mod shaders;
mod swapchain;
mod sync;
mod texture;
mod transfer;
mod vertex;

use anyhow::Result;
use winit::event_loop::EventLoop;

use app::App;

fn main() -> Result<()> {
    std::env::set_var("RUST_LOG", "info");
    pretty_env_logger::init();

    // The event loop drives the whole application: the window is
    // created when the loop resumes, and a frame is rendered on
    // each redraw request. Any fatal setup error propagates back
    // here and terminates the process with a diagnostic.
    let event_loop = EventLoop::new()?;
    let mut app = App::default();
    event_loop.run_app(&mut app)?;

    Ok(())
}
