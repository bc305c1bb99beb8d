use anyhow::{Result, anyhow};
use minifb::{Key, Window, WindowOptions};

use super::{HeadlessRenderer, annotate, to_0rgb};
use crate::{
    controller::Renderer,
    input::QuitSender,
    types::{Frame, Overlay},
};

const WINDOW_TITLE: &str = "sign-scribe";

type WindowOpener = fn(&Frame) -> Result<Window>;

fn open_window(frame: &Frame) -> Result<Window> {
    let mut window = Window::new(
        WINDOW_TITLE,
        frame.width as usize,
        frame.height as usize,
        WindowOptions {
            resize: true,
            ..WindowOptions::default()
        },
    )
    .map_err(|err| anyhow!("failed to open preview window: {err}"))?;
    window.set_target_fps(60);
    log::info!("opened {}x{} preview window", frame.width, frame.height);
    Ok(window)
}

/// Preview window; Q, Esc or closing the window requests quit.
///
/// The window opens on the first frame. If that fails the renderer logs
/// predictions like `HeadlessRenderer` for the rest of the run.
pub struct WindowRenderer {
    window: Option<Window>,
    open: WindowOpener,
    fallback: Option<HeadlessRenderer>,
    quit_tx: QuitSender,
    title: String,
    quit_sent: bool,
}

impl WindowRenderer {
    pub fn new(quit_tx: QuitSender) -> Self {
        Self::with_opener(quit_tx, open_window)
    }

    fn with_opener(quit_tx: QuitSender, open: WindowOpener) -> Self {
        Self {
            window: None,
            open,
            fallback: None,
            quit_tx,
            title: String::new(),
            quit_sent: false,
        }
    }

    /// The open window, or `None` once opening has failed.
    fn window_for(&mut self, frame: &Frame) -> Option<&mut Window> {
        if self.fallback.is_some() {
            return None;
        }
        if self.window.is_none() {
            match (self.open)(frame) {
                Ok(window) => self.window = Some(window),
                Err(err) => {
                    log::warn!("{err:#}; logging predictions instead");
                    self.fallback = Some(HeadlessRenderer::new());
                    return None;
                }
            }
        }
        self.window.as_mut()
    }

    fn request_quit(&mut self) {
        if !self.quit_sent {
            log::info!("quit requested from preview window");
            let _ = self.quit_tx.send(());
            self.quit_sent = true;
        }
    }
}

impl Renderer for WindowRenderer {
    fn present(&mut self, frame: &Frame, overlay: &Overlay) -> Result<()> {
        let caption = overlay.caption();
        let retitle = caption != self.title;
        let Some(window) = self.window_for(frame) else {
            return match self.fallback.as_mut() {
                Some(fallback) => fallback.present(frame, overlay),
                None => Ok(()),
            };
        };
        let pixels = to_0rgb(&annotate(frame, overlay));

        if retitle {
            window.set_title(&format!("{WINDOW_TITLE} | {caption}"));
        }
        window
            .update_with_buffer(&pixels, frame.width as usize, frame.height as usize)
            .map_err(|err| anyhow!("failed to update preview window: {err}"))?;
        let wants_quit = !window.is_open()
            || window.is_key_down(Key::Escape)
            || window.is_key_down(Key::Q);

        if retitle {
            self.title = caption;
        }
        if wants_quit {
            self.request_quit();
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.window.take().is_some() {
            log::debug!("preview window closed");
        }
    }
}
