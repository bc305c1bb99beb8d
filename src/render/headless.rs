use anyhow::Result;

use crate::{
    controller::Renderer,
    types::{Frame, Label, Overlay},
};

/// Logs prediction and message changes instead of showing frames.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    last_stable: Option<Label>,
    last_message: String,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for HeadlessRenderer {
    fn present(&mut self, _frame: &Frame, overlay: &Overlay) -> Result<()> {
        if overlay.stable.is_some() && overlay.stable != self.last_stable {
            log::info!("{}", overlay.caption());
        } else if overlay.message != self.last_message {
            log::info!("Message: {}", overlay.message);
        }
        self.last_stable = overlay.stable.clone();
        self.last_message.clone_from(&overlay.message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_last_overlay() {
        let mut renderer = HeadlessRenderer::new();
        let frame = Frame::new(vec![0; 4], 1, 1);
        let overlay = Overlay {
            hands: Vec::new(),
            stable: Some(Label::new("A")),
            message: "A".to_string(),
        };
        renderer.present(&frame, &overlay).unwrap();
        assert_eq!(renderer.last_stable, Some(Label::new("A")));
        assert_eq!(renderer.last_message, "A");

        renderer.present(&frame, &Overlay::default()).unwrap();
        assert_eq!(renderer.last_stable, None);
    }
}
